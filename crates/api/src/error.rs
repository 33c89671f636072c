//! API error types with HTTP response mapping.
//!
//! Failures come back in the same shape successes do: a reply payload with a
//! title, a human-readable description and a color signal, the way the chat
//! frontend renders them.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::DomainError;
use serde::Serialize;

/// The structured reply payload every endpoint answers with.
#[derive(Debug, Serialize)]
pub struct Reply {
    pub title: String,
    pub description: String,
    pub color: &'static str,
}

impl Reply {
    pub fn green(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            color: "GREEN",
        }
    }

    pub fn red(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            color: "RED",
        }
    }
}

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Domain logic error; carries its own user-facing message.
    Domain(DomainError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, title, description) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "Invalid request", msg),
            ApiError::Domain(err) => domain_error_to_response(err),
        };

        (status, axum::Json(Reply::red(title, description))).into_response()
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, &'static str, String) {
    let message = err.to_string();
    match &err {
        DomainError::NotFound(_) => (StatusCode::NOT_FOUND, "Invalid order", message),
        DomainError::AlreadyClaimed(_) => (StatusCode::CONFLICT, "Already claimed", message),
        DomainError::SelfClaimDenied | DomainError::NotYourClaim(_) => {
            (StatusCode::FORBIDDEN, "Not allowed", message)
        }
        DomainError::InvalidTransition { .. } => (StatusCode::CONFLICT, "Invalid order", message),
        DomainError::InvalidChannel => (StatusCode::BAD_REQUEST, "Invalid channel", message),
        DomainError::InsufficientBalance => {
            (StatusCode::PAYMENT_REQUIRED, "Not enough money", message)
        }
        DomainError::ExhaustedIdSpace => {
            (StatusCode::SERVICE_UNAVAILABLE, "Kitchen overloaded", message)
        }
        DomainError::DeliveryFailed { .. } => (StatusCode::BAD_GATEWAY, "Delivery failed", message),
        DomainError::Platform(_) => (StatusCode::BAD_GATEWAY, "Platform error", message),
        DomainError::Store(_) => {
            tracing::error!(error = %message, "store error surfaced to the API");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error", message)
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::OrderId;

    fn status_of(err: DomainError) -> StatusCode {
        domain_error_to_response(err).0
    }

    #[test]
    fn status_mapping() {
        assert_eq!(
            status_of(DomainError::NotFound(OrderId::from_number(1))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(DomainError::AlreadyClaimed(OrderId::from_number(1))),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(DomainError::SelfClaimDenied),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(DomainError::InsufficientBalance),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            status_of(DomainError::InvalidChannel),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn replies_carry_a_color_signal() {
        let reply = Reply::red("Invalid order", "Order 042 does not exist");
        assert_eq!(reply.color, "RED");
        let reply = Reply::green("Order delivered", "Order 042 has been delivered.");
        assert_eq!(reply.color, "GREEN");
    }
}
