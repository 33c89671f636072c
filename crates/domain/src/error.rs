//! Domain error types.
//!
//! Every variant carries a message fit for showing to the user verbatim; the
//! command layer forwards these as the failure reason rather than inventing
//! generic text.

use common::OrderId;
use order_store::{OrderStatus, StoreError};
use thiserror::Error;

use crate::delivery::TransportError;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The order does not exist.
    #[error("Order {0} does not exist")]
    NotFound(OrderId),

    /// A claim attempt lost the race or arrived after another chef.
    #[error("Order {0} has already been claimed")]
    AlreadyClaimed(OrderId),

    /// A customer tried to claim their own order.
    #[error("You can't claim your own order")]
    SelfClaimDenied,

    /// The caller is not the worker holding the claim or assignment.
    #[error("Order {0} is not claimed by you")]
    NotYourClaim(OrderId),

    /// The order is not in a state that allows the requested action.
    #[error("Order {id} can't be {action} while it is {status}")]
    InvalidTransition {
        id: OrderId,
        status: OrderStatus,
        action: &'static str,
    },

    /// No free id could be found within the retry bound.
    #[error("No free order ids are available right now, try again later")]
    ExhaustedIdSpace,

    /// A personal delivery targeted a thread with no parent channel.
    #[error("Invalid channel")]
    InvalidChannel,

    /// A transport call failed during delivery; the order stays cooked.
    #[error("Order {id} could not be delivered: {source}")]
    DeliveryFailed {
        id: OrderId,
        #[source]
        source: TransportError,
    },

    /// The customer can't afford the order price.
    #[error("You don't have enough money to place an order")]
    InsufficientBalance,

    /// A platform call outside of delivery failed.
    #[error("Platform error: {0}")]
    Platform(#[from] TransportError),

    /// An error occurred in the order store.
    #[error("Order store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;
