//! Order lifecycle endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use common::{ChannelId, DeliveryMethod, GuildId, OrderId, UserId};
use domain::{OrderService, PlaceOrder, SearchFilter};
use order_store::{Order, OrderStatus, OrderStore};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: OrderStore> {
    pub service: OrderService<S>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct PlaceOrderRequest {
    pub customer: String,
    pub guild: String,
    pub channel: String,
    pub order: String,
    pub image: Option<String>,
}

#[derive(Deserialize)]
pub struct WorkerRequest {
    pub worker: String,
}

#[derive(Deserialize)]
pub struct DeliverRequest {
    pub worker: String,
    pub method: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub fragment: Option<String>,
    pub status: Option<String>,
    pub chef: Option<String>,
    pub deliverer: Option<String>,
    pub customer: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub order: String,
    pub customer: String,
    pub guild: String,
    pub channel: String,
    pub chef: Option<String>,
    pub deliverer: Option<String>,
    pub status: String,
    pub delivery_method: Option<String>,
    pub ordered_at: String,
    pub cooked_at: Option<String>,
    pub delivered_at: Option<String>,
    pub lease_expires_at: Option<String>,
    pub image: Option<String>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id.to_string(),
            order: order.order_text,
            customer: order.customer.to_string(),
            guild: order.guild.to_string(),
            channel: order.channel.to_string(),
            chef: order.chef.map(|id| id.to_string()),
            deliverer: order.deliverer.map(|id| id.to_string()),
            status: order.status.to_string(),
            delivery_method: order.delivery_method.map(|m| m.to_string()),
            ordered_at: order.ordered_at.to_rfc3339(),
            cooked_at: order.cooked_at.map(|at| at.to_rfc3339()),
            delivered_at: order.delivered_at.map(|at| at.to_rfc3339()),
            lease_expires_at: order.lease_expires_at.map(|at| at.to_rfc3339()),
            image: order.image,
        }
    }
}

#[derive(Serialize)]
pub struct SuggestionResponse {
    pub id: String,
    pub label: String,
}

// -- Handlers --

/// POST /orders — place a new order.
#[tracing::instrument(skip(state, req))]
pub async fn place<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<PlaceOrderRequest>,
) -> Result<(axum::http::StatusCode, Json<OrderResponse>), ApiError> {
    let order = state
        .service
        .place_order(PlaceOrder {
            customer: UserId::new(req.customer),
            guild: GuildId::new(req.guild),
            channel: ChannelId::new(req.channel),
            order_text: req.order,
            image: req.image,
        })
        .await?;

    Ok((axum::http::StatusCode::CREATED, Json(order.into())))
}

/// POST /orders/:id/claim — claim an order for a worker.
#[tracing::instrument(skip(state, req))]
pub async fn claim<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<WorkerRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let id = parse_order_id(&id)?;
    let order = state.service.claim(&id, &UserId::new(req.worker)).await?;
    Ok(Json(order.into()))
}

/// POST /orders/:id/cook — mark a claimed order as cooked.
#[tracing::instrument(skip(state, req))]
pub async fn cook<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<WorkerRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let id = parse_order_id(&id)?;
    let order = state
        .service
        .mark_cooked(&id, &UserId::new(req.worker))
        .await?;
    Ok(Json(order.into()))
}

/// POST /orders/:id/deliver — deliver a cooked order.
#[tracing::instrument(skip(state, req))]
pub async fn deliver<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<DeliverRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let id = parse_order_id(&id)?;
    let method: DeliveryMethod = req
        .method
        .parse()
        .map_err(|e: common::UnknownDeliveryMethod| ApiError::BadRequest(e.to_string()))?;
    let order = state
        .service
        .deliver(&id, method, &UserId::new(req.worker))
        .await?;
    Ok(Json(order.into()))
}

/// GET /orders/:id — look up a single order.
#[tracing::instrument(skip(state))]
pub async fn get<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let id = parse_order_id(&id)?;
    let order = state.service.lookup(&id).await?;
    Ok(Json(order.into()))
}

/// GET /orders — search orders for autocompletion.
#[tracing::instrument(skip(state))]
pub async fn search<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<SuggestionResponse>>, ApiError> {
    let status = params
        .status
        .map(|s| s.parse::<OrderStatus>())
        .transpose()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let hits = state
        .service
        .search_orders(SearchFilter {
            fragment: params.fragment,
            status,
            chef: params.chef.map(UserId::new),
            deliverer: params.deliverer.map(UserId::new),
            customer: params.customer.map(UserId::new),
        })
        .await?;

    Ok(Json(
        hits.into_iter()
            .map(|hit| SuggestionResponse {
                id: hit.id.to_string(),
                label: hit.label,
            })
            .collect(),
    ))
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    id.parse()
        .map_err(|e: common::InvalidOrderId| ApiError::BadRequest(e.to_string()))
}
