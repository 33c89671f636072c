//! HTTP command surface for the order lifecycle engine.
//!
//! Exposes the place/claim/cook/deliver commands and the autocomplete
//! search as REST endpoints, with structured logging (tracing) and
//! Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::OrderStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: OrderStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::place::<S>))
        .route("/orders", get(routes::orders::search::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/claim", post(routes::orders::claim::<S>))
        .route("/orders/{id}/cook", post(routes::orders::cook::<S>))
        .route("/orders/{id}/deliver", post(routes::orders::deliver::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// The in-memory platform collaborators behind the default state.
///
/// Returned alongside the state so callers (startup code, tests) can seed
/// users, channels and balances.
pub struct Collaborators {
    pub messenger: domain::InMemoryMessenger,
    pub directory: domain::InMemoryDirectory,
    pub invites: domain::InMemoryInviteCreator,
    pub balances: domain::InMemoryBalanceService,
}

/// Creates the default application state over the given store, with
/// in-memory platform collaborators.
pub fn create_default_state<S: OrderStore + Clone + 'static>(
    store: S,
    config: &Config,
) -> (Arc<AppState<S>>, Collaborators) {
    use domain::{ChannelNotifier, ClaimManager, DeliveryDispatcher, OrderService};

    let messenger = domain::InMemoryMessenger::new();
    let directory = domain::InMemoryDirectory::new();
    let invites = domain::InMemoryInviteCreator::new();
    let balances = domain::InMemoryBalanceService::new();

    let notifier = ChannelNotifier::new(
        Arc::new(messenger.clone()),
        config.kitchen_channel.clone(),
    );
    let claims = ClaimManager::with_lease(store.clone(), Arc::new(notifier), config.lease);
    let dispatcher = DeliveryDispatcher::new(
        Arc::new(messenger.clone()),
        Arc::new(directory.clone()),
        Arc::new(invites.clone()),
        config.invite_channel.clone(),
    );
    let service = OrderService::new(
        store,
        claims,
        dispatcher,
        Arc::new(balances.clone()),
        config.order_price,
    );

    let state = Arc::new(AppState { service });
    let collaborators = Collaborators {
        messenger,
        directory,
        invites,
        balances,
    };
    (state, collaborators)
}
