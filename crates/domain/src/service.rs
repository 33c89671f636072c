//! The order service: the one façade command handlers talk to.

use std::sync::Arc;

use chrono::Utc;
use common::{ChannelId, DeliveryMethod, GuildId, OrderId, UserId};
use order_store::{Order, OrderPatch, OrderQuery, OrderStatus, OrderStore, OrderStoreExt, StoreError};
use serde::{Deserialize, Serialize};

use crate::claim::ClaimManager;
use crate::delivery::{BalanceService, DeliveryDispatcher};
use crate::error::{DomainError, Result};
use crate::id::IdGenerator;

/// Default price debited when an order is placed.
pub const DEFAULT_ORDER_PRICE: u64 = 20;

/// Cap on search results, matching what a command autocomplete can show.
pub const MAX_SUGGESTIONS: usize = 25;

/// A request to place a new order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub customer: UserId,
    pub guild: GuildId,
    pub channel: ChannelId,
    pub order_text: String,
    pub image: Option<String>,
}

/// Search criteria for order lookups and autocompletion.
///
/// The fragment matches ids by prefix and order text by substring, so a
/// worker can type either.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    pub fragment: Option<String>,
    pub status: Option<OrderStatus>,
    pub chef: Option<UserId>,
    pub deliverer: Option<UserId>,
    pub customer: Option<UserId>,
}

/// One search hit, shaped for an autocomplete row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderSuggestion {
    pub id: OrderId,
    pub label: String,
}

/// Coordinates the store, the claim machinery and delivery.
pub struct OrderService<S> {
    store: S,
    ids: IdGenerator<S>,
    claims: ClaimManager<S>,
    dispatcher: DeliveryDispatcher,
    balances: Arc<dyn BalanceService>,
    price: u64,
}

impl<S: OrderStore + Clone + 'static> OrderService<S> {
    pub fn new(
        store: S,
        claims: ClaimManager<S>,
        dispatcher: DeliveryDispatcher,
        balances: Arc<dyn BalanceService>,
        price: u64,
    ) -> Self {
        Self {
            ids: IdGenerator::new(store.clone()),
            store,
            claims,
            dispatcher,
            balances,
            price,
        }
    }

    /// Debits the customer and creates the order in the placed state.
    ///
    /// The debit happens first: an order is only ever created for a paid
    /// request. Id collisions against concurrent placements are retried.
    #[tracing::instrument(skip(self, request), fields(customer = %request.customer))]
    pub async fn place_order(&self, request: PlaceOrder) -> Result<Order> {
        if !self
            .balances
            .withdraw(&request.customer, self.price)
            .await?
        {
            return Err(DomainError::InsufficientBalance);
        }

        // Another placement can win the same id between the probe and the
        // create; the store's duplicate rejection makes that loss visible.
        for _ in 0..3 {
            let id = self.ids.generate().await?;
            let order = Order::place(
                id,
                request.customer.clone(),
                request.guild.clone(),
                request.channel.clone(),
                request.order_text.clone(),
                request.image.clone(),
            );
            match self.store.create(order).await {
                Ok(order) => {
                    metrics::counter!("orders_placed_total").increment(1);
                    tracing::info!(id = %order.id, "order placed");
                    return Ok(order);
                }
                Err(StoreError::DuplicateId(id)) => {
                    tracing::debug!(%id, "order id raced, retrying");
                }
                Err(error) => return Err(error.into()),
            }
        }
        Err(DomainError::ExhaustedIdSpace)
    }

    /// `placed → claimed` for the given worker. See [`ClaimManager::claim`].
    pub async fn claim(&self, id: &OrderId, worker: &UserId) -> Result<Order> {
        self.claims.claim(id, worker).await
    }

    /// `claimed → cooked` for the claiming chef. See
    /// [`ClaimManager::mark_cooked`].
    pub async fn mark_cooked(&self, id: &OrderId, worker: &UserId) -> Result<Order> {
        self.claims.mark_cooked(id, worker).await
    }

    /// `cooked → delivered`: renders and sends the delivery message, then
    /// finalizes the order.
    ///
    /// A transport failure aborts before the state change, leaving the
    /// order cooked for a retry.
    #[tracing::instrument(skip(self))]
    pub async fn deliver(
        &self,
        id: &OrderId,
        method: DeliveryMethod,
        worker: &UserId,
    ) -> Result<Order> {
        let order = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::NotFound(id.clone()))?;

        match order.status {
            OrderStatus::Cooked if order.deliverer.as_ref() == Some(worker) => {}
            OrderStatus::Cooked => return Err(DomainError::NotYourClaim(id.clone())),
            status => {
                return Err(DomainError::InvalidTransition {
                    id: id.clone(),
                    status,
                    action: "delivered",
                });
            }
        }

        let delivered_at = Utc::now();
        self.dispatcher
            .deliver(&order, method, worker, delivered_at)
            .await?;

        let applied = self
            .store
            .conditional_update(id, OrderStatus::Cooked, OrderPatch::deliver(method, delivered_at))
            .await?;
        if !applied {
            let current = self.store.get(id).await?;
            return Err(DomainError::InvalidTransition {
                id: id.clone(),
                status: current.status,
                action: "delivered",
            });
        }

        self.store.get(id).await.map_err(Into::into)
    }

    /// Fetches a single order.
    pub async fn lookup(&self, id: &OrderId) -> Result<Order> {
        self.store.get(id).await.map_err(Into::into)
    }

    /// Searches orders for display or autocompletion, capped at
    /// [`MAX_SUGGESTIONS`] hits in id order.
    pub async fn search_orders(&self, filter: SearchFilter) -> Result<Vec<OrderSuggestion>> {
        let mut query = OrderQuery::new().limit(MAX_SUGGESTIONS);
        if let Some(fragment) = filter.fragment {
            query = query.fragment(fragment);
        }
        if let Some(status) = filter.status {
            query = query.status(status);
        }
        if let Some(chef) = filter.chef {
            query = query.chef(chef);
        }
        if let Some(deliverer) = filter.deliverer {
            query = query.deliverer(deliverer);
        }
        if let Some(customer) = filter.customer {
            query = query.customer(customer);
        }

        let orders = self.store.find_many(query).await?;
        Ok(orders
            .into_iter()
            .map(|order| OrderSuggestion {
                label: format!("{} - {}", order.id, order.order_text),
                id: order.id,
            })
            .collect())
    }

    /// Deletes an order administratively. See [`ClaimManager::remove`].
    pub async fn remove(&self, id: &OrderId) -> Result<Order> {
        self.claims.remove(id).await
    }

    /// Re-arms lease timers for claims that survived a restart. See
    /// [`ClaimManager::recover`].
    pub async fn recover(&self) -> Result<usize> {
        self.claims.recover().await
    }
}
