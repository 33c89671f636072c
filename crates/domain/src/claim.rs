//! The claim/lease state machine.
//!
//! Claiming an order gives one chef an exclusive, time-bounded hold on it.
//! The winner of a claim race is decided by a single conditional update in
//! the store; the lease is enforced by an in-process timer per claim plus a
//! durable `lease_expires_at` deadline that a startup reconciliation scan
//! can pick up after a restart.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{ChannelId, OrderId, UserId};
use order_store::{Order, OrderPatch, OrderQuery, OrderStatus, OrderStore, OrderStoreExt};
use tokio::task::JoinHandle;

use crate::delivery::{Messenger, TransportError};
use crate::error::{DomainError, Result};

/// Default lease duration: ten minutes, as the kitchen has always had it.
pub const DEFAULT_LEASE: Duration = Duration::from_millis(600_000);

/// Receiver of claim lifecycle notifications.
///
/// Notification failures are logged by the claim manager and never roll
/// back the state change that triggered them.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Tells the customer their order has been claimed.
    async fn order_claimed(&self, order: &Order) -> std::result::Result<(), TransportError>;

    /// Tells the worker and the kitchen that a claim lapsed and the order
    /// is up for grabs again.
    async fn claim_released(
        &self,
        order: &Order,
        worker: &UserId,
    ) -> std::result::Result<(), TransportError>;
}

/// Notifier that delivers over a [`Messenger`]: the customer gets a DM, the
/// kitchen channel gets the release notice.
pub struct ChannelNotifier {
    messenger: Arc<dyn Messenger>,
    kitchen: ChannelId,
}

impl ChannelNotifier {
    pub fn new(messenger: Arc<dyn Messenger>, kitchen: ChannelId) -> Self {
        Self { messenger, kitchen }
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn order_claimed(&self, order: &Order) -> std::result::Result<(), TransportError> {
        let chef = order
            .chef
            .as_ref()
            .map(|chef| format!("<@{chef}>"))
            .unwrap_or_else(|| "a chef".to_string());
        self.messenger
            .send_dm(
                &order.customer,
                &format!("Your order has been claimed by {chef}"),
            )
            .await
    }

    async fn claim_released(
        &self,
        order: &Order,
        worker: &UserId,
    ) -> std::result::Result<(), TransportError> {
        let notice = format!(
            "Order {} has been released because the chef took too long to cook it",
            order.id
        );
        self.messenger.send_dm(worker, &notice).await?;
        self.messenger.send_channel(&self.kitchen, &notice).await
    }
}

/// A recorded notification, for tests and default wiring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Claimed { order: OrderId, chef: UserId },
    Released { order: OrderId, worker: UserId },
}

/// In-memory notifier that records what it was asked to send.
#[derive(Clone, Default)]
pub struct InMemoryNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every notification recorded so far.
    pub fn notifications(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    /// Returns the number of release notices recorded.
    pub fn released_count(&self) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|n| matches!(n, Notification::Released { .. }))
            .count()
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn order_claimed(&self, order: &Order) -> std::result::Result<(), TransportError> {
        self.sent.lock().unwrap().push(Notification::Claimed {
            order: order.id.clone(),
            chef: order.chef.clone().unwrap_or_else(|| UserId::new("")),
        });
        Ok(())
    }

    async fn claim_released(
        &self,
        order: &Order,
        worker: &UserId,
    ) -> std::result::Result<(), TransportError> {
        self.sent.lock().unwrap().push(Notification::Released {
            order: order.id.clone(),
            worker: worker.clone(),
        });
        Ok(())
    }
}

struct Inner<S> {
    store: S,
    notifier: Arc<dyn Notifier>,
    lease: Duration,
    timers: Mutex<HashMap<OrderId, JoinHandle<()>>>,
}

/// Owns claim transitions and the lease timers attached to them.
///
/// Cheap to clone; clones share the timer table.
pub struct ClaimManager<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for ClaimManager<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: OrderStore + Clone + 'static> ClaimManager<S> {
    /// Creates a claim manager with the default ten-minute lease.
    pub fn new(store: S, notifier: Arc<dyn Notifier>) -> Self {
        Self::with_lease(store, notifier, DEFAULT_LEASE)
    }

    /// Creates a claim manager with an explicit lease duration.
    pub fn with_lease(store: S, notifier: Arc<dyn Notifier>, lease: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                notifier,
                lease,
                timers: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// The configured lease duration.
    pub fn lease(&self) -> Duration {
        self.inner.lease
    }

    /// `placed → claimed`: takes the claim for `worker` and starts the
    /// lease timer.
    ///
    /// Exactly one of any number of concurrent claim attempts wins; the
    /// rest see [`DomainError::AlreadyClaimed`].
    #[tracing::instrument(skip(self))]
    pub async fn claim(&self, id: &OrderId, worker: &UserId) -> Result<Order> {
        let order = self
            .inner
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::NotFound(id.clone()))?;

        // Checked before status so a self-claim never reports AlreadyClaimed.
        if order.customer == *worker {
            return Err(DomainError::SelfClaimDenied);
        }

        let deadline = Utc::now() + self.inner.lease;
        let applied = self
            .inner
            .store
            .conditional_update(
                id,
                OrderStatus::Placed,
                OrderPatch::claim(worker.clone(), deadline),
            )
            .await?;

        if !applied {
            metrics::counter!("claims_lost_total").increment(1);
            let current = self.inner.store.get(id).await?;
            return Err(match current.status {
                OrderStatus::Claimed => DomainError::AlreadyClaimed(id.clone()),
                status => DomainError::InvalidTransition {
                    id: id.clone(),
                    status,
                    action: "claimed",
                },
            });
        }

        metrics::counter!("claims_won_total").increment(1);
        tracing::info!(%id, %worker, "order claimed");
        self.start_timer(id.clone(), worker.clone(), deadline, self.inner.lease);

        let order = self.inner.store.get(id).await?;
        if let Err(error) = self.inner.notifier.order_claimed(&order).await {
            tracing::warn!(%id, %error, "failed to send claim confirmation");
        }
        Ok(order)
    }

    /// `claimed → cooked`: stamps the cook time, assigns the chef as the
    /// deliverer and cancels the lease timer.
    #[tracing::instrument(skip(self))]
    pub async fn mark_cooked(&self, id: &OrderId, worker: &UserId) -> Result<Order> {
        let order = self
            .inner
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::NotFound(id.clone()))?;

        match order.status {
            OrderStatus::Claimed if order.chef.as_ref() == Some(worker) => {}
            OrderStatus::Claimed => return Err(DomainError::NotYourClaim(id.clone())),
            status => {
                return Err(DomainError::InvalidTransition {
                    id: id.clone(),
                    status,
                    action: "marked as cooked",
                });
            }
        }

        let applied = self
            .inner
            .store
            .conditional_update(
                id,
                OrderStatus::Claimed,
                OrderPatch::cook(worker.clone(), Utc::now()),
            )
            .await?;

        if !applied {
            // The lease expired between the read and the swap.
            let current = self.inner.store.get(id).await?;
            return Err(DomainError::InvalidTransition {
                id: id.clone(),
                status: current.status,
                action: "marked as cooked",
            });
        }

        self.cancel_timer(id);
        metrics::counter!("orders_cooked_total").increment(1);
        tracing::info!(%id, %worker, "order cooked");
        self.inner.store.get(id).await.map_err(Into::into)
    }

    /// Administrative removal: `any non-terminal state → deleted`.
    #[tracing::instrument(skip(self))]
    pub async fn remove(&self, id: &OrderId) -> Result<Order> {
        self.cancel_timer(id);

        // The expected status can move under us, so retry the swap a few
        // times before giving up.
        for _ in 0..3 {
            let order = self
                .inner
                .store
                .find_by_id(id)
                .await?
                .ok_or_else(|| DomainError::NotFound(id.clone()))?;

            if order.status.is_terminal() {
                return Err(DomainError::InvalidTransition {
                    id: id.clone(),
                    status: order.status,
                    action: "deleted",
                });
            }

            if self
                .inner
                .store
                .conditional_update(id, order.status, OrderPatch::delete())
                .await?
            {
                tracing::info!(%id, "order deleted");
                return self.inner.store.get(id).await.map_err(Into::into);
            }
        }

        let current = self.inner.store.get(id).await?;
        Err(DomainError::InvalidTransition {
            id: id.clone(),
            status: current.status,
            action: "deleted",
        })
    }

    /// Reconciliation scan for claims that predate this process.
    ///
    /// Claimed orders whose durable deadline has passed are released
    /// immediately; the rest get a timer for the remaining lease. Returns
    /// the number of claims picked up.
    #[tracing::instrument(skip(self))]
    pub async fn recover(&self) -> Result<usize> {
        let claimed = self
            .inner
            .store
            .find_many(OrderQuery::new().status(OrderStatus::Claimed))
            .await?;
        let count = claimed.len();

        let now = Utc::now();
        for order in claimed {
            let Some(worker) = order.chef.clone() else {
                // Can't happen for a claimed order, but a corrupt record
                // shouldn't take down recovery.
                tracing::error!(id = %order.id, "claimed order without a chef");
                continue;
            };
            let deadline = order.lease_expires_at.unwrap_or(now);

            if deadline <= now {
                self.inner.expire(&order.id, &worker, deadline).await;
            } else {
                let remaining = (deadline - now)
                    .to_std()
                    .unwrap_or(self.inner.lease);
                self.start_timer(order.id.clone(), worker, deadline, remaining);
            }
        }

        if count > 0 {
            tracing::info!(count, "recovered in-flight claims");
        }
        Ok(count)
    }

    /// Number of live lease timers. Test and diagnostics hook.
    pub fn active_timers(&self) -> usize {
        self.inner.timers.lock().unwrap().len()
    }

    fn start_timer(&self, id: OrderId, worker: UserId, deadline: DateTime<Utc>, after: Duration) {
        let inner = Arc::clone(&self.inner);
        let task_id = id.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            inner.expire(&task_id, &worker, deadline).await;
            inner.timers.lock().unwrap().remove(&task_id);
        });

        // A stale timer under the same id belongs to an older claim on a
        // recycled or re-claimed order and must never fire.
        if let Some(old) = self.inner.timers.lock().unwrap().insert(id, handle) {
            old.abort();
        }
    }

    fn cancel_timer(&self, id: &OrderId) {
        if let Some(handle) = self.inner.timers.lock().unwrap().remove(id) {
            handle.abort();
        }
    }
}

impl<S: OrderStore> Inner<S> {
    /// Lease expiry: `claimed → placed` if, and only if, the exact claim
    /// the timer was armed for is still in place. Safe to run any number
    /// of times; late or duplicate firings are no-ops.
    async fn expire(&self, id: &OrderId, worker: &UserId, deadline: DateTime<Utc>) {
        let order = match self.store.find_by_id(id).await {
            Ok(Some(order)) => order,
            Ok(None) => return,
            Err(error) => {
                tracing::warn!(%id, %error, "lease expiry could not read the order");
                return;
            }
        };

        // The deadline identifies the claim: a re-claim writes a new one.
        if order.status != OrderStatus::Claimed
            || order.chef.as_ref() != Some(worker)
            || order.lease_expires_at != Some(deadline)
        {
            return;
        }

        match self
            .store
            .conditional_update(id, OrderStatus::Claimed, OrderPatch::release())
            .await
        {
            Ok(true) => {
                metrics::counter!("leases_expired_total").increment(1);
                tracing::info!(%id, %worker, "claim lease expired, order released");
                if let Err(error) = self.notifier.claim_released(&order, worker).await {
                    tracing::warn!(%id, %error, "failed to send release notification");
                }
            }
            Ok(false) => {
                // Lost to markCooked firing at the same instant; the claim
                // has moved on and there is nothing to release.
            }
            Err(error) => {
                tracing::warn!(%id, %error, "lease expiry could not release the order");
            }
        }
    }
}
