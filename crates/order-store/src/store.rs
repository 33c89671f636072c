use async_trait::async_trait;
use common::OrderId;

use crate::order::{Order, OrderPatch};
use crate::query::OrderQuery;
use crate::status::OrderStatus;
use crate::{Result, StoreError};

/// Core trait for order store implementations.
///
/// All implementations must be thread-safe (Send + Sync), and
/// `conditional_update` must be atomic with respect to every other write:
/// the claim engine's at-most-one-winner guarantee rests on it.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists a new order record and returns it as stored.
    ///
    /// Fails with [`StoreError::DuplicateId`] if a non-terminal order
    /// already holds the id. An id held only by a terminal (delivered or
    /// deleted) order may be recycled; the terminal record is displaced.
    async fn create(&self, order: Order) -> Result<Order>;

    /// Retrieves an order by id.
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>>;

    /// Retrieves orders matching a query, sorted by id ascending with
    /// deleted orders last.
    async fn find_many(&self, query: OrderQuery) -> Result<Vec<Order>>;

    /// Applies a patch to an order if and only if its current status equals
    /// `expected`, as a single atomic compare-and-swap.
    ///
    /// Returns `Ok(true)` if the patch was applied, `Ok(false)` if the
    /// status did not match (the caller re-reads to find out why), and
    /// [`StoreError::NotFound`] if no order holds the id.
    async fn conditional_update(
        &self,
        id: &OrderId,
        expected: OrderStatus,
        patch: OrderPatch,
    ) -> Result<bool>;
}

/// Extension trait providing convenience methods for order stores.
#[async_trait]
pub trait OrderStoreExt: OrderStore {
    /// Retrieves an order by id, failing with [`StoreError::NotFound`]
    /// instead of returning `None`.
    async fn get(&self, id: &OrderId) -> Result<Order> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    /// Returns true if a non-terminal order currently holds the id.
    async fn id_in_use(&self, id: &OrderId) -> Result<bool> {
        Ok(self
            .find_by_id(id)
            .await?
            .is_some_and(|order| !order.status.is_terminal()))
    }
}

#[async_trait]
impl<S: OrderStore + ?Sized> OrderStoreExt for S {}
