use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::OrderId;
use tokio::sync::RwLock;

use crate::order::{Order, OrderPatch};
use crate::query::OrderQuery;
use crate::status::OrderStatus;
use crate::store::OrderStore;
use crate::{Result, StoreError};

/// In-memory order store implementation.
///
/// Backs single-process deployments and tests. Atomicity of
/// `conditional_update` comes from holding the write lock across the
/// status check and the patch application.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
}

impl InMemoryOrderStore {
    /// Creates a new empty in-memory order store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of records stored, terminal ones included.
    pub async fn order_count(&self) -> usize {
        self.orders.read().await.len()
    }

    /// Clears all records.
    pub async fn clear(&self) {
        self.orders.write().await.clear();
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create(&self, order: Order) -> Result<Order> {
        let mut orders = self.orders.write().await;

        // A terminal occupant may be recycled; a live one blocks the id.
        if let Some(existing) = orders.get(&order.id)
            && !existing.status.is_terminal()
        {
            return Err(StoreError::DuplicateId(order.id.clone()));
        }

        metrics::counter!("order_store_created_total").increment(1);
        tracing::debug!(id = %order.id, "order record created");
        orders.insert(order.id.clone(), order.clone());
        Ok(order)
    }

    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>> {
        let orders = self.orders.read().await;
        Ok(orders.get(id).cloned())
    }

    async fn find_many(&self, query: OrderQuery) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        let mut found: Vec<Order> = orders
            .values()
            .filter(|order| query.matches(order))
            .cloned()
            .collect();

        found.sort_by_key(OrderQuery::sort_key);

        if let Some(limit) = query.limit {
            found.truncate(limit);
        }
        Ok(found)
    }

    async fn conditional_update(
        &self,
        id: &OrderId,
        expected: OrderStatus,
        patch: OrderPatch,
    ) -> Result<bool> {
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        if order.status != expected {
            tracing::debug!(
                %id,
                expected = %expected,
                actual = %order.status,
                "conditional update rejected"
            );
            return Ok(false);
        }

        patch.apply_to(order);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::{ChannelId, GuildId, UserId};

    fn test_order(id: u16, text: &str) -> Order {
        Order::place(
            OrderId::from_number(id),
            UserId::new("customer"),
            GuildId::new("guild"),
            ChannelId::new("channel"),
            text,
            None,
        )
    }

    #[tokio::test]
    async fn create_and_find() {
        let store = InMemoryOrderStore::new();
        store.create(test_order(1, "Margherita")).await.unwrap();

        let found = store
            .find_by_id(&OrderId::from_number(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.order_text, "Margherita");
        assert_eq!(found.status, OrderStatus::Placed);
    }

    #[tokio::test]
    async fn find_missing_returns_none() {
        let store = InMemoryOrderStore::new();
        let found = store.find_by_id(&OrderId::from_number(1)).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn create_rejects_live_duplicate() {
        let store = InMemoryOrderStore::new();
        store.create(test_order(1, "Margherita")).await.unwrap();

        let result = store.create(test_order(1, "Pepperoni")).await;
        assert!(matches!(result, Err(StoreError::DuplicateId(_))));
    }

    #[tokio::test]
    async fn create_recycles_terminal_id() {
        let store = InMemoryOrderStore::new();
        let mut delivered = test_order(1, "Margherita");
        delivered.status = OrderStatus::Delivered;
        store.create(delivered).await.unwrap();

        store.create(test_order(1, "Pepperoni")).await.unwrap();
        let found = store
            .find_by_id(&OrderId::from_number(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.order_text, "Pepperoni");
    }

    #[tokio::test]
    async fn conditional_update_applies_on_match() {
        let store = InMemoryOrderStore::new();
        store.create(test_order(1, "Margherita")).await.unwrap();

        let applied = store
            .conditional_update(
                &OrderId::from_number(1),
                OrderStatus::Placed,
                OrderPatch::claim(UserId::new("chef"), Utc::now()),
            )
            .await
            .unwrap();
        assert!(applied);

        let order = store
            .find_by_id(&OrderId::from_number(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(order.status, OrderStatus::Claimed);
        assert_eq!(order.chef, Some(UserId::new("chef")));
    }

    #[tokio::test]
    async fn conditional_update_rejects_on_mismatch() {
        let store = InMemoryOrderStore::new();
        store.create(test_order(1, "Margherita")).await.unwrap();

        let applied = store
            .conditional_update(
                &OrderId::from_number(1),
                OrderStatus::Claimed,
                OrderPatch::cook(UserId::new("chef"), Utc::now()),
            )
            .await
            .unwrap();
        assert!(!applied);

        // Nothing changed.
        let order = store
            .find_by_id(&OrderId::from_number(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(order.status, OrderStatus::Placed);
        assert!(order.cooked_at.is_none());
    }

    #[tokio::test]
    async fn conditional_update_missing_order_is_not_found() {
        let store = InMemoryOrderStore::new();
        let result = store
            .conditional_update(
                &OrderId::from_number(1),
                OrderStatus::Placed,
                OrderPatch::release(),
            )
            .await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn concurrent_claims_have_one_winner() {
        let store = InMemoryOrderStore::new();
        store.create(test_order(7, "Margherita")).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .conditional_update(
                        &OrderId::from_number(7),
                        OrderStatus::Placed,
                        OrderPatch::claim(UserId::new(format!("chef-{i}")), Utc::now()),
                    )
                    .await
                    .unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn find_many_sorts_by_id_with_deleted_last() {
        let store = InMemoryOrderStore::new();
        let mut deleted = test_order(1, "Hawaii");
        deleted.status = OrderStatus::Deleted;
        store.create(deleted).await.unwrap();
        store.create(test_order(42, "Margherita")).await.unwrap();
        store.create(test_order(7, "Pepperoni")).await.unwrap();

        let found = store.find_many(OrderQuery::new()).await.unwrap();
        let ids: Vec<&str> = found.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["007", "042", "001"]);
    }

    #[tokio::test]
    async fn find_many_applies_filters_and_limit() {
        let store = InMemoryOrderStore::new();
        for i in 0..5 {
            store.create(test_order(i, "Margherita")).await.unwrap();
        }
        store.create(test_order(9, "Pepperoni")).await.unwrap();

        let found = store
            .find_many(OrderQuery::new().fragment("Pepp"))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id.as_str(), "009");

        let found = store
            .find_many(OrderQuery::new().status(OrderStatus::Placed).limit(3))
            .await
            .unwrap();
        assert_eq!(found.len(), 3);
    }
}
