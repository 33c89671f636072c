//! Short order id generation.

use common::OrderId;
use order_store::{OrderStore, OrderStoreExt};
use rand::Rng;

use crate::error::{DomainError, Result};

/// Generates short numeric order ids by random probing.
///
/// A candidate is drawn uniformly from `000`–`999` and rejected while a
/// non-terminal order holds it. The generator only reduces retries; the
/// store's `create` rejecting duplicate ids atomically is what actually
/// guarantees uniqueness under races.
pub struct IdGenerator<S> {
    store: S,
}

impl<S: OrderStore> IdGenerator<S> {
    /// Probe bound. Generous relative to the 1000-value space so moderate
    /// concurrency doesn't produce false exhaustion.
    pub const MAX_ATTEMPTS: usize = 50;

    /// Creates a generator probing the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Draws a free order id, or fails with [`DomainError::ExhaustedIdSpace`]
    /// after [`Self::MAX_ATTEMPTS`] occupied candidates.
    pub async fn generate(&self) -> Result<OrderId> {
        for _ in 0..Self::MAX_ATTEMPTS {
            let candidate = OrderId::from_number(rand::thread_rng().gen_range(0..OrderId::SPACE));
            if !self.store.id_in_use(&candidate).await? {
                return Ok(candidate);
            }
        }
        tracing::warn!("order id generation exhausted its probe bound");
        Err(DomainError::ExhaustedIdSpace)
    }
}
