use common::OrderId;
use thiserror::Error;

/// Errors that can occur when interacting with the order store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An order with this id already exists and is not terminal.
    #[error("An order with id {0} already exists")]
    DuplicateId(OrderId),

    /// The order was not found in the store.
    #[error("Order {0} not found")]
    NotFound(OrderId),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
