//! Order status state machine.

use serde::{Deserialize, Serialize};

/// The state of an order in its lifecycle.
///
/// State transitions:
/// ```text
/// Placed ──► Claimed ──► Cooked ──► Delivered
///    ▲          │
///    └──────────┘ (lease expiry)
///
/// any non-terminal state ──► Deleted (administrative removal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Order has been placed and is waiting for a chef to claim it.
    #[default]
    Placed,

    /// A chef holds the claim and is cooking, under a lease.
    Claimed,

    /// Cooking is done; the order is waiting to be delivered.
    Cooked,

    /// Order has reached the customer (terminal state).
    Delivered,

    /// Order was removed administratively (terminal state).
    Deleted,
}

impl OrderStatus {
    /// Returns true if a worker can claim the order in this state.
    pub fn can_claim(&self) -> bool {
        matches!(self, OrderStatus::Placed)
    }

    /// Returns true if the order can be marked cooked in this state.
    pub fn can_cook(&self) -> bool {
        matches!(self, OrderStatus::Claimed)
    }

    /// Returns true if the order can be delivered in this state.
    pub fn can_deliver(&self) -> bool {
        matches!(self, OrderStatus::Cooked)
    }

    /// Returns true if this is a terminal state (no further transitions).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Deleted)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Placed => "placed",
            OrderStatus::Claimed => "claimed",
            OrderStatus::Cooked => "cooked",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Deleted => "deleted",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when a string names no known order status.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Unknown order status: {0:?}")]
pub struct UnknownOrderStatus(pub String);

impl std::str::FromStr for OrderStatus {
    type Err = UnknownOrderStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "placed" => Ok(OrderStatus::Placed),
            "claimed" => Ok(OrderStatus::Claimed),
            "cooked" => Ok(OrderStatus::Cooked),
            "delivered" => Ok(OrderStatus::Delivered),
            "deleted" => Ok(OrderStatus::Deleted),
            other => Err(UnknownOrderStatus(other.to_string())),
        }
    }
}
