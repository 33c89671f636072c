//! Persistence layer for order records.
//!
//! The store is deliberately small: create, point lookup, filtered listing,
//! and a single compare-and-swap style `conditional_update` that every state
//! transition in the engine goes through. There is no read-then-write path.

pub mod error;
pub mod memory;
pub mod order;
pub mod query;
pub mod status;
pub mod store;

pub use common::{ChannelId, DeliveryMethod, GuildId, OrderId, UserId};
pub use error::{Result, StoreError};
pub use memory::InMemoryOrderStore;
pub use order::{Order, OrderPatch};
pub use query::OrderQuery;
pub use status::{OrderStatus, UnknownOrderStatus};
pub use store::{OrderStore, OrderStoreExt};
