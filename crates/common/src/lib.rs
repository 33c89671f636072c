//! Shared types for the order engine.

pub mod types;

pub use types::{
    ChannelId, DeliveryMethod, GuildId, InvalidOrderId, OrderId, UnknownDeliveryMethod, UserId,
};
