//! Order lifecycle domain: claim leasing, id generation, delivery dispatch
//! and the service façade that ties them together over an order store.

pub mod claim;
pub mod delivery;
pub mod error;
pub mod id;
pub mod service;
pub mod template;

pub use claim::{
    ChannelNotifier, ClaimManager, InMemoryNotifier, Notification, Notifier, DEFAULT_LEASE,
};
pub use delivery::{
    BalanceService, ChannelInfo, DeliveryDispatcher, Directory, InMemoryBalanceService,
    InMemoryDirectory, InMemoryInviteCreator, InMemoryMessenger, Invite, InviteCreator, Messenger,
    SentMessage, TransportError, DEFAULT_DELIVERY_MESSAGE,
};
pub use error::{DomainError, Result};
pub use id::IdGenerator;
pub use service::{
    OrderService, OrderSuggestion, PlaceOrder, SearchFilter, DEFAULT_ORDER_PRICE, MAX_SUGGESTIONS,
};
pub use template::{ActorInfo, Rule, TemplateEngine};
