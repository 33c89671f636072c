//! The order record and the patches that transition it.

use chrono::{DateTime, Utc};
use common::{ChannelId, DeliveryMethod, GuildId, OrderId, UserId};
use serde::{Deserialize, Serialize};

use crate::status::OrderStatus;

/// A single order record.
///
/// Identity fields (`id`, `order_text`, `customer`, `guild`, `channel`,
/// `image`) are immutable after creation; everything else changes only
/// through [`OrderPatch`]es applied by the store's conditional update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Short unique id, assigned at creation.
    pub id: OrderId,

    /// Free-form customer-supplied description of the order.
    pub order_text: String,

    /// The customer who placed the order.
    pub customer: UserId,

    /// Guild the order was placed from.
    pub guild: GuildId,

    /// Channel the order was placed from.
    pub channel: ChannelId,

    /// The chef currently holding the cook claim.
    pub chef: Option<UserId>,

    /// The worker assigned to deliver the order.
    pub deliverer: Option<UserId>,

    /// Current lifecycle state.
    pub status: OrderStatus,

    /// How the order was delivered; set only on successful delivery.
    pub delivery_method: Option<DeliveryMethod>,

    /// When the order was placed.
    pub ordered_at: DateTime<Utc>,

    /// When cooking finished.
    pub cooked_at: Option<DateTime<Utc>>,

    /// When the order was delivered.
    pub delivered_at: Option<DateTime<Utc>>,

    /// Deadline of the current claim lease. Durable so that claims can be
    /// reconciled after a restart, not just by in-process timers.
    pub lease_expires_at: Option<DateTime<Utc>>,

    /// Optional attached media reference.
    pub image: Option<String>,
}

impl Order {
    /// Creates a freshly placed order.
    pub fn place(
        id: OrderId,
        customer: UserId,
        guild: GuildId,
        channel: ChannelId,
        order_text: impl Into<String>,
        image: Option<String>,
    ) -> Self {
        Self {
            id,
            order_text: order_text.into(),
            customer,
            guild,
            channel,
            chef: None,
            deliverer: None,
            status: OrderStatus::Placed,
            delivery_method: None,
            ordered_at: Utc::now(),
            cooked_at: None,
            delivered_at: None,
            lease_expires_at: None,
            image: None,
        }
        .with_image(image)
    }

    fn with_image(mut self, image: Option<String>) -> Self {
        self.image = image;
        self
    }
}

/// A partial write applied by [`OrderStore::conditional_update`].
///
/// `None` leaves a field untouched; clearable fields use a nested `Option`
/// where `Some(None)` clears. Constructors exist for exactly the transitions
/// the state machine defines, so call sites cannot build nonsense patches.
///
/// [`OrderStore::conditional_update`]: crate::store::OrderStore::conditional_update
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPatch {
    pub status: Option<OrderStatus>,
    pub chef: Option<Option<UserId>>,
    pub deliverer: Option<Option<UserId>>,
    pub delivery_method: Option<DeliveryMethod>,
    pub cooked_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub lease_expires_at: Option<Option<DateTime<Utc>>>,
}

impl OrderPatch {
    /// `placed → claimed`: assigns the chef and starts the lease.
    pub fn claim(chef: UserId, lease_expires_at: DateTime<Utc>) -> Self {
        Self {
            status: Some(OrderStatus::Claimed),
            chef: Some(Some(chef)),
            lease_expires_at: Some(Some(lease_expires_at)),
            ..Self::default()
        }
    }

    /// `claimed → placed`: clears the chef and the lease (auto-release).
    pub fn release() -> Self {
        Self {
            status: Some(OrderStatus::Placed),
            chef: Some(None),
            lease_expires_at: Some(None),
            ..Self::default()
        }
    }

    /// `claimed → cooked`: stamps `cooked_at`, assigns the deliverer and
    /// ends the lease.
    pub fn cook(deliverer: UserId, cooked_at: DateTime<Utc>) -> Self {
        Self {
            status: Some(OrderStatus::Cooked),
            deliverer: Some(Some(deliverer)),
            cooked_at: Some(cooked_at),
            lease_expires_at: Some(None),
            ..Self::default()
        }
    }

    /// `cooked → delivered`: stamps `delivered_at` and the method used.
    /// The chef field empties here; a chef is only recorded while the order
    /// is claimed or cooked.
    pub fn deliver(method: DeliveryMethod, delivered_at: DateTime<Utc>) -> Self {
        Self {
            status: Some(OrderStatus::Delivered),
            chef: Some(None),
            delivery_method: Some(method),
            delivered_at: Some(delivered_at),
            ..Self::default()
        }
    }

    /// Administrative removal from any non-terminal state.
    pub fn delete() -> Self {
        Self {
            status: Some(OrderStatus::Deleted),
            chef: Some(None),
            deliverer: Some(None),
            lease_expires_at: Some(None),
            ..Self::default()
        }
    }

    /// Applies the patch to a record in place.
    pub fn apply_to(&self, order: &mut Order) {
        if let Some(status) = self.status {
            order.status = status;
        }
        if let Some(ref chef) = self.chef {
            order.chef = chef.clone();
        }
        if let Some(ref deliverer) = self.deliverer {
            order.deliverer = deliverer.clone();
        }
        if let Some(method) = self.delivery_method {
            order.delivery_method = Some(method);
        }
        if let Some(cooked_at) = self.cooked_at {
            order.cooked_at = Some(cooked_at);
        }
        if let Some(delivered_at) = self.delivered_at {
            order.delivered_at = Some(delivered_at);
        }
        if let Some(lease) = self.lease_expires_at {
            order.lease_expires_at = lease;
        }
    }
}
