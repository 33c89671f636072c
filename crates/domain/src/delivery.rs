//! Delivery dispatch.
//!
//! Once an order is cooked, the deliverer hands it over through one of three
//! transports: a direct message to the customer, a bot post in the order's
//! origin channel, or a personal delivery where the worker receives the
//! rendered message plus a single-use invite into the order's channel. The
//! dispatcher renders the message from the deliverer's custom template (or
//! the system default) and talks to the platform only through the traits in
//! this module.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{ChannelId, DeliveryMethod, GuildId, UserId};
use order_store::Order;
use thiserror::Error;

use crate::error::{DomainError, Result};
use crate::template::{ActorInfo, Rule, TemplateEngine};

/// Delivery message used when the deliverer has no custom template.
pub const DEFAULT_DELIVERY_MESSAGE: &str = "Hello {customer}! Here is your order: {order}\n\
Cooked by {chef} at {cook:datetime} and delivered by {deliverer}.\n\
Thank you for ordering at Pixel Pizza!\n\
{image}";

/// Failure talking to the chat platform.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The user's direct messages are closed or the user is gone.
    #[error("user {0} can't receive direct messages")]
    DmClosed(UserId),

    /// The channel is gone or the bot can't post in it.
    #[error("channel {0} is unavailable")]
    ChannelUnavailable(ChannelId),

    /// Invite creation was refused by the platform.
    #[error("could not create an invite: {0}")]
    InviteRefused(String),
}

/// Outbound message transport.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Sends a direct message to a user.
    async fn send_dm(&self, user: &UserId, text: &str) -> std::result::Result<(), TransportError>;

    /// Posts a message in a channel.
    async fn send_channel(
        &self,
        channel: &ChannelId,
        text: &str,
    ) -> std::result::Result<(), TransportError>;
}

/// Presentation data for a channel, as far as delivery cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub name: String,
    /// Threads have no invite target of their own; delivery falls back to
    /// the parent.
    pub is_thread: bool,
    pub parent: Option<ChannelId>,
}

impl ChannelInfo {
    /// A plain text channel.
    pub fn channel(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_thread: false,
            parent: None,
        }
    }

    /// A thread under the given parent channel.
    pub fn thread(name: impl Into<String>, parent: ChannelId) -> Self {
        Self {
            name: name.into(),
            is_thread: true,
            parent: Some(parent),
        }
    }

    /// A thread whose parent is gone. Personal delivery into it fails.
    pub fn orphan_thread(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_thread: true,
            parent: None,
        }
    }
}

/// Read-only lookups against the platform and the external profile store.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Resolves a user to presentation data. `None` when the user is gone.
    async fn user(&self, id: &UserId) -> std::result::Result<Option<ActorInfo>, TransportError>;

    /// Resolves a channel. `None` when the channel is gone.
    async fn channel(
        &self,
        id: &ChannelId,
    ) -> std::result::Result<Option<ChannelInfo>, TransportError>;

    /// Resolves a guild's display name.
    async fn guild_name(
        &self,
        id: &GuildId,
    ) -> std::result::Result<Option<String>, TransportError>;

    /// The user's custom delivery-message template, if they set one.
    async fn delivery_template(
        &self,
        id: &UserId,
    ) -> std::result::Result<Option<String>, TransportError>;
}

/// A created channel invite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invite {
    pub code: String,
    pub channel: ChannelId,
}

impl Invite {
    /// Full invite URL.
    pub fn url(&self) -> String {
        format!("https://discord.gg/{}", self.code)
    }

    /// Invite URL without the scheme, as embedded in delivery messages.
    pub fn bare_url(&self) -> String {
        format!("discord.gg/{}", self.code)
    }
}

/// Creates single-use, non-expiring invites into a channel.
#[async_trait]
pub trait InviteCreator: Send + Sync {
    async fn create_invite(
        &self,
        channel: &ChannelId,
    ) -> std::result::Result<Invite, TransportError>;
}

/// Debits customers when they place an order.
#[async_trait]
pub trait BalanceService: Send + Sync {
    /// Withdraws `amount` from the user's balance. Returns `false` when the
    /// balance doesn't cover it; nothing is debited in that case.
    async fn withdraw(
        &self,
        user: &UserId,
        amount: u64,
    ) -> std::result::Result<bool, TransportError>;
}

/// Renders and sends delivery messages.
pub struct DeliveryDispatcher {
    messenger: Arc<dyn Messenger>,
    directory: Arc<dyn Directory>,
    invites: Arc<dyn InviteCreator>,
    /// Channel the `{invite}` placeholder's invite points into.
    invite_channel: ChannelId,
}

impl DeliveryDispatcher {
    pub fn new(
        messenger: Arc<dyn Messenger>,
        directory: Arc<dyn Directory>,
        invites: Arc<dyn InviteCreator>,
        invite_channel: ChannelId,
    ) -> Self {
        Self {
            messenger,
            directory,
            invites,
            invite_channel,
        }
    }

    /// Renders the delivery message and sends it over the chosen transport.
    ///
    /// Any transport failure surfaces as [`DomainError::DeliveryFailed`];
    /// the caller leaves the order cooked so delivery can be retried.
    #[tracing::instrument(skip(self, order), fields(id = %order.id))]
    pub async fn deliver(
        &self,
        order: &Order,
        method: DeliveryMethod,
        deliverer: &UserId,
        delivered_at: DateTime<Utc>,
    ) -> Result<String> {
        let failed = |source: TransportError| DomainError::DeliveryFailed {
            id: order.id.clone(),
            source,
        };

        // Personal deliveries escape actor names: the message travels to
        // the worker, and a crafted username must stay inert there.
        let escaped = method == DeliveryMethod::Personal;
        let message = self
            .render(order, deliverer, delivered_at, escaped)
            .await
            .map_err(failed)?;

        match method {
            DeliveryMethod::Dm => {
                self.messenger
                    .send_dm(&order.customer, &message)
                    .await
                    .map_err(failed)?;
            }
            DeliveryMethod::Bot => {
                self.messenger
                    .send_channel(&order.channel, &message)
                    .await
                    .map_err(failed)?;
            }
            DeliveryMethod::Personal => {
                let target = self.invite_target(order).await?;
                let invite = self
                    .invites
                    .create_invite(&target)
                    .await
                    .map_err(failed)?;
                self.messenger
                    .send_dm(deliverer, &message)
                    .await
                    .map_err(failed)?;
                self.messenger
                    .send_dm(
                        deliverer,
                        &format!(
                            "Don't send this link to the customer!\n{}",
                            invite.url()
                        ),
                    )
                    .await
                    .map_err(failed)?;
            }
        }

        metrics::counter!("deliveries_total", "method" => method.as_str()).increment(1);
        tracing::info!(%method, %deliverer, "order delivered");
        Ok(message)
    }

    /// Resolves where a personal-delivery invite should point: the order's
    /// channel, or its parent when the channel is a thread.
    async fn invite_target(&self, order: &Order) -> Result<ChannelId> {
        let info = self
            .directory
            .channel(&order.channel)
            .await
            .map_err(|source| DomainError::DeliveryFailed {
                id: order.id.clone(),
                source,
            })?
            .ok_or(DomainError::InvalidChannel)?;

        if info.is_thread {
            info.parent.ok_or(DomainError::InvalidChannel)
        } else {
            Ok(order.channel.clone())
        }
    }

    async fn render(
        &self,
        order: &Order,
        deliverer: &UserId,
        delivered_at: DateTime<Utc>,
        escaped: bool,
    ) -> std::result::Result<String, TransportError> {
        let template = self
            .directory
            .delivery_template(deliverer)
            .await?
            .unwrap_or_else(|| DEFAULT_DELIVERY_MESSAGE.to_string());

        let chef = match &order.chef {
            Some(id) => self.directory.user(id).await?,
            None => None,
        };
        let deliverer_info = self.directory.user(deliverer).await?;
        let customer = self.directory.user(&order.customer).await?;
        let guild_name = self
            .directory
            .guild_name(&order.guild)
            .await?
            .unwrap_or_else(|| "Unknown Guild".to_string());
        let channel_name = self
            .directory
            .channel(&order.channel)
            .await?
            .map(|info| info.name)
            .unwrap_or_else(|| "Unknown Channel".to_string());
        let invite = self.invites.create_invite(&self.invite_channel).await?;

        let rules = vec![
            Rule::Actor {
                name: "chef",
                actor: chef,
                fallback: "Unknown Chef",
            },
            Rule::Actor {
                name: "deliverer",
                actor: deliverer_info,
                fallback: "Unknown Deliverer",
            },
            Rule::Actor {
                name: "customer",
                actor: customer,
                fallback: "Unknown Customer",
            },
            Rule::Scalar {
                name: "image",
                value: order.image.clone().unwrap_or_default(),
            },
            Rule::Scalar {
                name: "invite",
                value: invite.bare_url(),
            },
            Rule::Scalar {
                name: "orderID",
                value: order.id.to_string(),
            },
            Rule::Scalar {
                name: "order",
                value: order.order_text.clone(),
            },
            Rule::Date {
                name: "order",
                at: order.ordered_at,
            },
            Rule::Date {
                name: "cook",
                at: order.cooked_at.unwrap_or(delivered_at),
            },
            Rule::Date {
                name: "delivery",
                at: delivered_at,
            },
            Rule::Scalar {
                name: "guild",
                value: guild_name.clone(),
            },
            Rule::Scalar {
                name: "server",
                value: guild_name,
            },
            Rule::Scalar {
                name: "channel",
                value: channel_name,
            },
        ];

        Ok(TemplateEngine::new(rules).escaped(escaped).render(&template))
    }
}

/// A message recorded by [`InMemoryMessenger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentMessage {
    Dm { to: UserId, text: String },
    Channel { to: ChannelId, text: String },
}

/// In-memory messenger for tests and local runs.
#[derive(Clone, Default)]
pub struct InMemoryMessenger {
    sent: Arc<RwLock<Vec<SentMessage>>>,
    fail_on_dm: Arc<RwLock<bool>>,
    fail_on_channel: Arc<RwLock<bool>>,
}

impl InMemoryMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent DM fail, as if the recipient closed theirs.
    pub fn set_fail_on_dm(&self, fail: bool) {
        *self.fail_on_dm.write().unwrap() = fail;
    }

    /// Makes every subsequent channel post fail.
    pub fn set_fail_on_channel(&self, fail: bool) {
        *self.fail_on_channel.write().unwrap() = fail;
    }

    /// Everything sent so far, in order.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.read().unwrap().clone()
    }

    /// Direct messages sent to the given user, in order.
    pub fn dms_to(&self, user: &UserId) -> Vec<String> {
        self.sent
            .read()
            .unwrap()
            .iter()
            .filter_map(|m| match m {
                SentMessage::Dm { to, text } if to == user => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Messages posted to the given channel, in order.
    pub fn channel_messages(&self, channel: &ChannelId) -> Vec<String> {
        self.sent
            .read()
            .unwrap()
            .iter()
            .filter_map(|m| match m {
                SentMessage::Channel { to, text } if to == channel => Some(text.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Messenger for InMemoryMessenger {
    async fn send_dm(&self, user: &UserId, text: &str) -> std::result::Result<(), TransportError> {
        if *self.fail_on_dm.read().unwrap() {
            return Err(TransportError::DmClosed(user.clone()));
        }
        self.sent.write().unwrap().push(SentMessage::Dm {
            to: user.clone(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_channel(
        &self,
        channel: &ChannelId,
        text: &str,
    ) -> std::result::Result<(), TransportError> {
        if *self.fail_on_channel.read().unwrap() {
            return Err(TransportError::ChannelUnavailable(channel.clone()));
        }
        self.sent.write().unwrap().push(SentMessage::Channel {
            to: channel.clone(),
            text: text.to_string(),
        });
        Ok(())
    }
}

#[derive(Default)]
struct DirectoryData {
    users: HashMap<UserId, ActorInfo>,
    channels: HashMap<ChannelId, ChannelInfo>,
    guilds: HashMap<GuildId, String>,
    templates: HashMap<UserId, String>,
}

/// In-memory directory for tests and local runs.
#[derive(Clone, Default)]
pub struct InMemoryDirectory {
    data: Arc<RwLock<DirectoryData>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&self, info: ActorInfo) {
        let mut data = self.data.write().unwrap();
        data.users.insert(info.id.clone(), info);
    }

    pub fn insert_channel(&self, id: ChannelId, info: ChannelInfo) {
        self.data.write().unwrap().channels.insert(id, info);
    }

    pub fn insert_guild(&self, id: GuildId, name: impl Into<String>) {
        self.data.write().unwrap().guilds.insert(id, name.into());
    }

    pub fn set_delivery_template(&self, user: UserId, template: impl Into<String>) {
        self.data
            .write()
            .unwrap()
            .templates
            .insert(user, template.into());
    }
}

#[async_trait]
impl Directory for InMemoryDirectory {
    async fn user(&self, id: &UserId) -> std::result::Result<Option<ActorInfo>, TransportError> {
        Ok(self.data.read().unwrap().users.get(id).cloned())
    }

    async fn channel(
        &self,
        id: &ChannelId,
    ) -> std::result::Result<Option<ChannelInfo>, TransportError> {
        Ok(self.data.read().unwrap().channels.get(id).cloned())
    }

    async fn guild_name(
        &self,
        id: &GuildId,
    ) -> std::result::Result<Option<String>, TransportError> {
        Ok(self.data.read().unwrap().guilds.get(id).cloned())
    }

    async fn delivery_template(
        &self,
        id: &UserId,
    ) -> std::result::Result<Option<String>, TransportError> {
        Ok(self.data.read().unwrap().templates.get(id).cloned())
    }
}

/// In-memory invite creator. Codes are random and recorded for inspection.
#[derive(Clone, Default)]
pub struct InMemoryInviteCreator {
    created: Arc<RwLock<Vec<Invite>>>,
    fail_on_create: Arc<RwLock<bool>>,
}

impl InMemoryInviteCreator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_on_create(&self, fail: bool) {
        *self.fail_on_create.write().unwrap() = fail;
    }

    /// Every invite created so far, in order.
    pub fn created(&self) -> Vec<Invite> {
        self.created.read().unwrap().clone()
    }
}

#[async_trait]
impl InviteCreator for InMemoryInviteCreator {
    async fn create_invite(
        &self,
        channel: &ChannelId,
    ) -> std::result::Result<Invite, TransportError> {
        if *self.fail_on_create.read().unwrap() {
            return Err(TransportError::InviteRefused(
                "invite creation disabled".to_string(),
            ));
        }
        let invite = Invite {
            code: uuid::Uuid::new_v4().simple().to_string(),
            channel: channel.clone(),
        };
        self.created.write().unwrap().push(invite.clone());
        Ok(invite)
    }
}

/// In-memory balance service. Unknown users have a zero balance.
#[derive(Clone, Default)]
pub struct InMemoryBalanceService {
    balances: Arc<RwLock<HashMap<UserId, u64>>>,
}

impl InMemoryBalanceService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deposit(&self, user: UserId, amount: u64) {
        *self.balances.write().unwrap().entry(user).or_insert(0) += amount;
    }

    pub fn balance(&self, user: &UserId) -> u64 {
        self.balances
            .read()
            .unwrap()
            .get(user)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl BalanceService for InMemoryBalanceService {
    async fn withdraw(
        &self,
        user: &UserId,
        amount: u64,
    ) -> std::result::Result<bool, TransportError> {
        let mut balances = self.balances.write().unwrap();
        let balance = balances.entry(user.clone()).or_insert(0);
        if *balance < amount {
            return Ok(false);
        }
        *balance -= amount;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::OrderId;
    use order_store::OrderStatus;

    fn cooked_order() -> Order {
        let mut order = Order::place(
            OrderId::parse("042").unwrap(),
            UserId::new("customer"),
            GuildId::new("guild"),
            ChannelId::new("channel"),
            "Quattro Formaggi",
            None,
        );
        order.status = OrderStatus::Cooked;
        order.chef = Some(UserId::new("chef"));
        order.deliverer = Some(UserId::new("chef"));
        order.cooked_at = Some(Utc::now());
        order
    }

    struct Fixture {
        messenger: InMemoryMessenger,
        directory: InMemoryDirectory,
        invites: InMemoryInviteCreator,
        dispatcher: DeliveryDispatcher,
    }

    fn fixture() -> Fixture {
        let messenger = InMemoryMessenger::new();
        let directory = InMemoryDirectory::new();
        let invites = InMemoryInviteCreator::new();

        directory.insert_user(ActorInfo::new(UserId::new("chef"), "mario", "mario#0001"));
        directory.insert_user(ActorInfo::new(
            UserId::new("customer"),
            "peach",
            "peach#0002",
        ));
        directory.insert_guild(GuildId::new("guild"), "Pixel Pizza");
        directory.insert_channel(ChannelId::new("channel"), ChannelInfo::channel("orders"));
        directory.insert_channel(ChannelId::new("invites"), ChannelInfo::channel("welcome"));

        let dispatcher = DeliveryDispatcher::new(
            Arc::new(messenger.clone()),
            Arc::new(directory.clone()),
            Arc::new(invites.clone()),
            ChannelId::new("invites"),
        );
        Fixture {
            messenger,
            directory,
            invites,
            dispatcher,
        }
    }

    #[tokio::test]
    async fn dm_delivery_messages_the_customer() {
        let f = fixture();
        let order = cooked_order();

        f.dispatcher
            .deliver(&order, DeliveryMethod::Dm, &UserId::new("chef"), Utc::now())
            .await
            .unwrap();

        let dms = f.messenger.dms_to(&UserId::new("customer"));
        assert_eq!(dms.len(), 1);
        assert!(dms[0].contains("Quattro Formaggi"));
        assert!(dms[0].contains("mario#0001"));
    }

    #[tokio::test]
    async fn bot_delivery_posts_in_the_origin_channel() {
        let f = fixture();
        let order = cooked_order();

        f.dispatcher
            .deliver(
                &order,
                DeliveryMethod::Bot,
                &UserId::new("chef"),
                Utc::now(),
            )
            .await
            .unwrap();

        let posts = f.messenger.channel_messages(&ChannelId::new("channel"));
        assert_eq!(posts.len(), 1);
        assert!(posts[0].contains("Quattro Formaggi"));
        assert!(f.messenger.dms_to(&UserId::new("customer")).is_empty());
    }

    #[tokio::test]
    async fn personal_delivery_sends_message_and_invite_to_the_worker() {
        let f = fixture();
        let order = cooked_order();

        f.dispatcher
            .deliver(
                &order,
                DeliveryMethod::Personal,
                &UserId::new("chef"),
                Utc::now(),
            )
            .await
            .unwrap();

        let dms = f.messenger.dms_to(&UserId::new("chef"));
        assert_eq!(dms.len(), 2);
        // Escaped mode: actor names arrive backtick-wrapped.
        assert!(dms[0].contains("`mario#0001`"));
        assert!(dms[1].starts_with("Don't send this link to the customer!"));
        assert!(f.messenger.dms_to(&UserId::new("customer")).is_empty());

        // One invite for {invite}, one for the personal handover, the
        // latter pointing into the order's channel.
        let created = f.invites.created();
        assert_eq!(created.len(), 2);
        assert_eq!(created[1].channel, ChannelId::new("channel"));
        assert!(dms[1].contains(&created[1].code));
    }

    #[tokio::test]
    async fn personal_delivery_into_a_thread_invites_to_the_parent() {
        let f = fixture();
        f.directory.insert_channel(
            ChannelId::new("thread"),
            ChannelInfo::thread("order-thread", ChannelId::new("channel")),
        );
        let mut order = cooked_order();
        order.channel = ChannelId::new("thread");

        f.dispatcher
            .deliver(
                &order,
                DeliveryMethod::Personal,
                &UserId::new("chef"),
                Utc::now(),
            )
            .await
            .unwrap();

        let created = f.invites.created();
        assert_eq!(created[1].channel, ChannelId::new("channel"));
    }

    #[tokio::test]
    async fn personal_delivery_into_an_orphan_thread_is_invalid_channel() {
        let f = fixture();
        f.directory.insert_channel(
            ChannelId::new("thread"),
            ChannelInfo::orphan_thread("order-thread"),
        );
        let mut order = cooked_order();
        order.channel = ChannelId::new("thread");

        let result = f
            .dispatcher
            .deliver(
                &order,
                DeliveryMethod::Personal,
                &UserId::new("chef"),
                Utc::now(),
            )
            .await;
        assert!(matches!(result, Err(DomainError::InvalidChannel)));
        assert!(f.messenger.sent().is_empty());
    }

    #[tokio::test]
    async fn transport_failure_is_reported_as_delivery_failed() {
        let f = fixture();
        f.messenger.set_fail_on_dm(true);
        let order = cooked_order();

        let result = f
            .dispatcher
            .deliver(&order, DeliveryMethod::Dm, &UserId::new("chef"), Utc::now())
            .await;
        assert!(matches!(result, Err(DomainError::DeliveryFailed { .. })));
    }

    #[tokio::test]
    async fn custom_template_overrides_the_default() {
        let f = fixture();
        f.directory.set_delivery_template(
            UserId::new("chef"),
            "{orderID} from {guild}/#{channel}: {order}",
        );
        let order = cooked_order();

        f.dispatcher
            .deliver(&order, DeliveryMethod::Dm, &UserId::new("chef"), Utc::now())
            .await
            .unwrap();

        let dms = f.messenger.dms_to(&UserId::new("customer"));
        assert_eq!(dms[0], "042 from Pixel Pizza/#orders: Quattro Formaggi");
    }

    #[tokio::test]
    async fn unknown_actors_fall_back_in_the_rendered_message() {
        let f = fixture();
        let mut order = cooked_order();
        order.chef = Some(UserId::new("ghost"));

        f.dispatcher
            .deliver(&order, DeliveryMethod::Dm, &UserId::new("chef"), Utc::now())
            .await
            .unwrap();

        let dms = f.messenger.dms_to(&UserId::new("customer"));
        assert!(dms[0].contains("Unknown Chef"));
    }

    #[tokio::test]
    async fn balance_withdrawals_stop_at_zero() {
        let balances = InMemoryBalanceService::new();
        let user = UserId::new("customer");
        balances.deposit(user.clone(), 30);

        assert!(balances.withdraw(&user, 20).await.unwrap());
        assert!(!balances.withdraw(&user, 20).await.unwrap());
        assert_eq!(balances.balance(&user), 10);
    }
}
