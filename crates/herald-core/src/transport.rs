//! Collaborator traits.
//!
//! The router never talks to a chat service directly. It drives three
//! collaborators supplied by the embedding application:
//!
//! - [`Transport`]: sends and deletes messages, and knows the bot's own id
//! - [`Directory`]: looks up users and channels for argument resolution
//! - [`ReactionBinder`]: attaches an interactive button set to a sent message
//!
//! All three are object-safe and shared as `Arc<dyn _>`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::id::{ChannelId, GuildId, UserId};
use crate::message::{Channel, Outbound, SentMessage, User};

/// The outbound half of a chat connection.
///
/// # Example Implementation
///
/// ```rust,ignore
/// struct Stdout { me: UserId }
///
/// #[async_trait]
/// impl Transport for Stdout {
///     fn self_id(&self) -> &UserId { &self.me }
///
///     async fn send(&self, channel: &ChannelId, message: &Outbound) -> ApiResult<SentMessage> {
///         println!("[{channel}] {}", message.content.as_deref().unwrap_or_default());
///         Ok(SentMessage::new("0", channel.clone()))
///     }
///
///     async fn delete(&self, _message: &SentMessage) -> ApiResult<()> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// The bot's own user id, used to recognise self-mentions.
    fn self_id(&self) -> &UserId;

    /// Sends a payload to a channel.
    ///
    /// Failures are reported to the caller and never retried by the router.
    async fn send(&self, channel: &ChannelId, message: &Outbound) -> ApiResult<SentMessage>;

    /// Deletes a previously sent message.
    async fn delete(&self, message: &SentMessage) -> ApiResult<()>;
}

/// A shared transport trait object.
pub type BoxedTransport = Arc<dyn Transport>;

/// Membership and channel index used to resolve `user` / `channel`
/// arguments.
#[async_trait]
pub trait Directory: Send + Sync + 'static {
    /// Looks up a user by id.
    async fn user(&self, id: &UserId) -> ApiResult<Option<User>>;

    /// Looks up a channel by id.
    async fn channel(&self, id: &ChannelId) -> ApiResult<Option<Channel>>;

    /// Lists the members of a guild.
    async fn members(&self, guild: &GuildId) -> ApiResult<Vec<User>>;

    /// Lists the channels of a guild.
    async fn channels(&self, guild: &GuildId) -> ApiResult<Vec<Channel>>;
}

/// A shared directory trait object.
pub type BoxedDirectory = Arc<dyn Directory>;

/// One button of a reaction interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactButton {
    /// The emoji rendered as the button.
    pub emoji: String,
    /// Identifier handed back to the binder's own handler when pressed.
    pub action: String,
}

impl ReactButton {
    pub fn new(emoji: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            emoji: emoji.into(),
            action: action.into(),
        }
    }
}

/// A set of reaction buttons requested by a reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactInterface {
    pub buttons: Vec<ReactButton>,
}

impl ReactInterface {
    pub fn new(buttons: impl IntoIterator<Item = ReactButton>) -> Self {
        Self {
            buttons: buttons.into_iter().collect(),
        }
    }
}

/// Attaches reaction interfaces to sent messages.
///
/// Only consulted when a reply asks for an interface, and only if a binder
/// was installed at startup.
#[async_trait]
pub trait ReactionBinder: Send + Sync + 'static {
    /// Binds `interface` to `response`; only `owner` may press the buttons.
    async fn bind(
        &self,
        response: &SentMessage,
        interface: &ReactInterface,
        owner: &UserId,
    ) -> ApiResult<()>;
}

/// A shared reaction binder trait object.
pub type BoxedReactionBinder = Arc<dyn ReactionBinder>;
