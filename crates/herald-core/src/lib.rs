//! # Herald Core
//!
//! The foundation layer of the Herald chat router.
//!
//! This crate holds the vocabulary every other layer speaks, and nothing
//! stateful:
//!
//! - **Identities**: opaque string ids for channels, users, guilds and
//!   messages ([`ChannelId`], [`UserId`], [`GuildId`], [`MessageId`])
//! - **Messages**: the inbound [`Message`] and the outbound [`Outbound`]
//!   payload, plus the [`SentMessage`] receipt a transport hands back
//! - **Collaborators**: the traits the router drives but never implements
//!   itself ([`Transport`], [`Directory`], [`ReactionBinder`])
//!
//! ```text
//! ┌─────────────┐  Message   ┌────────────┐  Outbound  ┌─────────────┐
//! │  Transport  │───────────▶│ Dispatcher │───────────▶│  Transport  │
//! │  (inbound)  │            │ (framework)│            │   (send)    │
//! └─────────────┘            └────────────┘            └─────────────┘
//! ```

pub mod error;
pub mod id;
pub mod message;
pub mod transport;

pub use error::{ApiError, ApiResult};
pub use id::{ChannelId, GuildId, MessageId, UserId};
pub use message::{
    Attachment, Channel, ChannelKind, Embed, Message, Outbound, SentMessage, User,
};
pub use transport::{
    BoxedDirectory, BoxedReactionBinder, BoxedTransport, Directory, ReactButton, ReactInterface,
    ReactionBinder, Transport,
};

/// Prelude for common imports.
pub mod prelude {
    pub use super::error::{ApiError, ApiResult};
    pub use super::id::*;
    pub use super::message::*;
    pub use super::transport::{Directory, ReactionBinder, Transport};
}
