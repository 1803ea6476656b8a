//! Message types for the Herald router.
//!
//! Inbound traffic is a [`Message`]: who said what, where. Outbound traffic
//! is an [`Outbound`] payload (any combination of text, an embed and a
//! file) addressed to a channel; the transport answers with a
//! [`SentMessage`] receipt that later steps (reaction binding, delayed
//! deletion) refer back to.

use serde::{Deserialize, Serialize};

use crate::id::{ChannelId, GuildId, MessageId, UserId};

// ============================================================================
// Participants
// ============================================================================

/// A user account as seen by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// Display name used for name-based argument resolution.
    pub name: String,
}

impl User {
    pub fn new(id: impl Into<UserId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Whether a channel is a one-to-one conversation or belongs to a guild.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelKind {
    /// A direct, one-to-one conversation. No prefix is required here.
    Direct,
    /// A channel inside a guild.
    Guild(GuildId),
}

/// A conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    pub name: String,
    pub kind: ChannelKind,
}

impl Channel {
    /// Creates a guild channel.
    pub fn guild(id: impl Into<ChannelId>, name: impl Into<String>, guild: impl Into<GuildId>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: ChannelKind::Guild(guild.into()),
        }
    }

    /// Creates a direct (one-to-one) channel.
    pub fn direct(id: impl Into<ChannelId>) -> Self {
        let id = id.into();
        Self {
            name: id.to_string(),
            id,
            kind: ChannelKind::Direct,
        }
    }

    pub fn is_direct(&self) -> bool {
        matches!(self.kind, ChannelKind::Direct)
    }

    pub fn guild_id(&self) -> Option<&GuildId> {
        match &self.kind {
            ChannelKind::Guild(id) => Some(id),
            ChannelKind::Direct => None,
        }
    }
}

// ============================================================================
// Inbound
// ============================================================================

/// One inbound chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub content: String,
    pub author: User,
    pub channel: Channel,
}

impl Message {
    pub fn new(
        id: impl Into<MessageId>,
        content: impl Into<String>,
        author: User,
        channel: Channel,
    ) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            author,
            channel,
        }
    }

    /// Returns `true` when the message arrived in a one-to-one conversation.
    pub fn is_direct(&self) -> bool {
        self.channel.is_direct()
    }

    /// The guild the message was posted in, if any.
    pub fn guild_id(&self) -> Option<&GuildId> {
        self.channel.guild_id()
    }

    /// The key used for per-conversation settings such as prefix overrides:
    /// the guild id for guild channels, the channel id for direct ones.
    pub fn scope(&self) -> &str {
        match self.guild_id() {
            Some(guild) => guild.as_str(),
            None => self.channel.id.as_str(),
        }
    }
}

// ============================================================================
// Outbound
// ============================================================================

/// A structured rich-content block. The router passes it through untouched.
pub type Embed = serde_json::Value;

/// A file attached to an outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub data: Vec<u8>,
}

impl Attachment {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

/// The sendable part of a reply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outbound {
    pub content: Option<String>,
    pub embed: Option<Embed>,
    pub file: Option<Attachment>,
}

impl Outbound {
    /// A plain text payload.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    /// Returns `true` if there is nothing to send.
    pub fn is_empty(&self) -> bool {
        self.content.as_deref().is_none_or(str::is_empty)
            && self.embed.is_none()
            && self.file.is_none()
    }
}

/// Receipt for a message the transport delivered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SentMessage {
    pub id: MessageId,
    pub channel_id: ChannelId,
}

impl SentMessage {
    pub fn new(id: impl Into<MessageId>, channel_id: impl Into<ChannelId>) -> Self {
        Self {
            id: id.into(),
            channel_id: channel_id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_prefers_guild() {
        let author = User::new("u1", "alice");
        let msg = Message::new("m1", "hi", author.clone(), Channel::guild("c1", "general", "g1"));
        assert_eq!(msg.scope(), "g1");
        assert!(!msg.is_direct());

        let dm = Message::new("m2", "hi", author, Channel::direct("d1"));
        assert_eq!(dm.scope(), "d1");
        assert!(dm.is_direct());
        assert!(dm.guild_id().is_none());
    }

    #[test]
    fn test_outbound_emptiness() {
        assert!(Outbound::default().is_empty());
        assert!(Outbound::text("").is_empty());
        assert!(!Outbound::text("ok").is_empty());

        let embed_only = Outbound {
            embed: Some(serde_json::json!({ "title": "hi" })),
            ..Default::default()
        };
        assert!(!embed_only.is_empty());
    }
}
