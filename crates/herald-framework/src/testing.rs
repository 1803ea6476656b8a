//! In-memory collaborators for unit tests.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use herald_core::{
    ApiError, ApiResult, Channel, ChannelId, Directory, GuildId, Message, Outbound, SentMessage,
    Transport, User, UserId,
};

use crate::argument::{ArgKind, ArgValue};
use crate::tokenizer::{DirectoryResolver, Resolver};

/// A message from Alice in `#general` of guild `g1`.
pub fn guild_message(content: &str) -> Message {
    Message::new(
        "m1",
        content,
        User::new("u1", "Alice"),
        Channel::guild("c1", "general", "g1"),
    )
}

/// A direct message from Alice.
pub fn direct_message(content: &str) -> Message {
    Message::new("m2", content, User::new("u1", "Alice"), Channel::direct("d1"))
}

/// Guild `g1` with members Alice (`u1`) and Bob (`u2`) and channels
/// `general` (`c1`) and `random` (`c2`).
pub struct FixtureDirectory {
    users: Vec<User>,
    channels: Vec<Channel>,
}

impl Default for FixtureDirectory {
    fn default() -> Self {
        Self {
            users: vec![User::new("u1", "Alice"), User::new("u2", "Bob")],
            channels: vec![
                Channel::guild("c1", "general", "g1"),
                Channel::guild("c2", "random", "g1"),
            ],
        }
    }
}

#[async_trait]
impl Directory for FixtureDirectory {
    async fn user(&self, id: &UserId) -> ApiResult<Option<User>> {
        Ok(self.users.iter().find(|u| &u.id == id).cloned())
    }

    async fn channel(&self, id: &ChannelId) -> ApiResult<Option<Channel>> {
        Ok(self.channels.iter().find(|c| &c.id == id).cloned())
    }

    async fn members(&self, guild: &GuildId) -> ApiResult<Vec<User>> {
        Ok(if guild.as_str() == "g1" {
            self.users.clone()
        } else {
            Vec::new()
        })
    }

    async fn channels(&self, guild: &GuildId) -> ApiResult<Vec<Channel>> {
        Ok(self
            .channels
            .iter()
            .filter(|c| c.guild_id() == Some(guild))
            .cloned()
            .collect())
    }
}

/// A resolver over [`FixtureDirectory`].
pub struct FixtureResolver;

#[async_trait]
impl Resolver for FixtureResolver {
    async fn resolve(&self, scope: &Message, raw: &str, kind: ArgKind) -> Option<ArgValue> {
        DirectoryResolver::new(Arc::new(FixtureDirectory::default()))
            .resolve(scope, raw, kind)
            .await
    }
}

/// A transport that records sends and deletes. Sends to channels marked
/// with [`fail_channel`](Self::fail_channel) fail.
pub struct RecordingTransport {
    self_id: UserId,
    sent: Mutex<Vec<(ChannelId, Outbound)>>,
    deleted: Mutex<Vec<SentMessage>>,
    failing: Mutex<HashSet<ChannelId>>,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            self_id: UserId::from("bot"),
            sent: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
        })
    }

    pub fn fail_channel(&self, channel: &str) {
        self.failing.lock().insert(ChannelId::from(channel));
    }

    pub fn sent(&self) -> Vec<(ChannelId, Outbound)> {
        self.sent.lock().clone()
    }

    pub fn deleted(&self) -> Vec<SentMessage> {
        self.deleted.lock().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    fn self_id(&self) -> &UserId {
        &self.self_id
    }

    async fn send(&self, channel: &ChannelId, message: &Outbound) -> ApiResult<SentMessage> {
        if self.failing.lock().contains(channel) {
            return Err(ApiError::ChannelNotFound(channel.to_string()));
        }
        let mut sent = self.sent.lock();
        sent.push((channel.clone(), message.clone()));
        Ok(SentMessage::new(format!("s{}", sent.len()), channel.clone()))
    }

    async fn delete(&self, message: &SentMessage) -> ApiResult<()> {
        self.deleted.lock().push(message.clone());
        Err(ApiError::MessageNotFound(message.id.to_string()))
    }
}
