#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use herald_core::{
    ApiError, ApiResult, Channel, ChannelId, Directory, GuildId, Message, Outbound, ReactInterface,
    ReactionBinder, SentMessage, Transport, User, UserId,
};

pub fn alice() -> User {
    User::new("u1", "Alice")
}

pub fn bob() -> User {
    User::new("u2", "Bob")
}

pub fn general() -> Channel {
    Channel::guild("c1", "general", "g1")
}

pub fn message(content: &str, author: User, channel: Channel) -> Message {
    Message::new("m1", content, author, channel)
}

pub fn in_general(content: &str) -> Message {
    message(content, alice(), general())
}

pub fn direct(content: &str) -> Message {
    message(content, alice(), Channel::direct("d1"))
}

pub struct MockTransport {
    sent: Mutex<Vec<(ChannelId, Outbound)>>,
    deleted: Mutex<Vec<SentMessage>>,
    failing: Mutex<HashSet<ChannelId>>,
    self_id: UserId,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            self_id: UserId::from("bot"),
        })
    }

    pub fn fail_channel(&self, channel: &str) {
        self.failing.lock().insert(ChannelId::from(channel));
    }

    pub fn sent(&self) -> Vec<(ChannelId, Outbound)> {
        self.sent.lock().clone()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter_map(|(_, out)| out.content.clone())
            .collect()
    }

    pub fn deleted(&self) -> Vec<SentMessage> {
        self.deleted.lock().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
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

    /// Always fails, as if someone had already removed the message.
    async fn delete(&self, message: &SentMessage) -> ApiResult<()> {
        self.deleted.lock().push(message.clone());
        Err(ApiError::MessageNotFound(message.id.to_string()))
    }
}

pub struct MockDirectory;

#[async_trait]
impl Directory for MockDirectory {
    async fn user(&self, id: &UserId) -> ApiResult<Option<User>> {
        Ok([alice(), bob()].into_iter().find(|u| &u.id == id))
    }

    async fn channel(&self, id: &ChannelId) -> ApiResult<Option<Channel>> {
        Ok((general().id == *id).then(general))
    }

    async fn members(&self, _guild: &GuildId) -> ApiResult<Vec<User>> {
        Ok(vec![alice(), bob()])
    }

    async fn channels(&self, _guild: &GuildId) -> ApiResult<Vec<Channel>> {
        Ok(vec![general()])
    }
}

#[derive(Default)]
pub struct MockBinder {
    pub bound: Mutex<Vec<(SentMessage, ReactInterface, UserId)>>,
}

#[async_trait]
impl ReactionBinder for MockBinder {
    async fn bind(
        &self,
        response: &SentMessage,
        interface: &ReactInterface,
        owner: &UserId,
    ) -> ApiResult<()> {
        self.bound
            .lock()
            .push((response.clone(), interface.clone(), owner.clone()));
        Ok(())
    }
}
