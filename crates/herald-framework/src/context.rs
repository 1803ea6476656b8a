//! Per-dispatch context types.
//!
//! - [`Actor`]: the author as seen from the conversation the message came
//!   from (a guild member, or a bare user in a direct conversation).
//! - [`Target`]: what a message resolved to, a [`Command`] or an armed
//!   await. Middleware inspects it before anything runs.
//! - [`Invocation`]: everything a handler action receives.

use std::sync::Arc;

use herald_core::{GuildId, Message, SentMessage, User};

use crate::argument::{ArgSpec, Args, usage};
use crate::awaits::AwaitHandle;
use crate::command::Command;
use crate::handler::BoxedAction;

/// The message author, scoped to the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user: User,
    /// The guild the author is acting in, `None` in direct conversations.
    pub guild: Option<GuildId>,
}

impl Actor {
    pub fn from_message(message: &Message) -> Self {
        Self {
            user: message.author.clone(),
            guild: message.guild_id().cloned(),
        }
    }

    pub fn is_member(&self) -> bool {
        self.guild.is_some()
    }
}

/// The resolved routing target of one message.
#[derive(Debug, Clone)]
pub enum Target {
    Command(Arc<Command>),
    Await(AwaitHandle),
}

impl Target {
    /// Command name, or the await's key.
    pub fn name(&self) -> &str {
        match self {
            Self::Command(command) => command.name(),
            Self::Await(handle) => handle.key().as_str(),
        }
    }

    pub fn specs(&self) -> &[ArgSpec] {
        match self {
            Self::Command(command) => command.specs(),
            Self::Await(handle) => handle.spec().specs(),
        }
    }

    pub fn action(&self) -> Option<&BoxedAction> {
        match self {
            Self::Command(command) => command.action_ref(),
            Self::Await(handle) => Some(handle.spec().action()),
        }
    }

    /// Usage line for error replies. Awaits have no keyword, so only their
    /// arguments are listed.
    pub fn usage(&self) -> String {
        match self {
            Self::Command(command) => command.usage(),
            Self::Await(handle) => usage("", handle.spec().specs()).trim_start().to_string(),
        }
    }

    pub fn as_command(&self) -> Option<&Command> {
        match self {
            Self::Command(command) => Some(command),
            Self::Await(_) => None,
        }
    }

    pub fn is_await(&self) -> bool {
        matches!(self, Self::Await(_))
    }
}

/// What a handler action is called with.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub actor: Actor,
    pub message: Message,
    pub args: Args,
    /// For awaits armed by a reply: the sent message that carried them.
    pub trigger_response: Option<SentMessage>,
}
