//! Handler replies.
//!
//! A handler returns zero or more [`Reply`] values. Each is either plain
//! text or a [`RichReply`] with an optional embed, file and delivery
//! [`ReplyOptions`]. The dispatcher turns every reply into one canonical
//! [`Prepared`] shape through [`Reply::prepare`] and never looks at the
//! original variant again.

use std::time::Duration;

use herald_core::{Attachment, ChannelId, Embed, Outbound, ReactInterface};

use crate::awaits::Await;

/// Delivery options for a reply.
#[derive(Debug, Clone, Default)]
pub struct ReplyOptions {
    /// Destinations. Empty means the conversation the message came from.
    pub channels: Vec<ChannelId>,
    /// Follow-up awaits armed once per destination after sending.
    pub awaits: Vec<Await>,
    /// Reaction buttons bound to each sent message.
    pub react_interface: Option<ReactInterface>,
    /// Delete each sent message after this long. Failures are ignored.
    pub delete_after: Option<Duration>,
}

/// A reply with payload and options.
#[derive(Debug, Clone, Default)]
pub struct RichReply {
    pub content: Option<String>,
    pub embed: Option<Embed>,
    pub file: Option<Attachment>,
    pub options: ReplyOptions,
}

impl RichReply {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn embed(mut self, embed: Embed) -> Self {
        self.embed = Some(embed);
        self
    }

    pub fn file(mut self, file: Attachment) -> Self {
        self.file = Some(file);
        self
    }

    /// Adds a destination channel.
    pub fn channel(mut self, channel: impl Into<ChannelId>) -> Self {
        self.options.channels.push(channel.into());
        self
    }

    pub fn channels(mut self, channels: impl IntoIterator<Item = ChannelId>) -> Self {
        self.options.channels.extend(channels);
        self
    }

    /// Adds a follow-up await.
    pub fn await_reply(mut self, spec: Await) -> Self {
        self.options.awaits.push(spec);
        self
    }

    pub fn react_interface(mut self, interface: ReactInterface) -> Self {
        self.options.react_interface = Some(interface);
        self
    }

    pub fn delete_after(mut self, delay: Duration) -> Self {
        self.options.delete_after = Some(delay);
        self
    }
}

/// One handler result.
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Rich(RichReply),
}

/// A reply normalized for delivery.
#[derive(Debug, Clone)]
pub struct Prepared {
    /// What to send. May be empty when the reply only arms awaits.
    pub payload: Outbound,
    /// Destinations, never empty.
    pub channels: Vec<ChannelId>,
    pub awaits: Vec<Await>,
    pub react_interface: Option<ReactInterface>,
    pub delete_after: Option<Duration>,
}

impl Prepared {
    /// Returns `true` if there is a payload to send.
    pub fn sends(&self) -> bool {
        !self.payload.is_empty()
    }
}

impl Reply {
    /// Normalizes this reply, defaulting the destination to `origin`.
    ///
    /// Returns `None` for replies with nothing to do: empty text, or a rich
    /// reply with neither payload nor awaits.
    pub fn prepare(self, origin: &ChannelId) -> Option<Prepared> {
        let rich = match self {
            Self::Text(text) => RichReply::new().content(text),
            Self::Rich(rich) => rich,
        };
        let payload = Outbound {
            content: rich.content,
            embed: rich.embed,
            file: rich.file,
        };
        let options = rich.options;
        if payload.is_empty() && options.awaits.is_empty() {
            return None;
        }
        let channels = if options.channels.is_empty() {
            vec![origin.clone()]
        } else {
            options.channels
        };
        Some(Prepared {
            payload,
            channels,
            awaits: options.awaits,
            react_interface: options.react_interface,
            delete_after: options.delete_after,
        })
    }
}

impl From<String> for Reply {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Reply {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<RichReply> for Reply {
    fn from(rich: RichReply) -> Self {
        Self::Rich(rich)
    }
}

// =============================================================================
// Replies
// =============================================================================

/// Everything one action invocation returned, in order.
#[derive(Debug, Clone, Default)]
pub struct Replies(pub Vec<Reply>);

impl Replies {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl IntoIterator for Replies {
    type Item = Reply;
    type IntoIter = std::vec::IntoIter<Reply>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl From<()> for Replies {
    fn from(_: ()) -> Self {
        Self::none()
    }
}

impl From<Reply> for Replies {
    fn from(reply: Reply) -> Self {
        Self(vec![reply])
    }
}

impl From<String> for Replies {
    fn from(text: String) -> Self {
        Reply::from(text).into()
    }
}

impl From<&str> for Replies {
    fn from(text: &str) -> Self {
        Reply::from(text).into()
    }
}

impl From<RichReply> for Replies {
    fn from(rich: RichReply) -> Self {
        Reply::from(rich).into()
    }
}

impl<T: Into<Reply>> From<Vec<T>> for Replies {
    fn from(replies: Vec<T>) -> Self {
        Self(replies.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Replies>> From<Option<T>> for Replies {
    fn from(reply: Option<T>) -> Self {
        reply.map(Into::into).unwrap_or_default()
    }
}
