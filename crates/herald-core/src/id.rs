//! Opaque identifiers.
//!
//! Every id is a transport-assigned string. The router never parses them;
//! it only compares, hashes and concatenates them. Channel and user ids are
//! assumed to be globally unique strings (the await registry keys on their
//! concatenation).

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps a raw identifier.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id!(
    /// Identifies a conversation: a guild text channel or a one-to-one DM.
    ChannelId
);
define_id!(
    /// Identifies a user account.
    UserId
);
define_id!(
    /// Identifies a guild, the parent group of guild channels.
    GuildId
);
define_id!(
    /// Identifies a single message within a channel.
    MessageId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display_and_conversions() {
        let id = ChannelId::from("123");
        assert_eq!(id.to_string(), "123");
        assert_eq!(id.as_str(), "123");
        assert_eq!(id, ChannelId::new(String::from("123")));
    }

    #[test]
    fn test_id_serializes_transparently() {
        let id = UserId::new("42");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"42\"");
        let back: UserId = serde_json::from_str("\"42\"").unwrap();
        assert_eq!(back, id);
    }
}
