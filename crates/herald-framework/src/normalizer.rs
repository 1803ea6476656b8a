//! Message normalization.
//!
//! Every inbound message goes through [`normalize`] before routing:
//!
//! 1. inline replacers are expanded (even if the message is not a command)
//! 2. a leading self-mention (`<@id>` or `<@!id>`, followed by whitespace)
//!    or the effective prefix is stripped
//!
//! The effective prefix is the per-scope override from the [`PrefixTable`]
//! when one is set, the global default otherwise. Direct conversations
//! count as prefixed whether or not a prefix was typed.

use std::collections::HashMap;

use parking_lot::RwLock;

use herald_core::{Message, UserId};

use crate::replacer::{Markers, ReplacerTable, substitute};
use crate::tokenizer::Resolver;

/// The result of normalizing one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    /// Text after replacer expansion and prefix stripping.
    pub content: String,
    /// Whether the message was directed at the bot.
    pub prefixed: bool,
}

/// Global prefix plus per-scope overrides that can change at runtime.
#[derive(Debug)]
pub struct PrefixTable {
    default: String,
    overrides: RwLock<HashMap<String, String>>,
}

impl PrefixTable {
    pub fn new(default: impl Into<String>) -> Self {
        Self {
            default: default.into(),
            overrides: RwLock::new(HashMap::new()),
        }
    }

    pub fn default_prefix(&self) -> &str {
        &self.default
    }

    /// The prefix in effect for `scope`.
    pub fn effective(&self, scope: &str) -> String {
        self.overrides
            .read()
            .get(scope)
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }

    /// Sets an override, returning the previous one.
    pub fn set(&self, scope: impl Into<String>, prefix: impl Into<String>) -> Option<String> {
        self.overrides.write().insert(scope.into(), prefix.into())
    }

    /// Removes an override, returning it.
    pub fn clear(&self, scope: &str) -> Option<String> {
        self.overrides.write().remove(scope)
    }
}

/// Borrowed state needed to normalize a message.
pub struct NormalizeEnv<'a> {
    pub prefixes: &'a PrefixTable,
    pub markers: &'a Markers,
    pub replacers: &'a ReplacerTable,
    pub resolver: &'a dyn Resolver,
    pub self_id: &'a UserId,
}

/// Strips `<@id>` / `<@!id>` plus the whitespace that must follow it.
fn strip_self_mention<'t>(text: &'t str, self_id: &UserId) -> Option<&'t str> {
    let rest = text.strip_prefix("<@")?;
    let rest = rest.strip_prefix('!').unwrap_or(rest);
    let rest = rest.strip_prefix(self_id.as_str())?.strip_prefix('>')?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest)
    } else {
        None
    }
}

/// Strips the self-mention or the effective prefix.
fn strip_prefix<'t>(text: &'t str, prefix: &str, self_id: &UserId) -> Option<&'t str> {
    strip_self_mention(text, self_id).or_else(|| {
        if prefix.is_empty() {
            None
        } else {
            text.strip_prefix(prefix)
        }
    })
}

/// Normalizes one inbound message.
pub async fn normalize(message: &Message, env: &NormalizeEnv<'_>) -> Normalized {
    let text = substitute(
        &message.content,
        env.markers,
        env.replacers,
        env.resolver,
        message,
    )
    .await;

    let prefix = env.prefixes.effective(message.scope());
    match strip_prefix(&text, &prefix, env.self_id) {
        Some(rest) => Normalized {
            content: rest.trim_start().to_string(),
            prefixed: true,
        },
        None => Normalized {
            prefixed: message.is_direct(),
            content: text,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::argument::ArgSpec;
    use crate::replacer::Replacer;
    use crate::testing::{FixtureResolver, direct_message, guild_message};

    struct Env {
        prefixes: PrefixTable,
        markers: Markers,
        replacers: ReplacerTable,
        self_id: UserId,
    }

    impl Env {
        fn new() -> Self {
            let mut replacers = ReplacerTable::new();
            replacers
                .register(
                    Replacer::new("upper", |call| {
                        call.args.text(0).unwrap_or_default().to_uppercase()
                    })
                    .args([ArgSpec::required("text").delimiter("")]),
                )
                .unwrap();
            Self {
                prefixes: PrefixTable::new("!"),
                markers: Markers::new("{", "}").unwrap(),
                replacers,
                self_id: UserId::from("bot"),
            }
        }

        async fn run(&self, message: &Message) -> Normalized {
            let env = NormalizeEnv {
                prefixes: &self.prefixes,
                markers: &self.markers,
                replacers: &self.replacers,
                resolver: &FixtureResolver,
                self_id: &self.self_id,
            };
            normalize(message, &env).await
        }
    }

    #[tokio::test]
    async fn test_default_prefix_stripped() {
        let env = Env::new();
        let out = env.run(&guild_message("!ping now")).await;
        assert_eq!(
            out,
            Normalized {
                content: "ping now".into(),
                prefixed: true
            }
        );
    }

    #[tokio::test]
    async fn test_unprefixed_guild_message() {
        let env = Env::new();
        let out = env.run(&guild_message("ping")).await;
        assert!(!out.prefixed);
        assert_eq!(out.content, "ping");
    }

    #[tokio::test]
    async fn test_self_mention_variants() {
        let env = Env::new();
        for text in ["<@bot> ping", "<@!bot> ping", "<@bot>   ping"] {
            let out = env.run(&guild_message(text)).await;
            assert!(out.prefixed, "{text}");
            assert_eq!(out.content, "ping");
        }
        // Mention of someone else, or glued to the next word, is not a prefix.
        assert!(!env.run(&guild_message("<@other> ping")).await.prefixed);
        assert!(!env.run(&guild_message("<@bot>ping")).await.prefixed);
    }

    #[tokio::test]
    async fn test_scope_override_replaces_default() {
        let env = Env::new();
        env.prefixes.set("g1", "?");
        assert!(!env.run(&guild_message("!ping")).await.prefixed);
        let out = env.run(&guild_message("?ping")).await;
        assert!(out.prefixed);
        assert_eq!(out.content, "ping");

        env.prefixes.clear("g1");
        assert!(env.run(&guild_message("!ping")).await.prefixed);
    }

    #[tokio::test]
    async fn test_direct_messages_are_always_prefixed() {
        let env = Env::new();
        let out = env.run(&direct_message("ping")).await;
        assert!(out.prefixed);
        assert_eq!(out.content, "ping");
        let out = env.run(&direct_message("!ping")).await;
        assert_eq!(out.content, "ping");
    }

    #[tokio::test]
    async fn test_replacers_run_before_prefix_matching() {
        let env = Env::new();
        let out = env.run(&guild_message("hello {upper world}")).await;
        assert!(!out.prefixed);
        assert_eq!(out.content, "hello WORLD");

        let out = env.run(&guild_message("!say {upper x}")).await;
        assert_eq!(out.content, "say X");
    }
}
