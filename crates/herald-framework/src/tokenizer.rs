//! Delimiter-driven argument tokenizer.
//!
//! [`tokenize`] walks an ordered [`ArgSpec`] list over a raw text span.
//! Each position is cut at the first occurrence of its own delimiter; the
//! final position always takes whatever text is left. The raw substring is
//! then coerced according to the position's [`ArgKind`]:
//!
//! | kind      | coercion |
//! |-----------|----------|
//! | `String`  | used as-is |
//! | `Number`  | parsed as `f64`; `NaN` and `0` fail the whole call |
//! | `User`    | handed to the [`Resolver`] |
//! | `Channel` | handed to the [`Resolver`] |
//!
//! A failing position aborts the entire call with `None`. Checking that all
//! mandatory positions were filled is left to the caller, see
//! [`Args::covers`].

use async_trait::async_trait;
use tracing::trace;

use herald_core::{BoxedDirectory, ChannelId, Message, UserId};

use crate::argument::{ArgKind, ArgSpec, ArgValue, Args};

// =============================================================================
// Resolver
// =============================================================================

/// Resolves `user` and `channel` arguments.
#[async_trait]
pub trait Resolver: Send + Sync + 'static {
    /// Turns `raw` into a value of `kind`, using `scope` (the triggering
    /// message) to decide which guild to search. Returns `None` when nothing
    /// matches.
    async fn resolve(&self, scope: &Message, raw: &str, kind: ArgKind) -> Option<ArgValue>;
}

/// The default resolver, backed by a [`Directory`](herald_core::Directory).
///
/// A token is first read as a mention (`<@id>`, `<@!id>` for users, `<#id>`
/// for channels) and looked up by id. Failing that, it is matched
/// case-insensitively as a substring of the display names of the members or
/// channels of the message's guild. The first match wins.
pub struct DirectoryResolver {
    directory: BoxedDirectory,
}

impl DirectoryResolver {
    pub fn new(directory: BoxedDirectory) -> Self {
        Self { directory }
    }
}

/// Extracts the id from `<@id>` or `<@!id>`.
pub fn parse_user_mention(raw: &str) -> Option<UserId> {
    let inner = raw.strip_prefix("<@")?.strip_suffix('>')?;
    let inner = inner.strip_prefix('!').unwrap_or(inner);
    (!inner.is_empty()).then(|| UserId::from(inner))
}

/// Extracts the id from `<#id>`.
pub fn parse_channel_mention(raw: &str) -> Option<ChannelId> {
    let inner = raw.strip_prefix("<#")?.strip_suffix('>')?;
    (!inner.is_empty()).then(|| ChannelId::from(inner))
}

#[async_trait]
impl Resolver for DirectoryResolver {
    async fn resolve(&self, scope: &Message, raw: &str, kind: ArgKind) -> Option<ArgValue> {
        let raw = raw.trim();
        let needle = raw.to_lowercase();
        match kind {
            ArgKind::User => {
                if let Some(id) = parse_user_mention(raw) {
                    return self.directory.user(&id).await.ok().flatten().map(ArgValue::User);
                }
                let guild = scope.guild_id()?;
                let members = self.directory.members(guild).await.ok()?;
                members
                    .into_iter()
                    .find(|member| member.name.to_lowercase().contains(&needle))
                    .map(ArgValue::User)
            }
            ArgKind::Channel => {
                if let Some(id) = parse_channel_mention(raw) {
                    return self
                        .directory
                        .channel(&id)
                        .await
                        .ok()
                        .flatten()
                        .map(ArgValue::Channel);
                }
                let guild = scope.guild_id()?;
                let channels = self.directory.channels(guild).await.ok()?;
                channels
                    .into_iter()
                    .find(|channel| channel.name.to_lowercase().contains(&needle))
                    .map(ArgValue::Channel)
            }
            ArgKind::String | ArgKind::Number => None,
        }
    }
}

// =============================================================================
// Tokenizer
// =============================================================================

/// Parses a numeric argument. Zero is rejected along with `NaN`.
fn parse_number(raw: &str) -> Option<f64> {
    let value: f64 = raw.trim().parse().ok()?;
    (value != 0.0 && !value.is_nan()).then_some(value)
}

/// Splits `text` into positional values according to `specs`.
///
/// Returns `None` if any position fails to coerce.
pub async fn tokenize(
    specs: &[ArgSpec],
    text: &str,
    resolver: &dyn Resolver,
    scope: &Message,
) -> Option<Args> {
    let mut values = Vec::with_capacity(specs.len());
    let mut rest = text;

    for (index, spec) in specs.iter().enumerate() {
        let is_last = index + 1 == specs.len();
        let delimiter = spec.delimiter_str();

        let raw = if is_last || delimiter.is_empty() {
            std::mem::take(&mut rest)
        } else {
            match rest.find(delimiter) {
                Some(at) => {
                    let raw = &rest[..at];
                    rest = &rest[at + delimiter.len()..];
                    raw
                }
                None => std::mem::take(&mut rest),
            }
        };

        if raw.is_empty() {
            values.push(None);
            continue;
        }

        let value = match spec.arg_kind() {
            ArgKind::String => ArgValue::Text(raw.to_string()),
            ArgKind::Number => match parse_number(raw) {
                Some(n) => ArgValue::Number(n),
                None => {
                    trace!(arg = spec.name(), raw, "Numeric argument rejected");
                    return None;
                }
            },
            kind @ (ArgKind::User | ArgKind::Channel) => {
                match resolver.resolve(scope, raw, kind).await {
                    Some(value) => value,
                    None => {
                        trace!(arg = spec.name(), raw, %kind, "Argument did not resolve");
                        return None;
                    }
                }
            }
        };
        values.push(Some(value));
    }

    Some(Args::new(values))
}
