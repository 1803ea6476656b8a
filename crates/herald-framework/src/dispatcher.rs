//! Message dispatcher for the Herald framework.
//!
//! The [`Dispatcher`] takes one inbound [`Message`] at a time through a
//! fixed pipeline. Every step may end the dispatch early:
//!
//! 1. Normalize (replacers, prefix or self-mention stripping)
//! 2. Offer the message to the await armed for its channel and author
//! 3. Otherwise, if the message was prefixed, resolve the first word
//!    against the command table
//! 4. Validate `restricted` / `guild_only`
//! 5. Run middleware in registration order
//! 6. Tokenize arguments and check mandatory coverage
//! 7. Invoke the action
//! 8. Deliver every reply to its channels concurrently, then arm follow-up
//!    awaits, bind reaction interfaces and schedule deletions per channel
//! 9. Refresh or clear the await that was triggered, if any
//!
//! ```rust,ignore
//! use herald_framework::{Command, Dispatcher};
//!
//! let dispatcher = Dispatcher::builder(transport)
//!     .directory(directory)
//!     .prefix("!")
//!     .command(Command::new("ping").action(|_inv: Invocation| async {
//!         Ok::<_, BoxError>("pong")
//!     }))
//!     .build()?;
//!
//! dispatcher.dispatch(&message).await?;
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{Instrument, Level, debug, span, trace, warn};

use herald_core::{
    ApiError, BoxedDirectory, BoxedReactionBinder, BoxedTransport, ChannelId, Message, Outbound,
    SentMessage, UserId,
};

use crate::argument::{ArgKind, ArgValue};
use crate::awaits::{AwaitKey, AwaitRegistry};
use crate::command::{Command, CommandTable};
use crate::context::{Actor, Invocation, Target};
use crate::error::{DispatchError, DispatchResult, InputError, SetupError};
use crate::middleware::{BoxedMiddleware, Middleware};
use crate::normalizer::{NormalizeEnv, Normalized, PrefixTable, normalize};
use crate::replacer::{Markers, Replacer, ReplacerTable};
use crate::reply::{Prepared, Replies};
use crate::tokenizer::{DirectoryResolver, Resolver, tokenize};

// =============================================================================
// Reports
// =============================================================================

/// What a dispatched message resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetKind {
    /// A command, by its canonical name.
    Command(String),
    /// A triggered await, by its key.
    Await(AwaitKey),
}

/// The outcome of sending one reply to one channel.
#[derive(Debug, Clone)]
pub enum Delivery {
    Sent(SentMessage),
    Failed(ApiError),
    /// The reply had nothing to send (it only armed awaits).
    Skipped,
}

impl Delivery {
    pub fn sent(&self) -> Option<&SentMessage> {
        match self {
            Self::Sent(sent) => Some(sent),
            _ => None,
        }
    }
}

/// Per-channel result of one reply.
#[derive(Debug, Clone)]
pub struct ChannelOutcome {
    pub channel: ChannelId,
    pub delivery: Delivery,
    /// Keys of the follow-up awaits armed for this channel.
    pub awaits: Vec<AwaitKey>,
}

/// Per-reply result.
#[derive(Debug, Clone)]
pub struct ReplyReport {
    pub payload: Outbound,
    pub delete_after: Option<Duration>,
    pub responses: Vec<ChannelOutcome>,
}

/// Summary of a completed dispatch.
#[derive(Debug, Clone)]
pub struct Dispatched {
    pub target: TargetKind,
    pub results: Vec<ReplyReport>,
}

// =============================================================================
// Builder
// =============================================================================

/// A resolver that never resolves, used when no directory is installed.
struct NoResolver;

#[async_trait]
impl Resolver for NoResolver {
    async fn resolve(&self, _scope: &Message, _raw: &str, _kind: ArgKind) -> Option<ArgValue> {
        None
    }
}

/// Builds a [`Dispatcher`].
pub struct DispatcherBuilder {
    transport: BoxedTransport,
    resolver: Option<Arc<dyn Resolver>>,
    prefix: String,
    prefix_overrides: Vec<(String, String)>,
    markers: (String, String),
    owner: Option<UserId>,
    binder: Option<BoxedReactionBinder>,
    commands: Vec<Command>,
    replacers: Vec<Replacer>,
    middleware: Vec<BoxedMiddleware>,
}

impl DispatcherBuilder {
    fn new(transport: BoxedTransport) -> Self {
        Self {
            transport,
            resolver: None,
            prefix: "!".to_string(),
            prefix_overrides: Vec::new(),
            markers: ("{".to_string(), "}".to_string()),
            owner: None,
            binder: None,
            commands: Vec::new(),
            replacers: Vec::new(),
            middleware: Vec::new(),
        }
    }

    /// Installs a custom `user` / `channel` argument resolver.
    pub fn resolver(mut self, resolver: impl Resolver) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Resolves `user` / `channel` arguments through a directory.
    pub fn directory(self, directory: BoxedDirectory) -> Self {
        self.resolver(DirectoryResolver::new(directory))
    }

    /// The global command prefix.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Seeds a per-scope prefix override.
    pub fn prefix_override(mut self, scope: impl Into<String>, prefix: impl Into<String>) -> Self {
        self.prefix_overrides.push((scope.into(), prefix.into()));
        self
    }

    /// Replacer open/close markers.
    pub fn markers(mut self, open: impl Into<String>, close: impl Into<String>) -> Self {
        self.markers = (open.into(), close.into());
        self
    }

    /// The application owner, the only user allowed to run restricted
    /// commands.
    pub fn owner(mut self, owner: impl Into<UserId>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Enables reaction interfaces.
    pub fn reactions(mut self, binder: BoxedReactionBinder) -> Self {
        self.binder = Some(binder);
        self
    }

    pub fn command(mut self, command: Command) -> Self {
        self.commands.push(command);
        self
    }

    pub fn replacer(mut self, replacer: Replacer) -> Self {
        self.replacers.push(replacer);
        self
    }

    pub fn middleware(mut self, middleware: impl Middleware) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Validates every registration and builds the dispatcher.
    pub fn build(self) -> Result<Dispatcher, SetupError> {
        let markers = Markers::new(self.markers.0, self.markers.1)?;

        let mut commands = CommandTable::new();
        for command in self.commands {
            commands.register(command)?;
        }
        let mut replacers = ReplacerTable::new();
        for replacer in self.replacers {
            replacers.register(replacer)?;
        }

        let prefixes = PrefixTable::new(self.prefix);
        for (scope, prefix) in self.prefix_overrides {
            prefixes.set(scope, prefix);
        }

        debug!(
            commands = commands.len(),
            replacers = replacers.len(),
            middleware = self.middleware.len(),
            reactions = self.binder.is_some(),
            "Dispatcher built"
        );

        Ok(Dispatcher {
            transport: self.transport,
            resolver: self.resolver.unwrap_or_else(|| Arc::new(NoResolver)),
            prefixes,
            markers,
            owner: self.owner,
            binder: self.binder,
            commands,
            replacers,
            middleware: self.middleware,
            awaits: AwaitRegistry::new(),
        })
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Routes inbound messages to commands and awaits.
///
/// `Dispatcher` is `Send + Sync`; share it behind an `Arc` to dispatch
/// messages concurrently. The await registry and prefix overrides are the
/// only state mutated after construction.
pub struct Dispatcher {
    transport: BoxedTransport,
    resolver: Arc<dyn Resolver>,
    prefixes: PrefixTable,
    markers: Markers,
    owner: Option<UserId>,
    binder: Option<BoxedReactionBinder>,
    commands: CommandTable,
    replacers: ReplacerTable,
    middleware: Vec<BoxedMiddleware>,
    awaits: AwaitRegistry,
}

impl Dispatcher {
    pub fn builder(transport: BoxedTransport) -> DispatcherBuilder {
        DispatcherBuilder::new(transport)
    }

    pub fn transport(&self) -> &BoxedTransport {
        &self.transport
    }

    pub fn commands(&self) -> &CommandTable {
        &self.commands
    }

    pub fn replacers(&self) -> &ReplacerTable {
        &self.replacers
    }

    pub fn awaits(&self) -> &AwaitRegistry {
        &self.awaits
    }

    /// The prefix in effect for a guild or direct channel.
    pub fn prefix_for(&self, scope: &str) -> String {
        self.prefixes.effective(scope)
    }

    /// Overrides the prefix for a scope, returning the previous override.
    pub fn set_prefix(&self, scope: impl Into<String>, prefix: impl Into<String>) -> Option<String> {
        let scope = scope.into();
        let prefix = prefix.into();
        debug!(scope = %scope, prefix = %prefix, "Prefix override set");
        self.prefixes.set(scope, prefix)
    }

    /// Drops a scope's prefix override.
    pub fn clear_prefix(&self, scope: &str) -> Option<String> {
        self.prefixes.clear(scope)
    }

    /// Dispatches one inbound message.
    ///
    /// Returns `Ok(None)` when the message was not for us: not prefixed, or
    /// naming no command. Input errors come back as
    /// [`DispatchError::Input`] and should be shown to the user; every other
    /// error is a defect.
    pub async fn dispatch(&self, message: &Message) -> DispatchResult<Option<Dispatched>> {
        let span = span!(
            Level::DEBUG,
            "dispatch",
            message = %message.id,
            channel = %message.channel.id,
            user = %message.author.id,
        );
        self.run(message).instrument(span).await
    }

    async fn run(&self, message: &Message) -> DispatchResult<Option<Dispatched>> {
        let env = NormalizeEnv {
            prefixes: &self.prefixes,
            markers: &self.markers,
            replacers: &self.replacers,
            resolver: &*self.resolver,
            self_id: self.transport.self_id(),
        };
        let normalized = normalize(message, &env).await;

        let Some((target, rest)) = self.resolve(message, &normalized) else {
            return Ok(None);
        };
        let actor = Actor::from_message(message);

        if let Some(command) = target.as_command() {
            self.validate(command, message)?;
        }
        let Some(action) = target.action().cloned() else {
            return Err(DispatchError::MissingAction(target.name().to_string()));
        };

        for middleware in &self.middleware {
            middleware.handle(message, &actor, &target).await?;
        }

        let specs = target.specs();
        let args = match tokenize(specs, rest, &*self.resolver, message).await {
            Some(args) if args.covers(specs) => args,
            _ => {
                debug!(target = target.name(), "Arguments did not satisfy the target");
                return Err(InputError::MissingArguments {
                    usage: target.usage(),
                }
                .into());
            }
        };

        let trigger_response = match &target {
            Target::Await(handle) => handle.trigger_response().cloned(),
            Target::Command(_) => None,
        };
        let invocation = Invocation {
            actor,
            message: message.clone(),
            args,
            trigger_response,
        };

        let outcome = action.call(invocation).await;
        let (results, defect) = match outcome {
            Ok(replies) => self.deliver(replies, message).await,
            Err(err) => (Vec::new(), Some(DispatchError::Handler(err))),
        };

        let kind = match &target {
            Target::Command(command) => TargetKind::Command(command.name().to_string()),
            Target::Await(handle) => {
                if handle.spec().refreshes_on_use() {
                    self.awaits.refresh(handle);
                } else {
                    self.awaits.clear(handle);
                }
                TargetKind::Await(handle.key().clone())
            }
        };

        if let Some(defect) = defect {
            return Err(defect);
        }
        Ok(Some(Dispatched {
            target: kind,
            results,
        }))
    }

    /// Steps 2 and 3: an await match wins, otherwise the first word of a
    /// prefixed message names the command. Returns the target and the text
    /// its arguments are parsed from.
    fn resolve<'n>(&self, message: &Message, normalized: &'n Normalized) -> Option<(Target, &'n str)> {
        let content = normalized.content.as_str();
        let (keyword, after) = match content.find(char::is_whitespace) {
            Some(at) => (&content[..at], content[at..].trim_start()),
            None => (content, ""),
        };

        if let Some(handle) = self.awaits.lookup(message, normalized) {
            let rest = if handle.spec().should_shift() {
                after
            } else {
                content
            };
            return Some((Target::Await(handle), rest));
        }

        if !normalized.prefixed {
            trace!("Message is not directed at us");
            return None;
        }
        match self.commands.get(keyword) {
            Some(command) => Some((Target::Command(command), after)),
            None => {
                trace!(keyword, "No command matches");
                None
            }
        }
    }

    fn validate(&self, command: &Command, message: &Message) -> Result<(), InputError> {
        if command.is_restricted() && self.owner.as_ref() != Some(&message.author.id) {
            return Err(InputError::Restricted {
                command: command.name().to_string(),
            });
        }
        if command.is_guild_only() && message.is_direct() {
            return Err(InputError::GuildOnly {
                command: command.name().to_string(),
            });
        }
        Ok(())
    }

    /// Step 8. Replies are processed in order; the first defect is
    /// returned after every reply has been delivered.
    async fn deliver(
        &self,
        replies: Replies,
        message: &Message,
    ) -> (Vec<ReplyReport>, Option<DispatchError>) {
        let mut reports = Vec::new();
        let mut first_defect = None;

        for reply in replies {
            let Some(prepared) = reply.prepare(&message.channel.id) else {
                trace!("Skipping empty reply");
                continue;
            };
            let outcomes = join_all(
                prepared
                    .channels
                    .iter()
                    .map(|channel| self.deliver_to(channel, &prepared, message)),
            )
            .await;

            let mut responses = Vec::with_capacity(outcomes.len());
            for (outcome, defect) in outcomes {
                responses.push(outcome);
                if first_defect.is_none() {
                    first_defect = defect;
                }
            }
            reports.push(ReplyReport {
                payload: prepared.payload,
                delete_after: prepared.delete_after,
                responses,
            });
        }
        (reports, first_defect)
    }

    /// Sends one prepared reply to one channel and post-processes the
    /// receipt. A failed send ends processing for this channel only.
    async fn deliver_to(
        &self,
        channel: &ChannelId,
        prepared: &Prepared,
        message: &Message,
    ) -> (ChannelOutcome, Option<DispatchError>) {
        let mut outcome = ChannelOutcome {
            channel: channel.clone(),
            delivery: Delivery::Skipped,
            awaits: Vec::new(),
        };
        let mut defect = None;

        if prepared.sends() {
            match self.transport.send(channel, &prepared.payload).await {
                Ok(sent) => outcome.delivery = Delivery::Sent(sent),
                Err(err) => {
                    warn!(channel = %channel, error = %err, "Failed to send reply");
                    outcome.delivery = Delivery::Failed(err);
                    return (outcome, None);
                }
            }
        }
        let sent = outcome.delivery.sent().cloned();

        for spec in &prepared.awaits {
            match self
                .awaits
                .register(spec.clone(), Some(channel), Some(&message.author.id), sent.clone())
            {
                Ok(handle) => outcome.awaits.push(handle.key().clone()),
                Err(err) => {
                    defect.get_or_insert(DispatchError::Await(err));
                }
            }
        }

        if let Some(interface) = &prepared.react_interface {
            match (&self.binder, &sent) {
                (None, _) => {
                    defect.get_or_insert(DispatchError::ReactionsDisabled);
                }
                (Some(binder), Some(sent)) => {
                    if let Err(err) = binder.bind(sent, interface, &message.author.id).await {
                        warn!(channel = %channel, error = %err, "Failed to bind reaction interface");
                    }
                }
                (Some(_), None) => {
                    debug!(channel = %channel, "Nothing was sent, reaction interface not bound");
                }
            }
        }

        if let (Some(delay), Some(sent)) = (prepared.delete_after, sent) {
            let transport = Arc::clone(&self.transport);
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if let Err(err) = transport.delete(&sent).await {
                    debug!(message = %sent.id, error = %err, "Delayed delete failed, ignoring");
                }
            });
        }

        (outcome, defect)
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("prefix", &self.prefixes.default_prefix())
            .field("commands", &self.commands.len())
            .field("replacers", &self.replacers.len())
            .field("middleware", &self.middleware.len())
            .field("awaits", &self.awaits)
            .finish_non_exhaustive()
    }
}
