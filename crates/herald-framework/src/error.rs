//! Error types for the Herald framework.
//!
//! Errors fall into two classes:
//!
//! - [`InputError`]: the user typed something we cannot act on (missing
//!   arguments, a restricted or guild-only command, a middleware veto). The
//!   owning collaborator turns these into a reply; they never crash anything.
//! - Everything else in [`DispatchError`] is a defect: a misconfigured
//!   target, an await without a destination, a reply asking for reactions
//!   that were never enabled, or a handler that failed. These are fatal to
//!   the triggering dispatch and are expected to be logged by the caller.

use thiserror::Error;

/// Boxed error type returned by handler actions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// User-facing input errors, recovered at the dispatch boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    /// Mandatory arguments were missing or could not be parsed.
    #[error("insufficient or invalid arguments, usage: {usage}")]
    MissingArguments {
        /// Usage string of the target.
        usage: String,
    },

    /// The command is reserved for the application owner.
    #[error("'{command}' is restricted to the bot owner")]
    Restricted {
        /// Name of the command.
        command: String,
    },

    /// The command cannot be used in a direct conversation.
    #[error("'{command}' can only be used in a server")]
    GuildOnly {
        /// Name of the command.
        command: String,
    },

    /// A middleware refused the invocation.
    #[error("{0}")]
    Rejected(String),
}

impl InputError {
    /// Creates a middleware rejection.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected(reason.into())
    }
}

/// Problems with a declared argument list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
    /// A mandatory argument follows an optional one.
    #[error("argument '{name}' at position {position} is mandatory but follows an optional argument")]
    MandatoryAfterOptional {
        /// Zero-based position of the offending argument.
        position: usize,
        /// Name of the offending argument.
        name: String,
    },

    /// An argument was declared without a name.
    #[error("argument at position {position} has no name")]
    EmptyName {
        /// Zero-based position of the offending argument.
        position: usize,
    },
}

/// Await lifecycle errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AwaitError {
    /// Neither the await nor the registering call named a channel or user.
    #[error("await has no {field} configured and no fallback was supplied")]
    MissingTarget {
        /// `"channel"` or `"user"`.
        field: &'static str,
    },

    /// The registry that armed the await no longer exists.
    #[error("await registry has been dropped")]
    RegistryGone,
}

/// Errors raised while building a dispatcher.
#[derive(Debug, Error)]
pub enum SetupError {
    /// A command or replacer declared an invalid argument list.
    #[error("invalid arguments for '{target}': {source}")]
    InvalidSpec {
        /// Command name or replacer key.
        target: String,
        /// The underlying problem.
        source: SpecError,
    },

    /// The replacer markers could not be turned into a pattern.
    #[error("invalid replacer markers: {0}")]
    InvalidMarkers(#[from] regex::Error),

    /// Replacer markers must be non-empty.
    #[error("replacer markers must not be empty")]
    EmptyMarkers,
}

/// Errors returned from [`Dispatcher::dispatch`](crate::Dispatcher::dispatch).
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A user-facing input error.
    #[error(transparent)]
    Input(#[from] InputError),

    /// The resolved target has no action to invoke.
    #[error("target '{0}' has no action")]
    MissingAction(String),

    /// A follow-up await could not be armed.
    #[error(transparent)]
    Await(#[from] AwaitError),

    /// A reply asked for a reaction interface but no binder is installed.
    #[error("reply requested a reaction interface but reactions are not enabled")]
    ReactionsDisabled,

    /// The handler action failed.
    #[error("handler failed: {0}")]
    Handler(BoxError),
}

impl DispatchError {
    /// Returns `true` for user-facing input errors.
    pub fn is_input(&self) -> bool {
        matches!(self, Self::Input(_))
    }

    /// Returns the input error, if this is one.
    pub fn as_input(&self) -> Option<&InputError> {
        match self {
            Self::Input(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;
