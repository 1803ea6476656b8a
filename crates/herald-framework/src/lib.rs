//! # Herald Framework
//!
//! Routing for the Herald chat router.
//!
//! This layer provides:
//! - Declarative positional arguments and the delimiter-driven tokenizer
//! - Inline replacers expanded during normalization
//! - Prefix and self-mention normalization with per-scope overrides
//! - The await registry for timed follow-up listeners
//! - Commands, middleware and handler actions
//! - The [`Dispatcher`], which ties all of the above together and fans
//!   replies out to their destination channels
//!
//! The framework never talks to a chat service itself; it drives the
//! collaborator traits from `herald-core`.

pub mod argument;
pub mod awaits;
pub mod command;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod middleware;
pub mod normalizer;
pub mod replacer;
pub mod reply;
pub mod tokenizer;

#[cfg(test)]
mod testing;

pub use argument::{ArgKind, ArgSpec, ArgValue, Args, SpecWarning};
pub use awaits::{Await, AwaitHandle, AwaitKey, AwaitRegistry};
pub use command::{Command, CommandTable};
pub use context::{Actor, Invocation, Target};
pub use dispatcher::{
    ChannelOutcome, Delivery, Dispatched, Dispatcher, DispatcherBuilder, ReplyReport, TargetKind,
};
pub use error::{
    AwaitError, BoxError, DispatchError, DispatchResult, InputError, SetupError, SpecError,
};
pub use handler::{Action, BoxedAction};
pub use middleware::{BoxedMiddleware, Middleware};
pub use normalizer::{Normalized, PrefixTable};
pub use replacer::{Markers, Replacer, ReplacerCall, ReplacerTable};
pub use reply::{Replies, Reply, ReplyOptions, RichReply};
pub use tokenizer::{DirectoryResolver, Resolver};
