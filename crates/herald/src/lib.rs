//! # Herald
//!
//! A router for chat bots. Herald turns raw inbound messages into command
//! invocations with typed arguments, lets handlers listen for a user's next
//! message, and fans replies out to one or more channels.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐  Message  ┌──────────────────────────────────────┐  Outbound  ┌───────────┐
//! │  Runtime  │──────────▶│ Dispatcher                           │───────────▶│ Transport │
//! │  (inbox)  │           │ normalize ▶ resolve ▶ tokenize ▶ act │            │  (send)   │
//! └───────────┘           └──────────────────────────────────────┘            └───────────┘
//! ```
//!
//! - **Core**: ids, messages and the collaborator traits (`Transport`,
//!   `Directory`, `ReactionBinder`) supplied by the embedding application
//! - **Framework**: commands, argument specs, replacers, the await registry
//!   and the dispatcher
//! - **Runtime**: configuration, logging and the message loop
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use herald::prelude::*;
//!
//! let ping = Command::new("ping")
//!     .action(|_: Invocation| async { Ok::<_, BoxError>("pong") });
//!
//! let runtime = HeraldRuntime::builder(transport).command(ping).build()?;
//! runtime.run(inbox).await?;
//! ```
//!
//! ## Features
//!
//! - `toml-config`: TOML configuration files (default)
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output

pub use herald_core as core;
pub use herald_framework as framework;
pub use herald_runtime as runtime;

/// Commonly used types for building a bot.
///
/// ```rust,ignore
/// use herald::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use herald_runtime::{HeraldConfig, HeraldRuntime, RuntimeBuilder};

    // Routing
    pub use herald_framework::{
        ArgKind, ArgSpec, ArgValue, Args, Await, BoxError, Command, Dispatcher, InputError,
        Invocation, Middleware, Replacer, ReplacerCall, Replies, Reply, RichReply,
    };

    // Collaborators and message types
    pub use herald_core::{
        ApiError, ApiResult, Channel, ChannelId, Directory, GuildId, Message, MessageId, Outbound,
        ReactButton, ReactInterface, ReactionBinder, SentMessage, Transport, User, UserId,
    };
}
