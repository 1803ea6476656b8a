//! Runtime error types.

use thiserror::Error;

use crate::config::ConfigError;
use herald_framework::SetupError;

/// Errors that can occur while assembling or running a [`HeraldRuntime`].
///
/// [`HeraldRuntime`]: crate::HeraldRuntime
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A command, replacer or marker registration was rejected.
    #[error("Dispatcher setup failed: {0}")]
    Setup(#[from] SetupError),

    /// `dispatch.reactions_enabled` is set but no reaction binder was
    /// supplied.
    #[error("Reactions are enabled in configuration but no reaction binder was provided")]
    ReactionsUnavailable,
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
