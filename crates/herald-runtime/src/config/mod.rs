//! Configuration for Herald applications.
//!
//! Settings are loaded from layered sources (defaults, files, `HERALD_*`
//! environment variables, programmatic overrides) and validated before the
//! dispatcher is assembled.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    DispatchConfig, HeraldConfig, LogFormat, LogLevel, LogOutput, LoggingConfig, SpanEventConfig,
};
pub use validation::validate_config;
