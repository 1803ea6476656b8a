//! Configuration validation utilities.

use tracing_subscriber::filter::Directive;

use super::error::{ConfigError, ConfigResult};
use super::schema::{DispatchConfig, HeraldConfig, LogOutput, LoggingConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &HeraldConfig) -> ConfigResult<()> {
    validate_dispatch_config(&config.dispatch)?;
    validate_logging_config(&config.logging)?;
    Ok(())
}

/// Validates routing settings.
fn validate_dispatch_config(config: &DispatchConfig) -> ConfigResult<()> {
    if config.prefix.is_empty() {
        return Err(ConfigError::validation("dispatch.prefix must not be empty"));
    }

    if config.replacer_open.is_empty() || config.replacer_close.is_empty() {
        return Err(ConfigError::validation(
            "Replacer markers must not be empty",
        ));
    }
    if config.replacer_open == config.replacer_close {
        return Err(ConfigError::validation(format!(
            "Replacer markers must differ, both are {:?}",
            config.replacer_open
        )));
    }

    if let Some(owner) = &config.owner_id
        && owner.is_empty()
    {
        return Err(ConfigError::validation(
            "dispatch.owner_id must not be empty when set",
        ));
    }

    for (scope, prefix) in &config.prefixes {
        if scope.is_empty() {
            return Err(ConfigError::validation("Prefix override with an empty scope"));
        }
        if prefix.is_empty() {
            return Err(ConfigError::validation(format!(
                "Prefix override for '{scope}' must not be empty"
            )));
        }
    }

    Ok(())
}

/// Validates logging settings.
fn validate_logging_config(config: &LoggingConfig) -> ConfigResult<()> {
    for directive in &config.directives {
        if directive.parse::<Directive>().is_err() {
            return Err(ConfigError::validation(format!(
                "Invalid log directive: {directive}"
            )));
        }
    }

    if config.output == LogOutput::File && config.file.is_none() {
        return Err(ConfigError::validation(
            "logging.file is required when logging.output is \"file\"",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate_config(&HeraldConfig::default()).is_ok());
    }

    #[test]
    fn test_empty_prefix_rejected() {
        let mut config = HeraldConfig::default();
        config.dispatch.prefix.clear();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_markers_must_be_distinct() {
        let mut config = HeraldConfig::default();
        config.dispatch.replacer_close = "{".into();
        assert!(validate_config(&config).is_err());

        config.dispatch.replacer_close = String::new();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_empty_scope_prefix_rejected() {
        let mut config = HeraldConfig::default();
        config.dispatch.prefixes.insert("g1".into(), String::new());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_logging_checks() {
        let mut config = HeraldConfig::default();
        config.logging.directives.push("herald_framework=trace".into());
        assert!(validate_config(&config).is_ok());

        config.logging.directives.push("herald=loud".into());
        assert!(validate_config(&config).is_err());

        let mut config = HeraldConfig::default();
        config.logging.output = LogOutput::File;
        assert!(validate_config(&config).is_err());
        config.logging.file = Some("herald.log".into());
        assert!(validate_config(&config).is_ok());
    }
}
