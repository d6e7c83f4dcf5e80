//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ServiceConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Load the configuration file if it exists, otherwise fall back to defaults.
pub fn load_or_default(path: &Path) -> Result<ServiceConfig, ConfigError> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::warn!(path = %path.display(), "Config file not found, using defaults");
        let config = ServiceConfig::default();
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<ServiceConfig, ConfigError> {
    let config: ServiceConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_are_joined() {
        let err = parse_config("[fetch]\nconcurrency = 0\ntimeout_secs = 0\n").unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("Validation failed"));
        assert!(message.contains("fetch.concurrency"));
        assert!(message.contains("fetch.timeout_secs"));
    }

    #[test]
    fn test_parse_error() {
        let err = parse_config("[fetch\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = load_or_default(Path::new("definitely/not/here.toml")).unwrap();
        assert_eq!(config.fetch.concurrency, 8);
    }
}
