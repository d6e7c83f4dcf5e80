//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, concurrency > 0)
//! - Source fetch plus conversion must finish inside the request deadline
//! - Refuse the placeholder admin key when the admin API is enabled
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::{ServiceConfig, PLACEHOLDER_API_KEY};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("callback.public_url '{0}' is not an http(s) URL")]
    InvalidPublicUrl(String),

    #[error("admin.api_key must be changed before enabling the admin API")]
    PlaceholderApiKey,

    #[error(
        "fetch.timeout_secs ({fetch}) + subconverter.deadline_secs ({conversion}) \
         must stay below timeouts.request_secs ({request})"
    )]
    ConversionBudget {
        fetch: u64,
        conversion: u64,
        request: u64,
    },
}

/// Validate a parsed configuration, collecting every error.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.trim().is_empty() {
        errors.push(ValidationError::Empty("listener.bind_address"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero("timeouts.request_secs"));
    }
    if config.fetch.timeout_secs == 0 {
        errors.push(ValidationError::Zero("fetch.timeout_secs"));
    }
    if config.fetch.concurrency == 0 {
        errors.push(ValidationError::Zero("fetch.concurrency"));
    }
    if config.subconverter.timeout_secs == 0 {
        errors.push(ValidationError::Zero("subconverter.timeout_secs"));
    }
    if config.subconverter.deadline_secs == 0 {
        errors.push(ValidationError::Zero("subconverter.deadline_secs"));
    }
    let budget = config.fetch.timeout_secs + config.subconverter.deadline_secs;
    if config.timeouts.request_secs > 0 && budget >= config.timeouts.request_secs {
        errors.push(ValidationError::ConversionBudget {
            fetch: config.fetch.timeout_secs,
            conversion: config.subconverter.deadline_secs,
            request: config.timeouts.request_secs,
        });
    }
    if config.notify.timeout_secs == 0 {
        errors.push(ValidationError::Zero("notify.timeout_secs"));
    }
    if config.session.ttl_secs == 0 {
        errors.push(ValidationError::Zero("session.ttl_secs"));
    }
    if config.session.cookie_name.trim().is_empty() {
        errors.push(ValidationError::Empty("session.cookie_name"));
    }
    if config.callback.secret.is_empty() {
        errors.push(ValidationError::Empty("callback.secret"));
    }
    if let Some(public_url) = &config.callback.public_url {
        let trimmed = public_url.trim();
        let parsed = if trimmed.contains("://") {
            url::Url::parse(trimmed).ok()
        } else {
            url::Url::parse(&format!("https://{}", trimmed)).ok()
        };
        match parsed {
            Some(u) if matches!(u.scheme(), "http" | "https") && u.host_str().is_some() => {}
            _ => errors.push(ValidationError::InvalidPublicUrl(public_url.clone())),
        }
    }
    if config.store.path.trim().is_empty() {
        errors.push(ValidationError::Empty("store.path"));
    }
    if config.admin.enabled && config.admin.api_key == PLACEHOLDER_API_KEY {
        errors.push(ValidationError::PlaceholderApiKey);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ServiceConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = ServiceConfig::default();
        config.fetch.concurrency = 0;
        config.subconverter.timeout_secs = 0;
        config.admin.enabled = true;
        config.callback.public_url = Some("ftp://example.com".into());

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::PlaceholderApiKey));
        assert!(errors.contains(&ValidationError::Zero("fetch.concurrency")));
    }

    #[test]
    fn test_conversion_must_fit_request_deadline() {
        let mut config = ServiceConfig::default();
        config.timeouts.request_secs = 30;
        config.fetch.timeout_secs = 10;
        config.subconverter.deadline_secs = 20;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::ConversionBudget {
                fetch: 10,
                conversion: 20,
                request: 30,
            }]
        );

        config.subconverter.deadline_secs = 19;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_public_url_without_scheme_is_accepted() {
        let mut config = ServiceConfig::default();
        config.callback.public_url = Some("sub.example.com".into());
        assert!(validate_config(&config).is_ok());
    }
}
