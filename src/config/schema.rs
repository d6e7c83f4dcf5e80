//! Configuration schema definitions.
//!
//! This module defines the service configuration structure (the TOML file).
//! Settings, sources and profiles live in the configuration store instead,
//! see `crate::store`.

use serde::{Deserialize, Serialize};

/// Placeholder admin key that must be replaced before enabling the admin API.
pub const PLACEHOLDER_API_KEY: &str = "CHANGE_ME_IN_PRODUCTION";

/// Root configuration for the subscription service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Remote subscription fetching.
    pub fetch: FetchConfig,

    /// Conversion backend client settings.
    pub subconverter: SubconverterConfig,

    /// Node list cache behavior.
    pub cache: CacheConfig,

    /// Callback URL handed to conversion backends.
    pub callback: CallbackConfig,

    /// Configuration store location.
    pub store: StoreConfig,

    /// Session cookies that let a logged-in browser past the disguise page.
    pub session: SessionConfig,

    /// Access notifications.
    pub notify: NotifyConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration for inbound requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 60 }
    }
}

/// Remote subscription source fetching.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Per-source timeout in seconds.
    pub timeout_secs: u64,

    /// Maximum number of sources fetched concurrently.
    pub concurrency: usize,

    /// User-Agent presented to subscription providers.
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            concurrency: 8,
            user_agent: "v2rayN/7.23".to_string(),
        }
    }
}

/// Conversion backend client settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SubconverterConfig {
    /// Per-attempt timeout in seconds.
    pub timeout_secs: u64,

    /// Budget for a whole conversion across all attempts. Must leave room
    /// under `timeouts.request_secs` for the degraded response.
    pub deadline_secs: u64,

    /// Hosts tried after the primary backend, in order.
    pub fallbacks: Vec<String>,

    /// User-Agent presented to conversion backends.
    pub user_agent: String,
}

impl Default for SubconverterConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            deadline_secs: 40,
            fallbacks: vec![
                "subapi.cmliussss.net".to_string(),
                "sub.d1.mk".to_string(),
                "sub.xeton.dev".to_string(),
            ],
            user_agent: "Mozilla/5.0 (compatible; subhub)".to_string(),
        }
    }
}

/// Node list cache behavior.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entries younger than this are served without a background refresh.
    /// Zero means every hit schedules a refresh.
    pub fresh_secs: u64,

    /// Allow at most one background refresh per key at a time.
    pub single_flight: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            fresh_secs: 60,
            single_flight: true,
        }
    }
}

/// Callback URL handed to conversion backends.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CallbackConfig {
    /// Secret the callback token and session cookies are derived from.
    pub secret: String,

    /// Public base URL of this service. Derived from the request when unset.
    pub public_url: Option<String>,
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            secret: "default-callback-secret".to_string(),
            public_url: None,
        }
    }
}

/// Session cookie verification.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Cookie carrying the signed session.
    pub cookie_name: String,

    /// Session lifetime in seconds.
    pub ttl_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "auth_session".to_string(),
            ttl_secs: 8 * 60 * 60,
        }
    }
}

/// Telegram access notifications.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Bot API base URL.
    pub telegram_api: String,

    /// Per-message timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            telegram_api: "https://api.telegram.org".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Configuration store location.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path to the JSON data file.
    pub path: String,

    /// Reload the data file when it changes on disk.
    pub watch: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "data/store.json".to_string(),
            watch: true,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin routes.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: PLACEHOLDER_API_KEY.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: ServiceConfig = toml::from_str(
            r#"
            [fetch]
            concurrency = 2

            [cache]
            fresh_secs = 0
            "#,
        )
        .unwrap();

        assert_eq!(config.fetch.concurrency, 2);
        assert_eq!(config.fetch.timeout_secs, 10);
        assert_eq!(config.cache.fresh_secs, 0);
        assert!(config.cache.single_flight);
        assert_eq!(config.subconverter.fallbacks.len(), 3);
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
    }
}
