//! Service configuration subsystem.
//!
//! # Data Flow
//! ```text
//! subhub.toml
//!     → loader.rs (parse & deserialize, defaults merged by serde)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Settings/sources/profiles are data, not config: see `crate::store`

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_or_default, ConfigError};
pub use schema::{
    AdminConfig, CacheConfig, CallbackConfig, FetchConfig, ListenerConfig, NotifyConfig,
    ObservabilityConfig, ServiceConfig, SessionConfig, StoreConfig, SubconverterConfig,
    TimeoutConfig,
};
