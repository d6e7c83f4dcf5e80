//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (structured fields, request id from the trace span)
//!     → metrics.rs (counters, histograms)
//!
//! Access records for subscription downloads go through
//! services::access_log on the `subhub::access` target.
//!
//! Consumers:
//!     → stdout (tracing-subscriber fmt layer)
//!     → Prometheus scrape endpoint, when enabled
//! ```

pub mod logging;
pub mod metrics;
