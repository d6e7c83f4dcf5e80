//! Subconverter client.
//!
//! # Data Flow
//! ```text
//! primary backend (profile or global setting)
//!     → candidates.rs (primary + fallbacks, deduplicated)
//!     → candidates.rs (https/http variants, normalized /sub path)
//!     → client.rs (one timed GET per variant, tagged Attempt each)
//!     → first success wins; exhaustion → ConversionUnavailable
//! ```

pub mod candidates;
pub mod client;

use thiserror::Error;

pub use candidates::{build_candidates, url_variants};
pub use client::{Attempt, Attempts, Conversion, ConversionRequest, SubconverterClient};

#[derive(Debug, Error)]
pub enum SubconverterError {
    #[error("all conversion backends failed ({}): {last_error}", .attempted.join(", "))]
    ConversionUnavailable {
        attempted: Vec<String>,
        last_error: String,
    },

    #[error("no usable conversion backend in '{0}'")]
    InvalidBackend(String),
}
