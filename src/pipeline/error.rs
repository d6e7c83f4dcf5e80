use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::store::StoreError;
use crate::subconverter::SubconverterError;

/// Failures surfaced to the client as an HTTP error.
///
/// Source fetch failures never appear here; they are absorbed by the
/// aggregator. Conversion failures only do when there is nothing to
/// degrade to.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid token")]
    Forbidden,

    #[error("Profile not found or disabled")]
    NotFound,

    #[error("Subconverter backend is not configured")]
    Misconfigured,

    #[error("Error connecting to subconverter: {0}")]
    ConversionUnavailable(#[from] SubconverterError),

    #[error("Failed to load configuration: {0}")]
    Store(#[from] StoreError),
}

impl PipelineError {
    pub fn status(&self) -> StatusCode {
        match self {
            PipelineError::Forbidden => StatusCode::FORBIDDEN,
            PipelineError::NotFound => StatusCode::NOT_FOUND,
            PipelineError::Misconfigured => StatusCode::INTERNAL_SERVER_ERROR,
            PipelineError::ConversionUnavailable(_) => StatusCode::BAD_GATEWAY,
            PipelineError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Metric label.
    pub fn outcome(&self) -> &'static str {
        match self {
            PipelineError::Forbidden => "forbidden",
            PipelineError::NotFound => "not_found",
            PipelineError::Misconfigured => "misconfigured",
            PipelineError::ConversionUnavailable(_) => "conversion_unavailable",
            PipelineError::Store(_) => "store_error",
        }
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}
