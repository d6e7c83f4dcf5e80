//! Per-request access records.

use serde::Serialize;

/// One served (or failed) subscription request.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AccessRecord {
    pub request_id: String,
    pub client_ip: String,
    pub user_agent: String,
    pub domain: String,
    pub format: String,
    /// `token` or `profile`.
    pub kind: &'static str,
    pub identifier: String,
    pub subscription: String,
    pub nodes: usize,
    pub cache_status: &'static str,
    pub error: Option<String>,
}

pub trait AccessLogger: Send + Sync {
    fn log_success(&self, record: &AccessRecord);
    fn log_error(&self, record: &AccessRecord);
}

/// Emits records as structured events on the `subhub::access` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAccessLogger;

impl AccessLogger for TracingAccessLogger {
    fn log_success(&self, r: &AccessRecord) {
        tracing::info!(
            target: "subhub::access",
            request_id = %r.request_id,
            client_ip = %r.client_ip,
            user_agent = %r.user_agent,
            domain = %r.domain,
            format = %r.format,
            kind = r.kind,
            identifier = %r.identifier,
            subscription = %r.subscription,
            nodes = r.nodes,
            cache = r.cache_status,
            "Subscription served"
        );
    }

    fn log_error(&self, r: &AccessRecord) {
        tracing::warn!(
            target: "subhub::access",
            request_id = %r.request_id,
            client_ip = %r.client_ip,
            user_agent = %r.user_agent,
            domain = %r.domain,
            format = %r.format,
            kind = r.kind,
            identifier = %r.identifier,
            subscription = %r.subscription,
            error = r.error.as_deref().unwrap_or(""),
            "Subscription request failed"
        );
    }
}
