//! Metrics collection and exposition.
//!
//! # Metrics
//! - `subhub_requests_total` (counter): subscription requests by format, outcome
//! - `subhub_request_duration_seconds` (histogram): end-to-end latency
//! - `subhub_cache_lookups_total` (counter): node cache lookups by status
//! - `subhub_source_fetch_total` (counter): remote source fetches by outcome
//! - `subhub_subconverter_attempts_total` (counter): backend attempts by outcome
//!
//! Recording is a no-op until a recorder is installed by [`init_metrics`].

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a finished subscription request.
pub fn record_request(format: &str, outcome: &'static str, start: Instant) {
    counter!("subhub_requests_total", "format" => format.to_string(), "outcome" => outcome).increment(1);
    histogram!("subhub_request_duration_seconds", "format" => format.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_cache_lookup(status: &'static str) {
    counter!("subhub_cache_lookups_total", "status" => status).increment(1);
}

pub fn record_source_fetch(outcome: &'static str) {
    counter!("subhub_source_fetch_total", "outcome" => outcome).increment(1);
}

pub fn record_subconverter_attempt(outcome: &'static str) {
    counter!("subhub_subconverter_attempts_total", "outcome" => outcome).increment(1);
}
