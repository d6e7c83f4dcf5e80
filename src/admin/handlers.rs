use axum::{extract::State, Json};
use serde::Serialize;

use crate::cache::EntrySummary;
use crate::http::server::AppState;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub cache_entries: usize,
}

#[derive(Serialize)]
pub struct CacheListing {
    pub total: usize,
    pub entries: Vec<EntrySummary>,
}

#[derive(Serialize)]
pub struct FlushResult {
    pub flushed: usize,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        uptime_secs: state.started_at.elapsed().as_secs(),
        cache_entries: state.pipeline.cache().len(),
    })
}

pub async fn get_cache(State(state): State<AppState>) -> Json<CacheListing> {
    let entries = state.pipeline.cache().entries();
    Json(CacheListing {
        total: entries.len(),
        entries,
    })
}

pub async fn flush_cache(State(state): State<AppState>) -> Json<FlushResult> {
    let flushed = state.pipeline.cache().flush();
    tracing::info!(flushed, "Node cache flushed by admin");
    Json(FlushResult { flushed })
}
