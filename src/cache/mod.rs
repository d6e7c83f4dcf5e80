//! Node list cache with stale-while-revalidate.
//!
//! # Lookup
//! ```text
//! resolve(key, force, refresh)
//!     force                  → refresh now, store, serve      (REFRESH)
//!     no entry               → refresh now, store, serve      (MISS)
//!     entry younger than fresh window → serve                 (HIT)
//!     older entry            → serve, refresh in background   (STALE)
//! ```
//!
//! # Design Decisions
//! - One entry per key; every write replaces the whole entry
//! - Background refreshes are detached and never awaited by a request
//! - With single-flight enabled, at most one background refresh per key is
//!   in flight; extra stale hits only read
//! - A flush bumps a generation counter so refreshes started before the
//!   flush do not resurrect entries built from old configuration
//! - A background refresh that yields no nodes keeps the previous entry

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;

use crate::aggregator::NodeList;
use crate::config::CacheConfig;
use crate::lifecycle::spawn_detached;
use crate::observability::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheKind {
    Token,
    Profile,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub kind: CacheKind,
    pub id: String,
}

impl CacheKey {
    pub fn token(token: &str) -> Self {
        Self {
            kind: CacheKind::Token,
            id: token.to_string(),
        }
    }

    pub fn profile(identifier: &str) -> Self {
        Self {
            kind: CacheKind::Profile,
            id: identifier.to_string(),
        }
    }
}

/// How a lookup was answered. Sent to clients as `X-Cache-Status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Stale,
    Miss,
    Refresh,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Stale => "STALE",
            CacheStatus::Miss => "MISS",
            CacheStatus::Refresh => "REFRESH",
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: Arc<NodeList>,
    created_at: Instant,
}

/// Result of [`NodeCache::resolve`].
#[derive(Debug, Clone)]
pub struct Lookup {
    pub list: Arc<NodeList>,
    pub status: CacheStatus,
}

/// Admin view of one entry.
#[derive(Debug, Clone, Serialize)]
pub struct EntrySummary {
    pub kind: CacheKind,
    pub id: String,
    pub nodes: usize,
    pub age_secs: u64,
    pub source_names: Vec<String>,
}

/// Shared node list cache. Cloning shares the same entries.
#[derive(Debug, Clone)]
pub struct NodeCache {
    entries: Arc<DashMap<CacheKey, CacheEntry>>,
    in_flight: Arc<DashMap<CacheKey, ()>>,
    generation: Arc<AtomicU64>,
    fresh_for: Duration,
    single_flight: bool,
}

impl NodeCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            in_flight: Arc::new(DashMap::new()),
            generation: Arc::new(AtomicU64::new(0)),
            fresh_for: Duration::from_secs(config.fresh_secs),
            single_flight: config.single_flight,
        }
    }

    /// Serve a node list for `key`, refreshing as described in the module docs.
    pub async fn resolve<F, Fut>(&self, key: CacheKey, force: bool, refresh: F) -> Lookup
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = NodeList> + Send + 'static,
    {
        if !force {
            let cached = self.entries.get(&key).map(|e| e.value().clone());
            if let Some(entry) = cached {
                let status = if entry.created_at.elapsed() < self.fresh_for {
                    CacheStatus::Hit
                } else {
                    self.refresh_in_background(key, refresh);
                    CacheStatus::Stale
                };
                metrics::record_cache_lookup(status.as_str());
                return Lookup {
                    list: entry.payload,
                    status,
                };
            }
        }

        let status = if force {
            CacheStatus::Refresh
        } else {
            CacheStatus::Miss
        };
        metrics::record_cache_lookup(status.as_str());

        let generation = self.generation.load(Ordering::SeqCst);
        let list = Arc::new(refresh().await);
        self.store(key, list.clone(), generation);
        Lookup { list, status }
    }

    fn refresh_in_background<F, Fut>(&self, key: CacheKey, refresh: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = NodeList> + Send + 'static,
    {
        let guard = if self.single_flight {
            match InFlight::acquire(&self.in_flight, &key) {
                Some(guard) => Some(guard),
                None => {
                    tracing::debug!(id = %key.id, "Background refresh already running");
                    return;
                }
            }
        } else {
            None
        };

        let cache = self.clone();
        let generation = self.generation.load(Ordering::SeqCst);
        spawn_detached("cache-refresh", async move {
            let _guard = guard;
            let list = refresh().await;
            if list.nodes.is_empty() {
                tracing::warn!(id = %key.id, "Background refresh produced no nodes, keeping cached list");
                return;
            }
            tracing::debug!(id = %key.id, nodes = list.nodes.len(), "Background refresh finished");
            cache.store(key, Arc::new(list), generation);
        });
    }

    fn store(&self, key: CacheKey, payload: Arc<NodeList>, generation: u64) {
        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!(id = %key.id, "Cache flushed during refresh, result not stored");
            return;
        }
        self.entries.insert(
            key,
            CacheEntry {
                payload,
                created_at: Instant::now(),
            },
        );
    }

    /// Drop every entry. Returns how many were removed.
    pub fn flush(&self) -> usize {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let removed = self.entries.len();
        self.entries.clear();
        tracing::info!(removed, "Node cache flushed");
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> Vec<EntrySummary> {
        let mut out: Vec<EntrySummary> = self
            .entries
            .iter()
            .map(|e| EntrySummary {
                kind: e.key().kind,
                id: e.key().id.clone(),
                nodes: e.value().payload.nodes.len(),
                age_secs: e.value().created_at.elapsed().as_secs(),
                source_names: e.value().payload.source_names.clone(),
            })
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }
}

/// Marks a key as refreshing until dropped.
struct InFlight {
    map: Arc<DashMap<CacheKey, ()>>,
    key: CacheKey,
}

impl InFlight {
    fn acquire(map: &Arc<DashMap<CacheKey, ()>>, key: &CacheKey) -> Option<Self> {
        if map.insert(key.clone(), ()).is_some() {
            return None;
        }
        Some(Self {
            map: map.clone(),
            key: key.clone(),
        })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.map.remove(&self.key);
    }
}
