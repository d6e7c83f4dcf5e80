//! Configuration store subsystem.
//!
//! # Data Flow
//! ```text
//! data file (JSON, one document keyed by StoreKey)
//!     → file.rs (FileStore: ArcSwap snapshot, atomic replace on write)
//!     → Snapshot::load (settings + sources + profiles, defaults merged)
//!     → passed by reference into every pipeline stage
//!
//! External edit of the data file:
//!     watcher.rs detects change
//!     → FileStore::reload
//!     → fingerprint changed? → StoreEvent::Changed → node cache flushed
//! ```
//!
//! # Design Decisions
//! - The pipeline never writes configuration except the profile download
//!   counter, which is patched on the raw JSON so unknown fields survive
//! - Absent keys read as empty defaults, never as errors
//! - The fingerprint ignores download counters, so our own counter writes
//!   do not invalidate the cache

pub mod file;
pub mod lenient;
pub mod memory;
pub mod model;
pub mod watcher;

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use model::{PrefixOverrides, PrefixSettings, Profile, Settings, Source, UserInfo};
pub use watcher::{StoreEvent, StoreWatcher};

/// Keys of the documents held by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKey {
    Settings,
    Subscriptions,
    Profiles,
}

impl StoreKey {
    pub const ALL: [StoreKey; 3] = [StoreKey::Settings, StoreKey::Subscriptions, StoreKey::Profiles];

    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKey::Settings => "worker_settings_v1",
            StoreKey::Subscriptions => "misub_subscriptions_v1",
            StoreKey::Profiles => "misub_profiles_v1",
        }
    }
}

/// Errors raised by store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to decode '{key}': {source}")]
    Decode {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Key/value access to stored configuration.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Read a document; `None` when the key was never written.
    async fn get(&self, key: StoreKey) -> Result<Option<Value>, StoreError>;

    /// Replace a document.
    async fn put(&self, key: StoreKey, value: Value) -> Result<(), StoreError>;
}

/// Immutable per-request view of the stored configuration.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub settings: Settings,
    pub sources: Vec<Source>,
    pub profiles: Vec<Profile>,
}

impl Snapshot {
    /// Read all three documents concurrently and merge defaults.
    pub async fn load(store: &dyn ConfigStore) -> Result<Self, StoreError> {
        let (settings, sources, profiles) = tokio::try_join!(
            store.get(StoreKey::Settings),
            store.get(StoreKey::Subscriptions),
            store.get(StoreKey::Profiles),
        )?;

        Ok(Self {
            settings: decode_or_default(StoreKey::Settings, settings)?,
            sources: decode_or_default(StoreKey::Subscriptions, sources)?,
            profiles: decode_or_default(StoreKey::Profiles, profiles)?,
        })
    }

    /// Look a profile up by custom identifier, then by id.
    pub fn find_profile(&self, identifier: &str) -> Option<&Profile> {
        self.profiles
            .iter()
            .find(|p| !p.custom_id.is_empty() && p.custom_id == identifier)
            .or_else(|| self.profiles.iter().find(|p| p.id == identifier))
    }
}

fn decode_or_default<T>(key: StoreKey, value: Option<Value>) -> Result<T, StoreError>
where
    T: DeserializeOwned + Default,
{
    match value {
        None | Some(Value::Null) => Ok(T::default()),
        Some(v) => serde_json::from_value(v).map_err(|source| StoreError::Decode {
            key: key.as_str(),
            source,
        }),
    }
}

/// Increment `downloadCount` of the matching profile and persist it.
///
/// Works on the raw JSON so fields this service does not model are kept.
/// Returns the new count, or `None` if no profile matched.
pub async fn increment_download_count(
    store: &dyn ConfigStore,
    identifier: &str,
) -> Result<Option<u64>, StoreError> {
    let Some(Value::Array(mut profiles)) = store.get(StoreKey::Profiles).await? else {
        return Ok(None);
    };

    let matches = |p: &Value, field: &str| {
        p.get(field)
            .and_then(Value::as_str)
            .is_some_and(|v| !v.is_empty() && v == identifier)
    };
    let position = profiles
        .iter()
        .position(|p| matches(p, "customId"))
        .or_else(|| profiles.iter().position(|p| matches(p, "id")));

    let Some(Value::Object(profile)) = position.and_then(|i| profiles.get_mut(i)) else {
        return Ok(None);
    };
    let count = profile
        .get("downloadCount")
        .map(lenient::value_to_u64)
        .unwrap_or(0)
        + 1;
    profile.insert("downloadCount".to_string(), Value::from(count));

    store.put(StoreKey::Profiles, Value::Array(profiles)).await?;
    Ok(Some(count))
}

/// Hash of the stored configuration that ignores download counters.
pub fn fingerprint(documents: &serde_json::Map<String, Value>) -> u64 {
    let mut hasher = DefaultHasher::new();
    for key in StoreKey::ALL {
        let mut doc = documents.get(key.as_str()).cloned().unwrap_or(Value::Null);
        if key == StoreKey::Profiles {
            if let Value::Array(profiles) = &mut doc {
                for profile in profiles.iter_mut() {
                    if let Value::Object(map) = profile {
                        map.remove("downloadCount");
                    }
                }
            }
        }
        key.as_str().hash(&mut hasher);
        doc.to_string().hash(&mut hasher);
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_empty_store_yields_defaults() {
        let store = MemoryStore::new();
        let snapshot = Snapshot::load(&store).await.unwrap();
        assert_eq!(snapshot.settings.my_token, "auto");
        assert!(snapshot.sources.is_empty());
        assert!(snapshot.profiles.is_empty());
    }

    #[tokio::test]
    async fn test_find_profile_prefers_custom_id() {
        let store = MemoryStore::new();
        store.set(
            StoreKey::Profiles,
            json!([
                {"id": "family", "name": "by id"},
                {"id": "p2", "customId": "family", "name": "by custom id"}
            ]),
        );
        let snapshot = Snapshot::load(&store).await.unwrap();
        assert_eq!(snapshot.find_profile("family").unwrap().name, "by custom id");
        assert_eq!(snapshot.find_profile("p2").unwrap().name, "by custom id");
        assert!(snapshot.find_profile("nope").is_none());
    }

    #[tokio::test]
    async fn test_download_count_keeps_unknown_fields() {
        let store = MemoryStore::new();
        store.set(
            StoreKey::Profiles,
            json!([{"id": "p1", "customId": "fam", "description": "kept", "downloadCount": "4"}]),
        );

        assert_eq!(increment_download_count(&store, "fam").await.unwrap(), Some(5));
        assert_eq!(increment_download_count(&store, "missing").await.unwrap(), None);

        let raw = store.get(StoreKey::Profiles).await.unwrap().unwrap();
        assert_eq!(raw[0]["downloadCount"], json!(5));
        assert_eq!(raw[0]["description"], json!("kept"));
    }

    #[test]
    fn test_fingerprint_ignores_download_count() {
        let mut a = serde_json::Map::new();
        a.insert("misub_profiles_v1".into(), json!([{"id": "p1", "downloadCount": 1}]));
        let mut b = a.clone();
        b.insert("misub_profiles_v1".into(), json!([{"id": "p1", "downloadCount": 9}]));
        assert_eq!(fingerprint(&a), fingerprint(&b));

        b.insert("misub_profiles_v1".into(), json!([{"id": "p2", "downloadCount": 9}]));
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }
}
