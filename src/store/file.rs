//! JSON data file backend.
//!
//! # Responsibilities
//! - Hold the parsed document in an `ArcSwap` so reads never block
//! - Persist writes by writing a temp file and renaming it over the original
//! - Reload from disk on demand and report whether the content changed

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::store::{fingerprint, ConfigStore, StoreError, StoreKey};

type Documents = Map<String, Value>;

/// Store backed by one JSON object on disk.
pub struct FileStore {
    path: PathBuf,
    documents: ArcSwap<Documents>,
    /// Serializes writers; readers go through the ArcSwap.
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open the data file. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let documents = read_documents(&path)?;
        tracing::info!(
            path = %path.display(),
            keys = documents.len(),
            "Configuration store opened"
        );
        Ok(Self {
            path,
            documents: ArcSwap::from_pointee(documents),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fingerprint of the current in-memory content.
    pub fn fingerprint(&self) -> u64 {
        fingerprint(&self.documents.load())
    }

    /// Re-read the file. Returns `true` when the configuration changed in a
    /// way that matters to the node cache.
    pub fn reload(&self) -> Result<bool, StoreError> {
        let before = self.fingerprint();
        let documents = read_documents(&self.path)?;
        let after = fingerprint(&documents);
        self.documents.store(Arc::new(documents));
        Ok(before != after)
    }
}

fn read_documents(path: &Path) -> Result<Documents, StoreError> {
    if !path.exists() {
        return Ok(Map::new());
    }
    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(Map::new());
    }
    Ok(serde_json::from_str(&content)?)
}

#[async_trait]
impl ConfigStore for FileStore {
    async fn get(&self, key: StoreKey) -> Result<Option<Value>, StoreError> {
        Ok(self.documents.load().get(key.as_str()).cloned())
    }

    async fn put(&self, key: StoreKey, value: Value) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        let mut next = Documents::clone(&self.documents.load());
        next.insert(key.as_str().to_string(), value);

        let serialized = serde_json::to_vec_pretty(&next)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serialized).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        self.documents.store(Arc::new(next));
        tracing::debug!(key = key.as_str(), "Store document written");
        Ok(())
    }
}
