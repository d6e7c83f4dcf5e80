//! In-memory store, used by tests and embedded setups.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;

use crate::store::{ConfigStore, StoreError, StoreKey};

#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<HashMap<StoreKey, Value>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a document without counting it as a pipeline write.
    pub fn set(&self, key: StoreKey, value: Value) {
        if let Ok(mut docs) = self.documents.write() {
            docs.insert(key, value);
        }
    }

    /// Number of `put` calls seen so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn get(&self, key: StoreKey) -> Result<Option<Value>, StoreError> {
        Ok(self
            .documents
            .read()
            .ok()
            .and_then(|docs| docs.get(&key).cloned()))
    }

    async fn put(&self, key: StoreKey, value: Value) -> Result<(), StoreError> {
        self.set(key, value);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
