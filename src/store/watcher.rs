//! Data file watcher for hot reload.

use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::store::FileStore;

/// Notification emitted after the data file was reloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEvent {
    /// Settings, sources or profiles changed; cached node lists are stale.
    Changed,
}

/// A watcher that monitors the data file for changes.
pub struct StoreWatcher {
    store: Arc<FileStore>,
    event_tx: mpsc::UnboundedSender<StoreEvent>,
}

impl StoreWatcher {
    /// Create a new StoreWatcher.
    ///
    /// Returns the watcher and a receiver for change events.
    pub fn new(store: Arc<FileStore>) -> (Self, mpsc::UnboundedReceiver<StoreEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        (Self { store, event_tx }, event_rx)
    }

    /// Start watching the file in a background thread.
    ///
    /// The parent directory is watched because writes replace the file by rename.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.event_tx.clone();
        let store = self.store.clone();
        let file_name = store.path().file_name().map(|n| n.to_os_string());

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let touches_file = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if !touches_file || !(event.kind.is_modify() || event.kind.is_create()) {
                        return;
                    }
                    match store.reload() {
                        Ok(true) => {
                            tracing::info!("Store content changed, invalidating node cache");
                            let _ = tx.send(StoreEvent::Changed);
                        }
                        Ok(false) => {
                            tracing::debug!("Store file touched without relevant changes");
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to reload store. Keeping current data.");
                        }
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        let watch_dir = self
            .store
            .path()
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| std::path::PathBuf::from("."));
        watcher.watch(&watch_dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.store.path(), "Store watcher started");
        Ok(watcher)
    }
}
