//! Realtime Sync
//!
//! Keeps at most one live change-feed subscription per collection or document
//! and forwards change batches to a registered callback.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Result, SyncError};
use crate::models::{DocumentChange, WatchTarget};
use crate::store::SharedStore;

/// A live subscription. Dropping it stops delivery and releases the feed.
struct Subscription {
    task: JoinHandle<()>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// == Realtime Sync ==
pub struct RealtimeSync {
    store: SharedStore,
    subscriptions: Mutex<HashMap<String, Subscription>>,
    enabled: AtomicBool,
}

impl RealtimeSync {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            subscriptions: Mutex::new(HashMap::new()),
            enabled: AtomicBool::new(true),
        }
    }

    /// Subscribes to every change in `collection`.
    ///
    /// Returns `Ok(false)` without subscribing while sync is disabled.
    pub async fn subscribe<F>(&self, collection: &str, callback: F) -> Result<bool>
    where
        F: Fn(Vec<DocumentChange>) + Send + Sync + 'static,
    {
        self.watch(WatchTarget::collection(collection), callback)
            .await
    }

    /// Subscribes to changes of a single document.
    pub async fn subscribe_to_document<F>(&self, collection: &str, id: &str, callback: F) -> Result<bool>
    where
        F: Fn(Vec<DocumentChange>) + Send + Sync + 'static,
    {
        self.watch(WatchTarget::document(collection, id), callback)
            .await
    }

    async fn watch<F>(&self, target: WatchTarget, callback: F) -> Result<bool>
    where
        F: Fn(Vec<DocumentChange>) + Send + Sync + 'static,
    {
        let key = target.key();
        let mut subscriptions = self.subscriptions.lock().await;

        if !self.is_sync_enabled() {
            debug!(key = %key, "Sync disabled, subscription skipped");
            return Ok(false);
        }

        // Release the previous feed before opening a new one
        if subscriptions.remove(&key).is_some() {
            debug!(key = %key, "Replaced existing subscription");
        }

        let mut feed = self
            .store
            .watch(&target)
            .await
            .map_err(|source| SyncError::RemoteRead {
                target: key.clone(),
                source,
            })?;

        let task_key = key.clone();
        let task = tokio::spawn(async move {
            while let Some(batch) = feed.recv().await {
                match batch {
                    Ok(changes) if changes.is_empty() => {}
                    Ok(changes) => callback(changes),
                    Err(err) => warn!(key = %task_key, error = %err, "Sync error"),
                }
            }
            debug!(key = %task_key, "Change feed closed");
        });

        subscriptions.insert(key.clone(), Subscription { task });
        info!(key = %key, "Subscribed to changes");
        Ok(true)
    }

    /// Releases the subscription held under `key` (`"<collection>"` or `"<collection>/<id>"`).
    pub async fn unsubscribe(&self, key: &str) -> bool {
        self.subscriptions.lock().await.remove(key).is_some()
    }

    /// Releases every subscription. Returns how many were released.
    pub async fn unsubscribe_all(&self) -> usize {
        let mut subscriptions = self.subscriptions.lock().await;
        let count = subscriptions.len();
        subscriptions.clear();
        count
    }

    /// Enables or disables sync. Disabling releases every subscription.
    pub async fn toggle_sync(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        if !enabled {
            let released = self.unsubscribe_all().await;
            info!(released, "Realtime sync disabled");
        }
    }

    pub fn is_sync_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Keys of active subscriptions, sorted.
    pub async fn active_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.subscriptions.lock().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}
