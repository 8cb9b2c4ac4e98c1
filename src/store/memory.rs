//! In-memory document store
//!
//! Keeps collections in ordered maps and fans changes out to watchers.
//! Availability, write failures and latency can be controlled so callers can
//! exercise offline and error paths.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

use super::{ChangeBatch, ChangeFeed, DocumentStore};
use crate::error::StoreError;
use crate::models::{ChangeKind, Document, DocumentChange, Fields, WatchTarget};

struct Watcher {
    target: WatchTarget,
    sender: mpsc::UnboundedSender<ChangeBatch>,
}

/// In-memory [`DocumentStore`].
pub struct MemoryStore {
    collections: RwLock<HashMap<String, BTreeMap<String, Fields>>>,
    watchers: Mutex<Vec<Watcher>>,
    available: AtomicBool,
    failing_writes: AtomicUsize,
    latency: Option<Duration>,
    writes: Mutex<Vec<String>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            watchers: Mutex::new(Vec::new()),
            available: AtomicBool::new(true),
            failing_writes: AtomicUsize::new(0),
            latency: None,
            writes: Mutex::new(Vec::new()),
        }
    }

    /// Delays every operation by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Makes every operation fail with `Unavailable` while `false`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Rejects the next `count` mutations.
    pub fn fail_next_writes(&self, count: usize) {
        self.failing_writes.store(count, Ordering::SeqCst);
    }

    /// Inserts a document with a known id, bypassing failure injection.
    pub async fn seed(&self, collection: &str, id: &str, fields: Fields) {
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), fields.clone());
        self.notify(collection, DocumentChange::new(ChangeKind::Added, Document::new(id, fields)))
            .await;
    }

    /// Successful mutations in the order they were applied, as `"<op> <collection>/<id>"`.
    pub async fn write_log(&self) -> Vec<String> {
        self.writes.lock().await.clone()
    }

    /// Number of documents currently stored in `collection`.
    pub async fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    /// Number of watchers whose receiver is still alive.
    pub async fn watcher_count(&self) -> usize {
        let mut watchers = self.watchers.lock().await;
        watchers.retain(|w| !w.sender.is_closed());
        watchers.len()
    }

    /// Delivers a feed error to every watcher.
    pub async fn broadcast_error(&self, error: StoreError) {
        let mut watchers = self.watchers.lock().await;
        watchers.retain(|w| w.sender.send(Err(error.clone())).is_ok());
    }

    async fn simulate_network(&self) -> Result<(), StoreError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store is offline".to_string()))
        }
    }

    async fn begin_write(&self, target: &str) -> Result<(), StoreError> {
        self.simulate_network().await?;
        let rejected = self
            .failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if rejected {
            return Err(StoreError::Rejected(format!("write to {} rejected", target)));
        }
        Ok(())
    }

    async fn record_write(&self, op: &str, collection: &str, id: &str) {
        self.writes
            .lock()
            .await
            .push(format!("{} {}/{}", op, collection, id));
    }

    async fn notify(&self, collection: &str, change: DocumentChange) {
        let mut watchers = self.watchers.lock().await;
        watchers.retain(|w| {
            if !w.target.matches(collection, &change.document.id) {
                return !w.sender.is_closed();
            }
            w.sender.send(Ok(vec![change.clone()])).is_ok()
        });
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        self.simulate_network().await?;
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| Document::new(id, fields.clone())))
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        self.simulate_network().await?;
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn add(&self, collection: &str, fields: Fields) -> Result<String, StoreError> {
        self.begin_write(collection).await?;
        let id = Uuid::new_v4().simple().to_string();
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), fields.clone());
        self.record_write("add", collection, &id).await;
        debug!(collection, id = %id, "Document added");
        self.notify(collection, DocumentChange::new(ChangeKind::Added, Document::new(&id, fields)))
            .await;
        Ok(id)
    }

    async fn update(&self, collection: &str, id: &str, patch: Fields) -> Result<(), StoreError> {
        let path = format!("{}/{}", collection, id);
        self.begin_write(&path).await?;
        let merged = {
            let mut collections = self.collections.write().await;
            let doc = collections
                .get_mut(collection)
                .and_then(|docs| docs.get_mut(id))
                .ok_or_else(|| StoreError::NotFound(path.clone()))?;
            doc.extend(patch);
            doc.clone()
        };
        self.record_write("update", collection, id).await;
        self.notify(collection, DocumentChange::new(ChangeKind::Modified, Document::new(id, merged)))
            .await;
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.begin_write(&format!("{}/{}", collection, id)).await?;
        let removed = self
            .collections
            .write()
            .await
            .get_mut(collection)
            .and_then(|docs| docs.remove(id));
        self.record_write("delete", collection, id).await;
        if let Some(fields) = removed {
            self.notify(collection, DocumentChange::new(ChangeKind::Removed, Document::new(id, fields)))
                .await;
        }
        Ok(())
    }

    async fn watch(&self, target: &WatchTarget) -> Result<ChangeFeed, StoreError> {
        self.simulate_network().await?;
        let (sender, receiver) = mpsc::unbounded_channel();

        let initial: Vec<DocumentChange> = {
            let collections = self.collections.read().await;
            collections
                .get(target.collection_name())
                .map(|docs| {
                    docs.iter()
                        .filter(|(id, _)| target.matches(target.collection_name(), id))
                        .map(|(id, fields)| {
                            DocumentChange::new(
                                ChangeKind::Added,
                                Document::new(id.clone(), fields.clone()),
                            )
                        })
                        .collect()
                })
                .unwrap_or_default()
        };
        // Receiver is alive; the send cannot fail here
        let _ = sender.send(Ok(initial));

        self.watchers.lock().await.push(Watcher {
            target: target.clone(),
            sender,
        });
        Ok(receiver)
    }
}
