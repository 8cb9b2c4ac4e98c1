//! Document Service
//!
//! Single choke point between callers and the remote document store. Adds a
//! read cache, an offline write queue and ordered replay on reconnect.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use super::queue::{OfflineQueue, PendingOperation, QueuedOperation};
use super::replay::{ReplayFailure, ReplayReport};
use crate::cache::{collection_key, document_key, CacheStats, CacheStore};
use crate::config::Config;
use crate::connectivity::{Connectivity, ConnectivityMonitor};
use crate::error::{Result, StoreError, SyncError};
use crate::models::{is_placeholder_id, placeholder_id, Document, Fields, ID_FIELD};
use crate::policy::{AccessPolicy, Action, Role};
use crate::store::SharedStore;

/// Replay failures kept for inspection.
const FAILURE_LOG_LIMIT: usize = 100;

/// Value held by the read cache.
#[derive(Debug, Clone)]
enum Cached {
    Document(Document),
    Collection(Vec<Document>),
}

// == Read Policy ==
/// How a read treats the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadPolicy {
    /// Serve a live cached value if present, otherwise read remotely
    #[default]
    CacheFirst,
    /// Always read remotely; remote errors are returned
    Fresh,
    /// Always read remotely; on error fall back to a cached value marked stale
    FreshOrCached,
}

impl ReadPolicy {
    fn serves_from_cache(self) -> bool {
        self == ReadPolicy::CacheFirst
    }
}

/// Result of a read under an explicit [`ReadPolicy`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fetched<T> {
    pub data: T,
    /// Data came from the cache after the remote read failed
    pub stale: bool,
    /// Remote error that forced the stale fallback
    pub error: Option<String>,
}

impl<T> Fetched<T> {
    fn fresh(data: T) -> Self {
        Self {
            data,
            stale: false,
            error: None,
        }
    }

    fn stale(data: T, error: &StoreError) -> Self {
        Self {
            data,
            stale: true,
            error: Some(error.to_string()),
        }
    }
}

// == Write Results ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteStatus {
    /// Applied to the remote store
    Committed,
    /// Held in the offline queue
    Queued,
}

/// Result of `add_document`: the stored (or optimistic) document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Added {
    pub document: Document,
    pub status: WriteStatus,
}

// == Document Service ==
pub struct DocumentService {
    store: SharedStore,
    connectivity: ConnectivityMonitor,
    policy: AccessPolicy,
    cache: RwLock<CacheStore<Cached>>,
    /// Bumped on every invalidation; reads that overlap one are not cached
    invalidations: AtomicU64,
    queue: Mutex<OfflineQueue>,
    /// Placeholder id -> server id for adds that have been replayed
    resolved_ids: RwLock<HashMap<String, String>>,
    failures: Mutex<Vec<ReplayFailure>>,
    replay_max_attempts: u32,
    replay_lock: Mutex<()>,
    replay_requested: AtomicBool,
}

impl DocumentService {
    // == Constructor ==
    /// Creates a service with default cache sizing and policy.
    pub fn new(store: SharedStore, connectivity: ConnectivityMonitor) -> Self {
        Self::from_config(store, connectivity, &Config::default())
    }

    /// Creates a service sized and configured from `config`.
    pub fn from_config(
        store: SharedStore,
        connectivity: ConnectivityMonitor,
        config: &Config,
    ) -> Self {
        Self {
            store,
            connectivity,
            policy: AccessPolicy::new(config.student_writable.iter().cloned()),
            cache: RwLock::new(CacheStore::new(
                config.cache_max_entries,
                config.cache_default_ttl_ms,
            )),
            invalidations: AtomicU64::new(0),
            queue: Mutex::new(OfflineQueue::new()),
            resolved_ids: RwLock::new(HashMap::new()),
            failures: Mutex::new(Vec::new()),
            replay_max_attempts: config.replay_max_attempts.max(1),
            replay_lock: Mutex::new(()),
            replay_requested: AtomicBool::new(false),
        }
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    // == Reads ==

    /// Reads one document, serving a live cached copy when available.
    pub async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        Ok(self
            .get_document_with(collection, id, ReadPolicy::CacheFirst)
            .await?
            .data)
    }

    pub async fn get_document_with(
        &self,
        collection: &str,
        id: &str,
        policy: ReadPolicy,
    ) -> Result<Fetched<Option<Document>>> {
        validate_name("collection", collection)?;
        validate_name("document id", id)?;
        let id = self.resolve_id(id).await;
        let key = document_key(collection, &id);

        if policy.serves_from_cache() {
            if let Some(Cached::Document(doc)) = self.cache.write().await.get(&key) {
                debug!(key = %key, "Cache hit");
                return Ok(Fetched::fresh(Some(doc)));
            }
        }

        let generation = self.invalidations.load(Ordering::SeqCst);
        match self.store.get(collection, &id).await {
            Ok(Some(doc)) => {
                self.cache_if_current(key, Cached::Document(doc.clone()), generation)
                    .await;
                Ok(Fetched::fresh(Some(doc)))
            }
            Ok(None) => Ok(Fetched::fresh(None)),
            Err(source) => {
                if policy == ReadPolicy::FreshOrCached {
                    if let Some(Cached::Document(doc)) = self.cache.write().await.get(&key) {
                        warn!(key = %key, error = %source, "Remote read failed, serving cached copy");
                        return Ok(Fetched::stale(Some(doc), &source));
                    }
                }
                Err(SyncError::RemoteRead {
                    target: key,
                    source,
                })
            }
        }
    }

    /// Reads a whole collection; `use_cache = false` forces a remote read.
    pub async fn get_collection(&self, collection: &str, use_cache: bool) -> Result<Vec<Document>> {
        let policy = if use_cache {
            ReadPolicy::CacheFirst
        } else {
            ReadPolicy::Fresh
        };
        Ok(self.get_collection_with(collection, policy).await?.data)
    }

    pub async fn get_collection_with(
        &self,
        collection: &str,
        policy: ReadPolicy,
    ) -> Result<Fetched<Vec<Document>>> {
        validate_name("collection", collection)?;
        let key = collection_key(collection);

        if policy.serves_from_cache() {
            if let Some(Cached::Collection(docs)) = self.cache.write().await.get(&key) {
                debug!(key = %key, "Cache hit");
                return Ok(Fetched::fresh(docs));
            }
        }

        let generation = self.invalidations.load(Ordering::SeqCst);
        match self.store.list(collection).await {
            Ok(docs) => {
                self.cache_if_current(key, Cached::Collection(docs.clone()), generation)
                    .await;
                Ok(Fetched::fresh(docs))
            }
            Err(source) => {
                if policy == ReadPolicy::FreshOrCached {
                    if let Some(Cached::Collection(docs)) = self.cache.write().await.get(&key) {
                        warn!(key = %key, error = %source, "Remote read failed, serving cached copy");
                        return Ok(Fetched::stale(docs, &source));
                    }
                }
                Err(SyncError::RemoteRead {
                    target: key,
                    source,
                })
            }
        }
    }

    // == Writes ==

    /// Creates a document, or queues it with a placeholder id while offline.
    pub async fn add_document(
        &self,
        role: Role,
        collection: &str,
        mut payload: Fields,
    ) -> Result<Added> {
        validate_name("collection", collection)?;
        self.policy.check(role, Action::Create, collection)?;
        payload.remove(ID_FIELD);

        if !self.connectivity.is_online() {
            let placeholder = placeholder_id();
            self.enqueue(PendingOperation::Add {
                collection: collection.to_string(),
                placeholder_id: placeholder.clone(),
                payload: payload.clone(),
            })
            .await;
            self.invalidate(collection, None).await;
            return Ok(Added {
                document: Document::new(placeholder, payload),
                status: WriteStatus::Queued,
            });
        }

        let id = self
            .store
            .add(collection, payload.clone())
            .await
            .map_err(|source| SyncError::RemoteWrite {
                target: collection_key(collection),
                source,
            })?;
        self.invalidate(collection, Some(&id)).await;
        debug!(collection, id = %id, "Document added");

        Ok(Added {
            document: Document::new(id, payload),
            status: WriteStatus::Committed,
        })
    }

    /// Merges `patch` into a document, or queues the update while offline.
    pub async fn update_document(
        &self,
        role: Role,
        collection: &str,
        id: &str,
        mut patch: Fields,
    ) -> Result<WriteStatus> {
        validate_name("collection", collection)?;
        validate_name("document id", id)?;
        self.policy.check(role, Action::Update, collection)?;
        patch.remove(ID_FIELD);
        let (id, queue) = self.route_write(id).await?;

        if queue {
            self.enqueue(PendingOperation::Update {
                collection: collection.to_string(),
                id: id.clone(),
                patch,
            })
            .await;
            self.invalidate(collection, Some(&id)).await;
            return Ok(WriteStatus::Queued);
        }

        self.store
            .update(collection, &id, patch)
            .await
            .map_err(|source| SyncError::RemoteWrite {
                target: document_key(collection, &id),
                source,
            })?;
        self.invalidate(collection, Some(&id)).await;
        Ok(WriteStatus::Committed)
    }

    /// Deletes a document, or queues the delete while offline.
    pub async fn delete_document(&self, role: Role, collection: &str, id: &str) -> Result<WriteStatus> {
        validate_name("collection", collection)?;
        validate_name("document id", id)?;
        self.policy.check(role, Action::Delete, collection)?;
        let (id, queue) = self.route_write(id).await?;

        if queue {
            self.enqueue(PendingOperation::Delete {
                collection: collection.to_string(),
                id: id.clone(),
            })
            .await;
            self.invalidate(collection, Some(&id)).await;
            return Ok(WriteStatus::Queued);
        }

        self.store
            .delete(collection, &id)
            .await
            .map_err(|source| SyncError::RemoteWrite {
                target: document_key(collection, &id),
                source,
            })?;
        self.invalidate(collection, Some(&id)).await;
        Ok(WriteStatus::Committed)
    }

    // == Replay ==

    /// Replays the offline queue in enqueue order.
    ///
    /// Only one replay runs at a time. A call made while another replay is in
    /// progress returns at once with `coalesced` set, and the running replay
    /// makes one more pass before it returns.
    pub async fn sync_offline_queue(&self) -> ReplayReport {
        let mut report = ReplayReport::default();
        let mut first_pass = true;

        // Raised before the guard is tried so a finishing replay always sees it
        self.replay_requested.store(true, Ordering::SeqCst);

        loop {
            let guard = match self.replay_lock.try_lock() {
                Ok(guard) => guard,
                Err(_) => {
                    if first_pass {
                        report.coalesced = true;
                        debug!("Replay already running, request coalesced");
                    }
                    break;
                }
            };
            first_pass = false;
            self.replay_requested.store(false, Ordering::SeqCst);

            self.replay_pass(&mut report).await;
            drop(guard);

            let rerun = self.replay_requested.load(Ordering::SeqCst);
            if !rerun || !self.connectivity.is_online() {
                break;
            }
        }

        report.remaining = self.queue_len().await;
        if !report.coalesced {
            info!(
                applied = report.applied,
                failed = report.failed.len(),
                dropped = report.dropped.len(),
                remaining = report.remaining,
                "Offline queue replay finished"
            );
        }
        report
    }

    async fn replay_pass(&self, report: &mut ReplayReport) {
        let pending = self.queue_len().await;
        if pending == 0 {
            return;
        }
        info!(pending, "Replaying offline queue");

        let mut retained: Vec<QueuedOperation> = Vec::new();

        loop {
            if self.connectivity.current() == Connectivity::Offline {
                warn!("Connectivity lost, stopping replay");
                report.interrupted = true;
                break;
            }

            let next = self.queue.lock().await.pop_front();
            let Some(mut queued) = next else {
                break;
            };
            queued
                .operation
                .resolve_ids(&*self.resolved_ids.read().await);

            // Later writes to a document wait behind its retained ones
            if retained
                .iter()
                .any(|q| q.operation.same_target(&queued.operation))
            {
                debug!(
                    operation = queued.operation.kind(),
                    id = queued.operation.document_id(),
                    "Deferring operation behind failed write to the same document"
                );
                report.deferred += 1;
                retained.push(queued);
                continue;
            }

            if let Some(placeholder) = queued.operation.depends_on().map(str::to_string) {
                if retained.iter().any(|q| q.operation.is_add_for(&placeholder)) {
                    debug!(placeholder = %placeholder, "Deferring operation behind failed add");
                    report.deferred += 1;
                    retained.push(queued);
                } else {
                    let failure = ReplayFailure::new(
                        &queued,
                        format!("add for {} was never applied", placeholder),
                        true,
                    );
                    error!(error = %failure.to_error(), "Dropping orphaned operation");
                    self.record_failure(failure.clone()).await;
                    report.dropped.push(failure);
                }
                continue;
            }

            match self.apply(&queued.operation).await {
                Ok(server_id) => {
                    if let (PendingOperation::Add { placeholder_id, .. }, Some(server_id)) =
                        (&queued.operation, &server_id)
                    {
                        self.resolved_ids
                            .write()
                            .await
                            .insert(placeholder_id.clone(), server_id.clone());
                        self.queue.lock().await.settle(placeholder_id);
                    }
                    let id = server_id
                        .as_deref()
                        .unwrap_or_else(|| queued.operation.document_id());
                    self.invalidate(queued.operation.collection(), Some(id)).await;
                    report.applied += 1;
                }
                Err(source) => {
                    queued.attempts += 1;
                    let dropped = queued.attempts >= self.replay_max_attempts;
                    let failure = ReplayFailure::new(&queued, source.to_string(), dropped);
                    self.record_failure(failure.clone()).await;

                    if dropped {
                        if let PendingOperation::Add { placeholder_id, .. } = &queued.operation {
                            self.queue.lock().await.settle(placeholder_id);
                        }
                        error!(
                            error = %failure.to_error(),
                            attempts = queued.attempts,
                            "Dropping operation after repeated failures"
                        );
                        report.dropped.push(failure);
                    } else {
                        warn!(
                            error = %failure.to_error(),
                            attempts = queued.attempts,
                            "Replay failed, operation re-queued"
                        );
                        report.failed.push(failure);
                        retained.push(queued);
                    }
                }
            }
        }

        if !retained.is_empty() {
            self.queue.lock().await.requeue_front(retained);
        }
    }

    /// Applies one operation. Returns the server id for adds.
    async fn apply(&self, operation: &PendingOperation) -> std::result::Result<Option<String>, StoreError> {
        match operation {
            PendingOperation::Add {
                collection,
                payload,
                ..
            } => self.store.add(collection, payload.clone()).await.map(Some),
            PendingOperation::Update {
                collection,
                id,
                patch,
            } => self
                .store
                .update(collection, id, patch.clone())
                .await
                .map(|_| None),
            PendingOperation::Delete { collection, id } => {
                self.store.delete(collection, id).await.map(|_| None)
            }
        }
    }

    // == Inspection ==

    /// Server id for a placeholder once its add has been replayed; other ids pass through.
    pub async fn resolve_id(&self, id: &str) -> String {
        if !is_placeholder_id(id) {
            return id.to_string();
        }
        self.resolved_ids
            .read()
            .await
            .get(id)
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }

    pub async fn pending_operations(&self) -> Vec<QueuedOperation> {
        self.queue.lock().await.snapshot()
    }

    pub async fn queue_len(&self) -> usize {
        self.queue.lock().await.len()
    }

    /// Most recent replay failures, oldest first.
    pub async fn replay_failures(&self) -> Vec<ReplayFailure> {
        self.failures.lock().await.clone()
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.read().await.stats()
    }

    // == Cache Maintenance ==

    pub async fn clear_cache(&self) {
        self.cache.write().await.clear();
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        info!("Read cache cleared");
    }

    /// Drops expired cache entries. Returns how many were removed.
    pub async fn cleanup_expired_cache(&self) -> usize {
        self.cache.write().await.cleanup_expired()
    }

    // == Internals ==

    /// Resolves the target id of a write and whether the write is queued.
    ///
    /// Writes are queued while offline, and for placeholders whose add is
    /// still queued or being replayed.
    async fn route_write(&self, id: &str) -> Result<(String, bool)> {
        let id = self.resolve_id(id).await;
        if !is_placeholder_id(&id) {
            return Ok((id, !self.connectivity.is_online()));
        }
        if self.queue.lock().await.has_add_for(&id) {
            return Ok((id, true));
        }

        // The add may have landed after the first lookup
        let resolved = self.resolve_id(&id).await;
        if !is_placeholder_id(&resolved) {
            return Ok((resolved, !self.connectivity.is_online()));
        }
        Err(SyncError::NotFound(format!(
            "{} does not refer to a queued document",
            id
        )))
    }

    async fn enqueue(&self, operation: PendingOperation) {
        debug!(
            operation = operation.kind(),
            collection = operation.collection(),
            id = operation.document_id(),
            "Queued offline operation"
        );
        self.queue.lock().await.push(operation);
    }

    /// Drops the collection key and, when given, the document key.
    async fn invalidate(&self, collection: &str, id: Option<&str>) {
        let mut cache = self.cache.write().await;
        cache.delete(&collection_key(collection));
        if let Some(id) = id {
            cache.delete(&document_key(collection, id));
        }
        self.invalidations.fetch_add(1, Ordering::SeqCst);
    }

    /// Caches a remote read unless an invalidation happened since it started.
    async fn cache_if_current(&self, key: String, value: Cached, generation: u64) {
        let mut cache = self.cache.write().await;
        if self.invalidations.load(Ordering::SeqCst) == generation {
            cache.set(key, value, None);
        } else {
            debug!(key = %key, "Read overlapped a write, not cached");
        }
    }

    async fn record_failure(&self, failure: ReplayFailure) {
        let mut failures = self.failures.lock().await;
        failures.push(failure);
        if failures.len() > FAILURE_LOG_LIMIT {
            let excess = failures.len() - FAILURE_LOG_LIMIT;
            failures.drain(..excess);
        }
    }
}

fn validate_name(what: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(SyncError::InvalidRequest(format!("{} cannot be empty", what)));
    }
    if value.contains('/') {
        return Err(SyncError::InvalidRequest(format!(
            "{} '{}' must not contain '/'",
            what, value
        )));
    }
    Ok(())
}
