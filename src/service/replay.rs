//! Replay bookkeeping: per-run report and recorded failures.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::queue::QueuedOperation;
use crate::error::SyncError;

/// A queued operation that failed while the queue was being replayed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayFailure {
    pub collection: String,
    pub operation: String,
    pub document_id: String,
    pub reason: String,
    /// Attempts made including this one
    pub attempts: u32,
    /// Whether the operation was discarded instead of re-queued
    pub dropped: bool,
    pub at: DateTime<Utc>,
}

impl ReplayFailure {
    pub fn new(queued: &QueuedOperation, reason: impl Into<String>, dropped: bool) -> Self {
        Self {
            collection: queued.operation.collection().to_string(),
            operation: queued.operation.kind().to_string(),
            document_id: queued.operation.document_id().to_string(),
            reason: reason.into(),
            attempts: queued.attempts,
            dropped,
            at: Utc::now(),
        }
    }

    pub fn to_error(&self) -> SyncError {
        SyncError::Replay {
            collection: self.collection.clone(),
            operation: self.operation.clone(),
            reason: self.reason.clone(),
        }
    }
}

/// Outcome of one `sync_offline_queue` call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReplayReport {
    /// Operations applied to the store
    pub applied: usize,
    /// Operations held back because the add they depend on has not gone through
    pub deferred: usize,
    /// Failures that were re-queued
    pub failed: Vec<ReplayFailure>,
    /// Failures that were discarded
    pub dropped: Vec<ReplayFailure>,
    /// Queue length when the call returned
    pub remaining: usize,
    /// Replay stopped because connectivity dropped
    pub interrupted: bool,
    /// Another replay was already running; this call only flagged a follow-up pass
    pub coalesced: bool,
}

impl ReplayReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.dropped.is_empty() && !self.interrupted
    }
}
