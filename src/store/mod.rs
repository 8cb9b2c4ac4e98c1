//! Document Store Module
//!
//! The remote document database seen through a narrow async trait, plus an
//! in-memory implementation.

mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::StoreError;
use crate::models::{Document, DocumentChange, Fields, WatchTarget};

pub use memory::MemoryStore;

/// One delivery from a change feed: a batch of changes or a feed error.
pub type ChangeBatch = std::result::Result<Vec<DocumentChange>, StoreError>;

/// Receiving side of a change subscription. Dropping it ends the subscription.
pub type ChangeFeed = mpsc::UnboundedReceiver<ChangeBatch>;

/// Shared handle to a store backend.
pub type SharedStore = Arc<dyn DocumentStore>;

// == Document Store ==
/// Operations the hosted document database exposes to this layer.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Reads one document. `Ok(None)` if it does not exist.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Reads every document of a collection.
    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError>;

    /// Creates a document and returns the server-assigned id.
    async fn add(&self, collection: &str, fields: Fields) -> Result<String, StoreError>;

    /// Merges `patch` into an existing document. Fails with `NotFound` if absent.
    async fn update(&self, collection: &str, id: &str, patch: Fields) -> Result<(), StoreError>;

    /// Deletes a document. Deleting a missing document succeeds.
    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;

    /// Opens a change feed. The first batch carries the current matching
    /// documents as `Added`.
    async fn watch(&self, target: &WatchTarget) -> Result<ChangeFeed, StoreError>;
}
