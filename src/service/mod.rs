//! Service Module
//!
//! The caching, offline-tolerant façade over the document store.

mod documents;
mod queue;
mod replay;

pub use documents::{Added, DocumentService, Fetched, ReadPolicy, WriteStatus};
pub use queue::{OfflineQueue, PendingOperation, QueuedOperation};
pub use replay::{ReplayFailure, ReplayReport};
