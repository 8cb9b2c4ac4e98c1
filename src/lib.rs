//! Classroom Sync - offline-tolerant data access for a classroom portal
//!
//! Wraps a remote document store with a bounded TTL read cache, an offline
//! write queue replayed in order on reconnect, realtime change subscriptions,
//! a one-shot data migration and a single role policy.

pub mod api;
pub mod cache;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod migration;
pub mod models;
pub mod policy;
pub mod realtime;
pub mod service;
pub mod store;
pub mod tasks;

pub use api::AppState;
pub use config::Config;
pub use connectivity::{Connectivity, ConnectivityMonitor};
pub use error::{Result, StoreError, SyncError};
pub use migration::DataMigration;
pub use policy::{AccessPolicy, Role};
pub use realtime::RealtimeSync;
pub use service::{DocumentService, ReadPolicy};
pub use store::{DocumentStore, MemoryStore, SharedStore};
pub use tasks::{spawn_cleanup_task, spawn_reconnect_task};
