//! TTL Cleanup Task
//!
//! Background task that periodically removes expired read-cache entries.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::service::DocumentService;

/// Spawns a background task that periodically drops expired cache entries.
///
/// Reads already ignore expired entries, so this only bounds how long dead
/// entries occupy capacity.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
pub fn spawn_cleanup_task(
    service: Arc<DocumentService>,
    cleanup_interval_secs: u64,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting TTL cleanup task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = service.cleanup_expired_cache().await;
            if removed > 0 {
                info!("TTL cleanup: removed {} expired entries", removed);
            } else {
                debug!("TTL cleanup: no expired entries found");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::connectivity::ConnectivityMonitor;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn service_with_ttl(store: Arc<MemoryStore>, ttl_ms: u64) -> Arc<DocumentService> {
        let config = Config {
            cache_default_ttl_ms: ttl_ms,
            ..Config::default()
        };
        Arc::new(DocumentService::from_config(
            store,
            ConnectivityMonitor::online(),
            &config,
        ))
    }

    #[tokio::test]
    async fn test_cleanup_task_removes_expired_entries() {
        let store = Arc::new(MemoryStore::new());
        store
            .seed("lessons", "1", json!({"title": "A"}).as_object().cloned().unwrap())
            .await;
        let service = service_with_ttl(store, 200);

        service.get_document("lessons", "1").await.unwrap();
        assert_eq!(service.cache_stats().await.total_entries, 1);

        let handle = spawn_cleanup_task(service.clone(), 1);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        let stats = service.cache_stats().await;
        assert_eq!(stats.total_entries, 0, "Expired entry should have been cleaned up");
        assert_eq!(stats.expirations, 1);

        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_preserves_valid_entries() {
        let store = Arc::new(MemoryStore::new());
        store
            .seed("lessons", "1", json!({"title": "A"}).as_object().cloned().unwrap())
            .await;
        let service = service_with_ttl(store, 3_600_000);

        service.get_document("lessons", "1").await.unwrap();

        let handle = spawn_cleanup_task(service.clone(), 1);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(service.cache_stats().await.total_entries, 1, "Valid entry should not be removed");

        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_can_be_aborted() {
        let service = service_with_ttl(Arc::new(MemoryStore::new()), 1000);

        let handle = spawn_cleanup_task(service, 1);
        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
