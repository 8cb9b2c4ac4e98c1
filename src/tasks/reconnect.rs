//! Reconnect Replay Task
//!
//! Replays the offline queue each time the connectivity signal turns Online.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::service::DocumentService;

/// Spawns a task that calls `sync_offline_queue` on every Offline to Online transition.
pub fn spawn_reconnect_task(service: Arc<DocumentService>) -> JoinHandle<()> {
    let mut changes = service.connectivity().subscribe();

    tokio::spawn(async move {
        info!("Starting reconnect replay task");

        while changes.changed().await.is_ok() {
            let state = *changes.borrow_and_update();
            if !state.is_online() {
                debug!("Connectivity lost, writes will be queued");
                continue;
            }

            let report = service.sync_offline_queue().await;
            if report.coalesced {
                debug!("Reconnect replay folded into running replay");
            } else if !report.is_clean() {
                warn!(
                    failed = report.failed.len(),
                    dropped = report.dropped.len(),
                    remaining = report.remaining,
                    "Reconnect replay left work behind"
                );
            }
        }
    })
}
