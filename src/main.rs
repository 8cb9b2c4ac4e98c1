//! Classroom Sync gateway
//!
//! Serves the document service over HTTP, backed by the in-memory store.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use classroom_sync::api::{create_router, AppState};
use classroom_sync::migration::{clear_local_source, load_local_collections};
use classroom_sync::{
    spawn_cleanup_task, spawn_reconnect_task, Config, DataMigration, MemoryStore, RealtimeSync,
    SharedStore,
};

/// Collection whose changes are logged as they arrive.
const NOTIFICATIONS: &str = "notifications";

/// Main entry point for the gateway.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build the store, connectivity signal and document service
/// 4. Run the startup migration if `MIGRATION_SOURCE` is set, clearing the
///    source once every record made it
/// 5. Start background cleanup and reconnect tasks, subscribe to notifications
/// 6. Start HTTP server on configured port
/// 7. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "classroom_sync=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Classroom Sync gateway");

    let config = Config::from_env();
    info!(
        "Configuration loaded: max_entries={}, default_ttl={}ms, port={}, cleanup_interval={}s, online={}",
        config.cache_max_entries,
        config.cache_default_ttl_ms,
        config.server_port,
        config.cleanup_interval,
        config.start_online
    );

    let store: SharedStore = Arc::new(MemoryStore::new());
    let state = AppState::from_config(store.clone(), &config);
    info!("Document service initialized");

    if let Some(path) = &config.migration_source {
        let source = load_local_collections(path)
            .with_context(|| format!("loading migration source {}", path.display()))?;
        let mut migration = DataMigration::new(state.service.clone());
        let report = migration.migrate_all(&source).await;
        if !report.success {
            warn!(failed = report.failed, "Startup migration finished with failures");
        } else if let Err(err) = clear_local_source(path) {
            warn!(error = %err, "Could not clear migrated local collections");
        }
    }

    let background = vec![
        spawn_cleanup_task(state.service.clone(), config.cleanup_interval),
        spawn_reconnect_task(state.service.clone()),
    ];
    info!("Background tasks started");

    let realtime = RealtimeSync::new(store);
    let subscribed = realtime
        .subscribe(NOTIFICATIONS, |changes| {
            for change in changes {
                info!(kind = ?change.kind, id = %change.document.id, "Notification change");
            }
        })
        .await;
    if let Err(err) = subscribed {
        error!(error = %err, "Notification subscription failed");
    }

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    realtime.unsubscribe_all().await;
    abort_all(background);
    info!("Server shutdown complete");
    Ok(())
}

fn abort_all(handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        handle.abort();
    }
    warn!("Background tasks aborted");
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
