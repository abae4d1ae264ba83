//! # Ledger Sync Agent
//!
//! Long-running daemon for one billing device.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  startup:   config ─► local store ─► remote store ─► router             │
//! │             ─► export scheduler ─► data service ─► sync agent           │
//! │                                                                         │
//! │  running:   health checks, queue drains, debounced exports              │
//! │                                                                         │
//! │  shutdown:  stop agent ─► flush pending export ─► close local store     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Usage: `sync-agent [path/to/sync.toml]`. `RUST_LOG` controls verbosity.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ledger_db::{Database, DbConfig};
use ledger_sync::{
    AgentSettings, AuthoritativeReader, DataService, DetachedRemoteStore, ExportScheduler, Mirror,
    MirrorExporter, PgRemoteStore, RemoteStore, StoreRouter, SyncAgent, SyncConfig, SystemClock,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = SyncConfig::load(config_path).context("loading sync configuration")?;
    info!(device_id = %config.device_id(), mode = %config.mode(), "Starting ledger sync agent");

    // Local store
    let db_path = config.database_path();
    let db = Database::new(DbConfig::new(&db_path).max_connections(config.database.max_connections))
        .await
        .with_context(|| format!("opening local store at {}", db_path.display()))?;

    // Remote store
    let remote: Arc<dyn RemoteStore> = match config.remote_url() {
        Some(url) => Arc::new(
            PgRemoteStore::connect_lazy(url, config.remote.max_connections, config.connect_timeout())
                .context("configuring remote store")?,
        ),
        None => {
            warn!("No remote store configured, running with the local store only");
            Arc::new(DetachedRemoteStore)
        }
    };
    let router = StoreRouter::new(config.mode(), false);

    // Debounced workbook export
    let mirror = Mirror::from_config(&config);
    let reader = AuthoritativeReader::new(db.clone(), remote.clone(), router.clone());
    let export = ExportScheduler::new(Arc::new(MirrorExporter::new(reader, mirror)), config.debounce()).start();
    export.schedule();

    let service = DataService::new(
        db.with_listener(Arc::new(export.clone())),
        remote.clone(),
        router,
        Arc::new(SystemClock),
        config.queue.max_retries,
    );
    let pending = service.queue().pending_count().await?;
    info!(pending, "Sync queue loaded");

    let (agent, agent_handle) = SyncAgent::new(service, remote, AgentSettings::from_config(&config));
    let agent_task = tokio::spawn(agent.run());

    shutdown_signal().await;

    agent_handle.shutdown().await?;
    agent_task.await.context("sync agent task panicked")?;

    if let Err(e) = export.shutdown().await {
        warn!(error = %e, "Final export did not complete");
    }
    db.close().await;

    info!("Sync agent shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
