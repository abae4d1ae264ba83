//! # Sync Agent
//!
//! Background loop that keeps the router's online flag current and drains
//! the sync queue.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         SyncAgent::run                                  │
//! │                                                                         │
//! │  health tick ──► remote.health_check() ──► router.set_online(ok)        │
//! │                                              │                          │
//! │                                              └─ offline → online:       │
//! │                                                 drain immediately       │
//! │                                                                         │
//! │  drain tick  ──► drain (skipped while offline)                          │
//! │                                                                         │
//! │  DrainNow    ──► drain, reply with the report                           │
//! │  Shutdown    ──► stop                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::queue::DrainReport;
use crate::remote::RemoteStore;
use crate::service::DataService;

/// Timing for the agent loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentSettings {
    pub health_check_interval: Duration,
    /// `None` drains only on reconnect or on request.
    pub drain_interval: Option<Duration>,
}

impl AgentSettings {
    pub fn from_config(config: &SyncConfig) -> Self {
        AgentSettings {
            health_check_interval: config.health_check_interval(),
            drain_interval: config.drain_interval(),
        }
    }
}

enum AgentCommand {
    DrainNow {
        reply: oneshot::Sender<SyncResult<DrainReport>>,
    },
    Shutdown,
}

/// Handle for controlling a running [`SyncAgent`].
#[derive(Clone)]
pub struct SyncAgentHandle {
    cmd_tx: mpsc::Sender<AgentCommand>,
}

impl SyncAgentHandle {
    /// Drains the queue now and returns the report.
    pub async fn drain_now(&self) -> SyncResult<DrainReport> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(AgentCommand::DrainNow { reply })
            .await
            .map_err(|_| SyncError::ChannelError("Agent channel closed".into()))?;
        rx.await.map_err(|_| SyncError::ShuttingDown)?
    }

    /// Triggers graceful shutdown.
    pub async fn shutdown(&self) -> SyncResult<()> {
        self.cmd_tx
            .send(AgentCommand::Shutdown)
            .await
            .map_err(|_| SyncError::ChannelError("Agent channel closed".into()))
    }
}

pub struct SyncAgent {
    service: DataService,
    remote: Arc<dyn RemoteStore>,
    settings: AgentSettings,
    cmd_rx: mpsc::Receiver<AgentCommand>,
}

impl SyncAgent {
    /// Creates the agent and its handle. Call [`SyncAgent::run`] to start.
    pub fn new(service: DataService, remote: Arc<dyn RemoteStore>, settings: AgentSettings) -> (Self, SyncAgentHandle) {
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let agent = SyncAgent {
            service,
            remote,
            settings,
            cmd_rx,
        };
        (agent, SyncAgentHandle { cmd_tx })
    }

    pub async fn run(mut self) {
        info!(
            health_secs = self.settings.health_check_interval.as_secs(),
            drain_secs = self.settings.drain_interval.map(|d| d.as_secs()),
            "Sync agent starting"
        );

        let mut health = interval(self.settings.health_check_interval);
        health.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let drain_enabled = self.settings.drain_interval.is_some();
        let mut drain = interval(self.settings.drain_interval.unwrap_or(Duration::from_secs(3600)));
        drain.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = health.tick() => {
                    self.check_health().await;
                }

                _ = drain.tick(), if drain_enabled => {
                    if self.service.router().is_online() {
                        self.drain_logged().await;
                    } else {
                        debug!("Remote offline, skipping scheduled drain");
                    }
                }

                cmd = self.cmd_rx.recv() => match cmd {
                    Some(AgentCommand::DrainNow { reply }) => {
                        let _ = reply.send(self.service.drain().await);
                    }
                    Some(AgentCommand::Shutdown) | None => {
                        info!("Sync agent shutting down");
                        break;
                    }
                },
            }
        }

        info!("Sync agent stopped");
    }

    async fn check_health(&self) {
        let online = self.remote.health_check().await;
        let router = self.service.router();
        if !router.set_online(online) {
            return;
        }

        if online {
            info!("Remote store reachable");
            self.drain_logged().await;
        } else {
            warn!("Remote store unreachable, writes will be queued");
        }
    }

    async fn drain_logged(&self) {
        match self.service.drain().await {
            Ok(report) if report.attempted() == 0 && report.deferred == 0 => debug!("Sync queue empty"),
            Ok(report) => {
                if report.is_clean() {
                    info!(synced = report.synced, "Sync queue drained");
                } else {
                    warn!(
                        synced = report.synced,
                        failed = report.failed,
                        deferred = report.deferred,
                        dead_lettered = report.dead_lettered,
                        "Sync queue drained with failures"
                    );
                }
            }
            Err(e) => error!(error = %e, "Sync queue drain failed"),
        }
    }
}
