//! # Debounced Export
//!
//! Every local mutation schedules a workbook export. Bursts coalesce: the
//! export fires once the store has been quiet for the configured period.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  time ──►                                                               │
//! │                                                                         │
//! │  writes:    W   W  W        W                                           │
//! │             │   │  │        │                                           │
//! │  deadline:  ├───┼──┼──500ms─┼──► (reset on every write)                 │
//! │                                 └──500ms──► export #1                   │
//! │                                                                         │
//! │  flush():     export now, clear the deadline, reply with the outcome    │
//! │  shutdown():  export if a deadline is pending, then stop                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Exports run inside the scheduler task, so at most one is in flight and
//! each one reads the store after every mutation that scheduled it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use ledger_db::{ChangeEvent, ChangeListener};

use crate::error::{SyncError, SyncResult};
use crate::mirror::{ExportOutcome, Mirror};
use crate::reader::AuthoritativeReader;

// =============================================================================
// Exporter
// =============================================================================

/// Produces one full export.
#[async_trait]
pub trait Exporter: Send + Sync + 'static {
    async fn export(&self) -> ExportOutcome;
}

/// Snapshot of the authoritative store written through a [`Mirror`].
pub struct MirrorExporter {
    reader: AuthoritativeReader,
    mirror: Mirror,
}

impl MirrorExporter {
    pub fn new(reader: AuthoritativeReader, mirror: Mirror) -> Self {
        MirrorExporter { reader, mirror }
    }
}

#[async_trait]
impl Exporter for MirrorExporter {
    async fn export(&self) -> ExportOutcome {
        match self.reader.snapshot().await {
            Ok(snapshot) => self.mirror.export_all(&snapshot).await,
            Err(e) => ExportOutcome::Failed {
                reason: format!("could not read snapshot: {}", e),
            },
        }
    }
}

// =============================================================================
// Scheduler
// =============================================================================

#[derive(Debug)]
enum ExportCommand {
    /// A mutation happened; restart the quiet period.
    Schedule,
    /// Export now.
    Flush { reply: oneshot::Sender<ExportOutcome> },
    /// Export anything pending and stop.
    Shutdown { reply: oneshot::Sender<()> },
}

pub struct ExportScheduler {
    exporter: Arc<dyn Exporter>,
    quiet_period: Duration,
}

/// Handle for controlling the scheduler. Also a [`ChangeListener`].
#[derive(Clone)]
pub struct ExportHandle {
    cmd_tx: mpsc::Sender<ExportCommand>,
    last: watch::Receiver<Option<ExportOutcome>>,
}

impl ExportHandle {
    /// Restarts the quiet period. Never blocks.
    pub fn schedule(&self) {
        if let Err(e) = self.cmd_tx.try_send(ExportCommand::Schedule) {
            debug!(error = %e, "Export schedule request dropped");
        }
    }

    /// Exports immediately and returns the outcome.
    pub async fn flush(&self) -> SyncResult<ExportOutcome> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(ExportCommand::Flush { reply })
            .await
            .map_err(|_| SyncError::ChannelError("Export scheduler channel closed".into()))?;
        rx.await.map_err(|_| SyncError::ShuttingDown)
    }

    /// Runs a pending export, if any, and stops the scheduler.
    pub async fn shutdown(&self) -> SyncResult<()> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(ExportCommand::Shutdown { reply })
            .await
            .map_err(|_| SyncError::ChannelError("Export scheduler channel closed".into()))?;
        rx.await.map_err(|_| SyncError::ShuttingDown)
    }

    /// Outcome of the most recent export, if one ran.
    pub fn last_outcome(&self) -> Option<ExportOutcome> {
        self.last.borrow().clone()
    }
}

impl ChangeListener for ExportHandle {
    fn on_change(&self, _event: &ChangeEvent) {
        self.schedule();
    }
}

impl ExportScheduler {
    pub fn new(exporter: Arc<dyn Exporter>, quiet_period: Duration) -> Self {
        ExportScheduler { exporter, quiet_period }
    }

    /// Spawns the scheduler task and returns its handle.
    pub fn start(self) -> ExportHandle {
        let (cmd_tx, cmd_rx) = mpsc::channel(256);
        let (last_tx, last) = watch::channel(None);

        tokio::spawn(async move {
            self.run(cmd_rx, last_tx).await;
        });

        ExportHandle { cmd_tx, last }
    }

    async fn run(self, mut cmd_rx: mpsc::Receiver<ExportCommand>, last_tx: watch::Sender<Option<ExportOutcome>>) {
        info!(quiet_ms = self.quiet_period.as_millis() as u64, "Export scheduler started");
        let mut deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(ExportCommand::Schedule) => {
                        deadline = Some(Instant::now() + self.quiet_period);
                    }
                    Some(ExportCommand::Flush { reply }) => {
                        deadline = None;
                        let outcome = self.export(&last_tx).await;
                        let _ = reply.send(outcome);
                    }
                    Some(ExportCommand::Shutdown { reply }) => {
                        if deadline.take().is_some() {
                            self.export(&last_tx).await;
                        }
                        let _ = reply.send(());
                        break;
                    }
                    None => {
                        if deadline.take().is_some() {
                            self.export(&last_tx).await;
                        }
                        break;
                    }
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    deadline = None;
                    self.export(&last_tx).await;
                }
            }
        }

        info!("Export scheduler stopped");
    }

    async fn export(&self, last_tx: &watch::Sender<Option<ExportOutcome>>) -> ExportOutcome {
        let outcome = self.exporter.export().await;
        match &outcome {
            ExportOutcome::Written(_) => debug!("Scheduled export written"),
            ExportOutcome::Degraded { reason, .. } => warn!(%reason, "Scheduled export degraded"),
            ExportOutcome::Failed { reason } => warn!(%reason, "Scheduled export failed"),
        }
        last_tx.send_replace(Some(outcome.clone()));
        outcome
    }
}
