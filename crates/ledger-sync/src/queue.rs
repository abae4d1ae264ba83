//! # Sync Queue
//!
//! Durable backlog of remote writes that could not be made yet, and the
//! replayer that pushes them once the remote store is back.
//!
//! ## Drain Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         SyncQueue::drain()                              │
//! │                                                                         │
//! │  1. Lock: one drain at a time; a second caller waits                    │
//! │                                                                         │
//! │  2. Snapshot: pending entries, ascending seq                            │
//! │     (entries enqueued from here on wait for the next drain)             │
//! │                                                                         │
//! │  3. For each entry:                                                     │
//! │     ┌──────────────────────────────────────────────────────────────┐    │
//! │     │ record failed this pass or dead? ──yes──► deferred           │    │
//! │     │        │no                                                   │    │
//! │     │        ▼                                                     │    │
//! │     │ create/update → upsert by id                                 │    │
//! │     │ delete        → delete by id (absent is fine)                │    │
//! │     │        │                                                     │    │
//! │     │   ok ──┴──► remove entry, mark local record synced           │    │
//! │     │   err ────► retry_count += 1, last_error recorded            │    │
//! │     │             cap reached → dead letter                        │    │
//! │     └──────────────────────────────────────────────────────────────┘    │
//! │                                                                         │
//! │  4. Report: { synced, failed, deferred, dead_lettered, errors }         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! No backoff: a drain is triggered by the caller or the agent's timer.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use ledger_core::{EntityType, QueueStatus, RecordEnvelope, SyncAction, SyncQueueEntry};
use ledger_db::Database;

use crate::error::SyncResult;
use crate::remote::RemoteStore;
use crate::router::StoreRouter;

/// Aggregate result of one drain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Entries replayed and removed.
    pub synced: usize,
    /// Entries attempted and failed; still queued or now dead.
    pub failed: usize,
    /// Entries not attempted, because the remote was offline or an earlier
    /// entry for the same record failed.
    pub deferred: usize,
    /// Failures that hit the retry cap in this drain.
    pub dead_lettered: usize,
    /// One message per failed entry.
    pub errors: Vec<String>,
}

impl DrainReport {
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.deferred == 0
    }

    pub fn attempted(&self) -> usize {
        self.synced + self.failed
    }
}

pub struct SyncQueue {
    db: Database,
    remote: Arc<dyn RemoteStore>,
    router: StoreRouter,
    max_retries: u32,
    drain_lock: Mutex<()>,
}

impl SyncQueue {
    /// `max_retries == 0` retries forever.
    pub fn new(db: Database, remote: Arc<dyn RemoteStore>, router: StoreRouter, max_retries: u32) -> Self {
        SyncQueue {
            db,
            remote,
            router,
            max_retries,
            drain_lock: Mutex::new(()),
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Appends a mutation. The payload is the envelope as of now.
    pub async fn enqueue(&self, envelope: &RecordEnvelope, action: SyncAction) -> SyncResult<SyncQueueEntry> {
        let payload = serde_json::to_string(envelope)?;
        let entry = self
            .db
            .sync_queue()
            .enqueue(envelope.entity, &envelope.id, action, &payload)
            .await?;
        Ok(entry)
    }

    pub async fn pending(&self) -> SyncResult<Vec<SyncQueueEntry>> {
        Ok(self.db.sync_queue().pending().await?)
    }

    pub async fn pending_count(&self) -> SyncResult<i64> {
        Ok(self.db.sync_queue().count_pending().await?)
    }

    pub async fn dead_letters(&self) -> SyncResult<Vec<SyncQueueEntry>> {
        Ok(self.db.sync_queue().dead_letters().await?)
    }

    /// Gives every dead letter a fresh retry budget. Returns how many.
    pub async fn requeue_dead(&self) -> SyncResult<u64> {
        let requeued = self.db.sync_queue().requeue_all_dead().await?;
        if requeued > 0 {
            info!(requeued, "Dead letters requeued");
        }
        Ok(requeued)
    }

    /// True while a queued mutation for this record waits for replay,
    /// including one parked as a dead letter.
    pub async fn has_queued_for(&self, entity: EntityType, id: &str) -> SyncResult<bool> {
        Ok(self.db.sync_queue().has_queued_for(entity, id).await?)
    }

    /// Replays the pending entries present when the drain starts.
    pub async fn drain(&self) -> SyncResult<DrainReport> {
        let _guard = self.drain_lock.lock().await;
        let queue = self.db.sync_queue();

        let entries = queue.pending().await?;
        let mut report = DrainReport::default();

        if entries.is_empty() {
            debug!("Sync queue empty");
            return Ok(report);
        }

        if !self.router.is_online() {
            debug!(pending = entries.len(), "Remote offline, drain deferred");
            report.deferred = entries.len();
            return Ok(report);
        }

        info!(count = entries.len(), "Draining sync queue");
        // Records with a dead letter stay blocked until it is requeued.
        let mut blocked: HashSet<(EntityType, String)> = queue.dead_record_keys().await?.into_iter().collect();

        for entry in entries {
            let key = (entry.entity_type, entry.entity_id.clone());
            if blocked.contains(&key) {
                report.deferred += 1;
                continue;
            }

            match self.replay(&entry).await {
                Ok(version) => {
                    queue.remove(&entry.id).await?;
                    if let Some(version) = version {
                        if let Err(e) = self
                            .db
                            .records()
                            .mark_synced(entry.entity_type, &entry.entity_id, version)
                            .await
                        {
                            warn!(entity = %entry.entity_type, id = %entry.entity_id, error = %e, "Failed to mark record synced");
                        }
                    }
                    report.synced += 1;
                }
                Err(e) => {
                    let message = e.to_string();
                    let (status, retries) = queue.record_failure(&entry.id, &message, self.max_retries).await?;
                    warn!(
                        entity = %entry.entity_type,
                        id = %entry.entity_id,
                        action = %entry.action,
                        retries,
                        error = %message,
                        "Replay failed"
                    );

                    report.failed += 1;
                    if status == QueueStatus::Dead {
                        report.dead_lettered += 1;
                    }
                    report.errors.push(format!(
                        "{} {} {}: {}",
                        entry.action, entry.entity_type, entry.entity_id, message
                    ));
                    blocked.insert(key);
                }
            }
        }

        info!(
            synced = report.synced,
            failed = report.failed,
            deferred = report.deferred,
            dead_lettered = report.dead_lettered,
            "Sync queue drained"
        );
        Ok(report)
    }

    /// Applies one entry remotely. Returns the version to mark synced.
    async fn replay(&self, entry: &SyncQueueEntry) -> SyncResult<Option<DateTime<Utc>>> {
        match entry.action {
            SyncAction::Create | SyncAction::Update => {
                let envelope = entry.envelope()?;
                self.remote.upsert(&envelope).await?;
                Ok(Some(envelope.updated_at))
            }
            SyncAction::Delete => {
                self.remote.delete(entry.entity_type, &entry.entity_id).await?;
                Ok(entry.envelope().ok().map(|e| e.updated_at))
            }
        }
    }
}
