//! # Sync Queue Repository
//!
//! Durable FIFO of mutations that have not reached the remote store.
//!
//! ## The Queue Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  WRITE (remote unavailable or offline)                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  INSERT INTO sync_queue (... payload = <envelope JSON>)                │
//! │       seq = AUTOINCREMENT  ← FIFO position                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            REPLAYER (ledger-sync::queue)                        │   │
//! │  │                                                                 │   │
//! │  │  1. pending()  ← snapshot, ORDER BY seq                        │   │
//! │  │  2. For each entry:                                            │   │
//! │  │     a. Apply to remote store                                   │   │
//! │  │     b. On success: remove(id)                                  │   │
//! │  │     c. On failure: record_failure(id, error, max_retries)      │   │
//! │  │                    retry_count += 1, maybe status = 'dead'     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  KEY GUARANTEES:                                                       │
//! │  • The mutation is never lost (it's in the local DB)                   │
//! │  • Order is preserved by seq                                           │
//! │  • Dead entries stay visible until requeued                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, warn};
use uuid::Uuid;

use ledger_core::{EntityType, QueueStatus, SyncAction, SyncQueueEntry};

use super::{parse_timestamp, timestamp};
use crate::error::{DbError, DbResult};

/// Raw queue row as SQLite stores it.
#[derive(Debug, sqlx::FromRow)]
struct QueueRow {
    seq: i64,
    id: String,
    entity_type: String,
    entity_id: String,
    action: String,
    payload: String,
    created_at: String,
    retry_count: i64,
    last_error: Option<String>,
    attempted_at: Option<String>,
    status: String,
}

impl TryFrom<QueueRow> for SyncQueueEntry {
    type Error = DbError;

    fn try_from(row: QueueRow) -> Result<Self, Self::Error> {
        let created_at = parse_timestamp(&row.created_at)
            .ok_or_else(|| DbError::Serialization(format!("bad created_at on queue entry {}", row.id)))?;

        Ok(SyncQueueEntry {
            seq: row.seq,
            entity_type: row.entity_type.parse()?,
            entity_id: row.entity_id,
            action: row.action.parse()?,
            payload: row.payload,
            created_at,
            retry_count: u32::try_from(row.retry_count).unwrap_or(u32::MAX),
            last_error: row.last_error,
            attempted_at: row.attempted_at.as_deref().and_then(parse_timestamp),
            status: row.status.parse()?,
            id: row.id,
        })
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT seq, id, entity_type, entity_id, action, payload,
           created_at, retry_count, last_error, attempted_at, status
    FROM sync_queue
"#;

/// Repository for sync queue operations.
#[derive(Debug, Clone)]
pub struct SyncQueueRepository {
    pool: SqlitePool,
}

impl SyncQueueRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SyncQueueRepository { pool }
    }

    /// Appends a mutation to the queue.
    ///
    /// ## Arguments
    /// * `payload` - JSON of the record envelope at enqueue time
    pub async fn enqueue(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        action: SyncAction,
        payload: &str,
    ) -> DbResult<SyncQueueEntry> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        debug!(
            entity_type = %entity_type,
            entity_id = %entity_id,
            action = %action,
            "Queuing for sync"
        );

        let seq: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO sync_queue (
                id, entity_type, entity_id, action, payload,
                created_at, retry_count, status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 'pending')
            RETURNING seq
            "#,
        )
        .bind(&id)
        .bind(entity_type.as_str())
        .bind(entity_id)
        .bind(action.as_str())
        .bind(payload)
        .bind(timestamp(now))
        .fetch_one(&self.pool)
        .await?;

        Ok(SyncQueueEntry {
            seq,
            id,
            entity_type,
            entity_id: entity_id.to_string(),
            action,
            payload: payload.to_string(),
            created_at: now,
            retry_count: 0,
            last_error: None,
            attempted_at: None,
            status: QueueStatus::Pending,
        })
    }

    /// All pending entries, oldest first.
    pub async fn pending(&self) -> DbResult<Vec<SyncQueueEntry>> {
        self.fetch_by_status(QueueStatus::Pending).await
    }

    /// Entries whose retry budget ran out, oldest first.
    pub async fn dead_letters(&self) -> DbResult<Vec<SyncQueueEntry>> {
        self.fetch_by_status(QueueStatus::Dead).await
    }

    async fn fetch_by_status(&self, status: QueueStatus) -> DbResult<Vec<SyncQueueEntry>> {
        let sql = format!("{SELECT_COLUMNS} WHERE status = ?1 ORDER BY seq ASC");
        let rows: Vec<QueueRow> = sqlx::query_as(&sql)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(SyncQueueEntry::try_from).collect()
    }

    /// Fetches one entry by id.
    pub async fn get(&self, id: &str) -> DbResult<Option<SyncQueueEntry>> {
        let sql = format!("{SELECT_COLUMNS} WHERE id = ?1");
        let row: Option<QueueRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(SyncQueueEntry::try_from).transpose()
    }

    /// True if any pending or dead entry targets this record.
    ///
    /// A dead entry still counts: once requeued it replays at its original
    /// position, so nothing newer for the record may reach the remote first.
    pub async fn has_queued_for(&self, entity_type: EntityType, entity_id: &str) -> DbResult<bool> {
        let found: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM sync_queue
                WHERE entity_type = ?1 AND entity_id = ?2 AND status IN ('pending', 'dead')
            )
            "#,
        )
        .bind(entity_type.as_str())
        .bind(entity_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(found)
    }

    /// `(entity_type, entity_id)` of every record with a dead entry.
    pub async fn dead_record_keys(&self) -> DbResult<Vec<(EntityType, String)>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT DISTINCT entity_type, entity_id FROM sync_queue WHERE status = 'dead'",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(entity, id)| -> DbResult<(EntityType, String)> { Ok((entity.parse()?, id)) })
            .collect()
    }

    /// Removes an entry after a successful replay.
    pub async fn remove(&self, id: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM sync_queue WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Records a failed replay.
    ///
    /// Increments `retry_count`, stores the error, and moves the entry to
    /// the dead-letter state once `retry_count` reaches `max_retries`.
    /// `max_retries == 0` never dead-letters.
    ///
    /// ## Returns
    /// The entry's status and retry count after the update.
    pub async fn record_failure(
        &self,
        id: &str,
        error: &str,
        max_retries: u32,
    ) -> DbResult<(QueueStatus, u32)> {
        let row: Option<(String, i64)> = sqlx::query_as(
            r#"
            UPDATE sync_queue SET
                retry_count = retry_count + 1,
                last_error = ?2,
                attempted_at = ?3,
                status = CASE
                    WHEN ?4 > 0 AND retry_count + 1 >= ?4 THEN 'dead'
                    ELSE status
                END
            WHERE id = ?1
            RETURNING status, retry_count
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(timestamp(Utc::now()))
        .bind(i64::from(max_retries))
        .fetch_optional(&self.pool)
        .await?;

        let (status, retries) = row.ok_or_else(|| DbError::not_found("SyncQueueEntry", id))?;
        let status: QueueStatus = status.parse()?;
        let retries = u32::try_from(retries).unwrap_or(u32::MAX);

        if status == QueueStatus::Dead {
            warn!(id = %id, retries, error = %error, "Queue entry moved to dead letters");
        }

        Ok((status, retries))
    }

    /// Puts a dead entry back in line with a fresh retry budget.
    ///
    /// It keeps its original `seq`, so it replays in its original position.
    pub async fn requeue(&self, id: &str) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE sync_queue SET status = 'pending', retry_count = 0
            WHERE id = ?1 AND status = 'dead'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Requeues every dead entry. Returns how many moved.
    pub async fn requeue_all_dead(&self) -> DbResult<u64> {
        let result = sqlx::query(
            "UPDATE sync_queue SET status = 'pending', retry_count = 0 WHERE status = 'dead'",
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Counts pending entries.
    pub async fn count_pending(&self) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sync_queue WHERE status = 'pending'")
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// Counts dead entries.
    pub async fn count_dead(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sync_queue WHERE status = 'dead'")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    async fn setup() -> SyncQueueRepository {
        Database::new(DbConfig::in_memory()).await.unwrap().sync_queue()
    }

    #[tokio::test]
    async fn test_enqueue_preserves_fifo_order() {
        let queue = setup().await;
        for id in ["a", "b", "c"] {
            queue
                .enqueue(EntityType::Invoice, id, SyncAction::Create, "{}")
                .await
                .unwrap();
        }

        let pending = queue.pending().await.unwrap();
        let ids: Vec<&str> = pending.iter().map(|e| e.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(pending.windows(2).all(|w| w[0].seq < w[1].seq));
    }

    #[tokio::test]
    async fn test_get_round_trips_row() {
        let queue = setup().await;
        let entry = queue
            .enqueue(EntityType::InvoiceItem, "x", SyncAction::Delete, "{\"k\":1}")
            .await
            .unwrap();

        let back = queue.get(&entry.id).await.unwrap().unwrap();
        assert_eq!(back.entity_type, EntityType::InvoiceItem);
        assert_eq!(back.action, SyncAction::Delete);
        assert_eq!(back.payload, "{\"k\":1}");
        assert_eq!(back.status, QueueStatus::Pending);
    }

    #[tokio::test]
    async fn test_remove() {
        let queue = setup().await;
        let entry = queue
            .enqueue(EntityType::Product, "p", SyncAction::Update, "{}")
            .await
            .unwrap();

        assert!(queue.remove(&entry.id).await.unwrap());
        assert!(!queue.remove(&entry.id).await.unwrap());
        assert_eq!(queue.count_pending().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failures_dead_letter_at_cap() {
        let queue = setup().await;
        let entry = queue
            .enqueue(EntityType::Product, "p", SyncAction::Update, "{}")
            .await
            .unwrap();

        let (status, retries) = queue.record_failure(&entry.id, "timeout", 2).await.unwrap();
        assert_eq!((status, retries), (QueueStatus::Pending, 1));

        let (status, retries) = queue.record_failure(&entry.id, "timeout", 2).await.unwrap();
        assert_eq!((status, retries), (QueueStatus::Dead, 2));

        assert_eq!(queue.count_pending().await.unwrap(), 0);
        let dead = queue.dead_letters().await.unwrap();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].last_error.as_deref(), Some("timeout"));
        assert!(dead[0].attempted_at.is_some());
    }

    #[tokio::test]
    async fn test_zero_cap_never_dead_letters() {
        let queue = setup().await;
        let entry = queue
            .enqueue(EntityType::Product, "p", SyncAction::Update, "{}")
            .await
            .unwrap();

        for _ in 0..25 {
            queue.record_failure(&entry.id, "down", 0).await.unwrap();
        }
        let back = queue.get(&entry.id).await.unwrap().unwrap();
        assert_eq!(back.status, QueueStatus::Pending);
        assert_eq!(back.retry_count, 25);
    }

    #[tokio::test]
    async fn test_requeue_restores_budget() {
        let queue = setup().await;
        let entry = queue
            .enqueue(EntityType::Product, "p", SyncAction::Update, "{}")
            .await
            .unwrap();
        queue.record_failure(&entry.id, "down", 1).await.unwrap();
        assert_eq!(queue.count_dead().await.unwrap(), 1);

        assert!(queue.requeue(&entry.id).await.unwrap());
        let back = queue.get(&entry.id).await.unwrap().unwrap();
        assert_eq!(back.status, QueueStatus::Pending);
        assert_eq!(back.retry_count, 0);

        // Only dead entries can be requeued
        assert!(!queue.requeue(&entry.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_failure_on_missing_entry() {
        let queue = setup().await;
        assert!(matches!(
            queue.record_failure("missing", "x", 3).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_has_queued_for() {
        let queue = setup().await;
        queue
            .enqueue(EntityType::Invoice, "i-1", SyncAction::Create, "{}")
            .await
            .unwrap();

        assert!(queue.has_queued_for(EntityType::Invoice, "i-1").await.unwrap());
        assert!(!queue.has_queued_for(EntityType::Invoice, "i-2").await.unwrap());
        assert!(!queue.has_queued_for(EntityType::Product, "i-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_dead_entry_still_counts_as_queued() {
        let queue = setup().await;
        let entry = queue
            .enqueue(EntityType::Customer, "c-1", SyncAction::Update, "{}")
            .await
            .unwrap();
        queue.record_failure(&entry.id, "rejected", 1).await.unwrap();
        assert_eq!(queue.count_pending().await.unwrap(), 0);

        assert!(queue.has_queued_for(EntityType::Customer, "c-1").await.unwrap());
        assert_eq!(
            queue.dead_record_keys().await.unwrap(),
            vec![(EntityType::Customer, "c-1".to_string())]
        );
    }
}
