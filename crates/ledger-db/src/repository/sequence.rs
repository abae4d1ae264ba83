//! # Invoice Sequence Repository
//!
//! Per-store, per-day invoice counters in the local store.
//!
//! ## Atomic Increment
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  INSERT (store, day, 1)                                                 │
//! │  ON CONFLICT (store, day) DO UPDATE                                     │
//! │      SET sequence = sequence + 1                                        │
//! │      WHERE sequence < limit                                             │
//! │  RETURNING sequence                                                     │
//! │                                                                         │
//! │  first call of the day  → row inserted        → 1                       │
//! │  later calls            → row updated         → n + 1                   │
//! │  counter at limit       → WHERE false, no row → None (exhausted)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A single statement, so two writers can never read the same value and
//! the counter never passes the limit. The date is part of the key, which
//! is what resets numbering at midnight.

use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use super::timestamp;
use crate::error::DbResult;

fn day_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Repository for local invoice counters.
#[derive(Debug, Clone)]
pub struct SequenceRepository {
    pool: SqlitePool,
}

impl SequenceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SequenceRepository { pool }
    }

    /// Claims the next sequence for `(store_id, date)`.
    ///
    /// ## Returns
    /// * `Some(n)` - the claimed value, `1..=limit`
    /// * `None` - the day's counter already reached `limit`
    pub async fn increment_daily(
        &self,
        store_id: &str,
        date: NaiveDate,
        limit: u32,
    ) -> DbResult<Option<u32>> {
        if limit == 0 {
            return Ok(None);
        }

        let next: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO invoice_sequences (store_id, sequence_date, sequence, updated_at)
            VALUES (?1, ?2, 1, ?3)
            ON CONFLICT (store_id, sequence_date) DO UPDATE SET
                sequence = invoice_sequences.sequence + 1,
                updated_at = excluded.updated_at
            WHERE invoice_sequences.sequence < ?4
            RETURNING sequence
            "#,
        )
        .bind(store_id)
        .bind(day_key(date))
        .bind(timestamp(Utc::now()))
        .bind(i64::from(limit))
        .fetch_optional(&self.pool)
        .await?;

        debug!(store_id = %store_id, %date, ?next, "Local invoice sequence claimed");

        Ok(next.and_then(|n| u32::try_from(n).ok()))
    }

    /// Moves the counter for `(store_id, date)` up to `value` if it is lower.
    ///
    /// Keeps the local counter at or above numbers issued elsewhere, so a
    /// later local claim never repeats one of them.
    pub async fn raise_to(&self, store_id: &str, date: NaiveDate, value: u32) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO invoice_sequences (store_id, sequence_date, sequence, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (store_id, sequence_date) DO UPDATE SET
                sequence = MAX(invoice_sequences.sequence, excluded.sequence),
                updated_at = excluded.updated_at
            "#,
        )
        .bind(store_id)
        .bind(day_key(date))
        .bind(i64::from(value))
        .bind(timestamp(Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Current value for `(store_id, date)`; 0 if nothing was issued.
    pub async fn current(&self, store_id: &str, date: NaiveDate) -> DbResult<u32> {
        let value: Option<i64> = sqlx::query_scalar(
            "SELECT sequence FROM invoice_sequences WHERE store_id = ?1 AND sequence_date = ?2",
        )
        .bind(store_id)
        .bind(day_key(date))
        .fetch_optional(&self.pool)
        .await?;

        Ok(value.and_then(|n| u32::try_from(n).ok()).unwrap_or(0))
    }
}
