//! PostgreSQL remote store.
//!
//! ## Consumed Schema
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  products | customers | invoices | invoice_items | employees | stores   │
//! │  ─────────────────────────────────────────────────────────────────────  │
//! │  id            TEXT PRIMARY KEY                                         │
//! │  owner_id      TEXT          (user, store or invoice scope)             │
//! │  business_key  TEXT NULL     (sku, code, employee code, invoice number) │
//! │  is_deleted    BOOLEAN                                                  │
//! │  data          JSONB         (full record body)                         │
//! │  updated_at    TIMESTAMPTZ                                              │
//! │                                                                         │
//! │  invoice_sequences                                                      │
//! │  ─────────────────────────────────────────────────────────────────────  │
//! │  store_id TEXT, sequence_date DATE, sequence INTEGER,                   │
//! │  updated_at TIMESTAMPTZ, PRIMARY KEY (store_id, sequence_date)          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The schema is owned by the hosted backend; this module never migrates it.
//! The pool connects lazily so a device can start while the network is down.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use tracing::{debug, info};

use ledger_core::{EntityType, RecordEnvelope};
use ledger_db::ListFilter;

use super::RemoteStore;
use crate::error::{SyncError, SyncResult};

/// Row shape shared by every entity table.
#[derive(Debug, sqlx::FromRow)]
struct RemoteRow {
    id: String,
    owner_id: String,
    business_key: Option<String>,
    is_deleted: bool,
    data: Json<serde_json::Value>,
    updated_at: DateTime<Utc>,
}

impl RemoteRow {
    fn into_envelope(self, entity: EntityType) -> RecordEnvelope {
        RecordEnvelope {
            entity,
            id: self.id,
            scope_id: self.owner_id,
            business_key: self.business_key,
            is_deleted: self.is_deleted,
            updated_at: self.updated_at,
            data: self.data.0,
        }
    }
}

const ROW_COLUMNS: &str = "id, owner_id, business_key, is_deleted, data, updated_at";

/// Classifies a sqlx error for the queueing logic.
///
/// ```text
/// 23505 unique_violation           → ConstraintViolation
/// 08xxx connection exception       → RemoteUnavailable
/// io / tls / pool timeout / closed → RemoteUnavailable
/// anything else                    → RemoteRejected
/// ```
fn map_pg_error(err: sqlx::Error) -> SyncError {
    match err {
        sqlx::Error::Database(db) => {
            let code = db.code().map(|c| c.into_owned()).unwrap_or_default();
            if code == "23505" {
                SyncError::ConstraintViolation {
                    field: db.constraint().unwrap_or("business_key").to_string(),
                    value: db.message().to_string(),
                }
            } else if code.starts_with("08") || code == "57P01" {
                SyncError::RemoteUnavailable(db.message().to_string())
            } else {
                SyncError::RemoteRejected(db.message().to_string())
            }
        }
        sqlx::Error::Io(e) => SyncError::RemoteUnavailable(e.to_string()),
        sqlx::Error::Tls(e) => SyncError::RemoteUnavailable(e.to_string()),
        sqlx::Error::PoolTimedOut => SyncError::RemoteUnavailable("connection pool timed out".into()),
        sqlx::Error::PoolClosed => SyncError::RemoteUnavailable("connection pool closed".into()),
        sqlx::Error::WorkerCrashed => SyncError::RemoteUnavailable("connection worker crashed".into()),
        other => SyncError::RemoteRejected(other.to_string()),
    }
}

#[derive(Debug, Clone)]
pub struct PgRemoteStore {
    pool: PgPool,
}

impl PgRemoteStore {
    /// Builds a lazily-connecting pool. Only a malformed URL fails here.
    pub fn connect_lazy(url: &str, max_connections: u32, acquire_timeout: Duration) -> SyncResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect_lazy(url)
            .map_err(|e| SyncError::InvalidConfig(format!("remote url: {}", e)))?;

        info!(max_connections, "Remote store pool configured");
        Ok(PgRemoteStore { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        PgRemoteStore { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_one_envelope(
        &self,
        entity: EntityType,
        sql: &str,
        binds: &[&str],
    ) -> SyncResult<Option<RecordEnvelope>> {
        let mut query = sqlx::query_as::<_, RemoteRow>(sql);
        for value in binds {
            query = query.bind(*value);
        }
        let row = query.fetch_optional(&self.pool).await.map_err(map_pg_error)?;
        Ok(row.map(|r| r.into_envelope(entity)))
    }
}

#[async_trait]
impl RemoteStore for PgRemoteStore {
    async fn upsert(&self, record: &RecordEnvelope) -> SyncResult<()> {
        let sql = format!(
            r#"
            INSERT INTO {} (id, owner_id, business_key, is_deleted, data, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                owner_id = EXCLUDED.owner_id,
                business_key = EXCLUDED.business_key,
                is_deleted = EXCLUDED.is_deleted,
                data = EXCLUDED.data,
                updated_at = EXCLUDED.updated_at
            "#,
            record.entity.table_name()
        );

        sqlx::query(&sql)
            .bind(&record.id)
            .bind(&record.scope_id)
            .bind(&record.business_key)
            .bind(record.is_deleted)
            .bind(Json(&record.data))
            .bind(record.updated_at)
            .execute(&self.pool)
            .await
            .map_err(map_pg_error)?;

        debug!(entity = %record.entity, id = %record.id, "Remote upsert");
        Ok(())
    }

    async fn delete(&self, entity: EntityType, id: &str) -> SyncResult<()> {
        let sql = format!("DELETE FROM {} WHERE id = $1", entity.table_name());
        let result = sqlx::query(&sql)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_pg_error)?;

        debug!(entity = %entity, id = %id, removed = result.rows_affected(), "Remote delete");
        Ok(())
    }

    async fn get(&self, entity: EntityType, id: &str) -> SyncResult<Option<RecordEnvelope>> {
        let sql = format!("SELECT {} FROM {} WHERE id = $1", ROW_COLUMNS, entity.table_name());
        self.fetch_one_envelope(entity, &sql, &[id]).await
    }

    async fn list(&self, entity: EntityType, filter: &ListFilter) -> SyncResult<Vec<RecordEnvelope>> {
        let sql = format!(
            r#"
            SELECT {} FROM {}
            WHERE ($1::text IS NULL OR owner_id = $1)
              AND ($2 OR NOT is_deleted)
            ORDER BY updated_at ASC, id ASC
            "#,
            ROW_COLUMNS,
            entity.table_name()
        );

        let rows = sqlx::query_as::<_, RemoteRow>(&sql)
            .bind(filter.scope_id.as_deref())
            .bind(filter.include_deleted)
            .fetch_all(&self.pool)
            .await
            .map_err(map_pg_error)?;

        Ok(rows.into_iter().map(|r| r.into_envelope(entity)).collect())
    }

    async fn code_exists(&self, entity: EntityType, scope_id: &str, code: &str) -> SyncResult<bool> {
        let sql = format!(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM {}
                WHERE owner_id = $1 AND business_key = $2 AND NOT is_deleted
            )
            "#,
            entity.table_name()
        );

        sqlx::query_scalar(&sql)
            .bind(scope_id)
            .bind(code)
            .fetch_one(&self.pool)
            .await
            .map_err(map_pg_error)
    }

    async fn increment_invoice_sequence(
        &self,
        store_id: &str,
        date: NaiveDate,
        limit: u32,
    ) -> SyncResult<Option<u32>> {
        if limit == 0 {
            return Ok(None);
        }
        let limit = i32::try_from(limit).unwrap_or(i32::MAX);

        let next: Option<i32> = sqlx::query_scalar(
            r#"
            INSERT INTO invoice_sequences (store_id, sequence_date, sequence, updated_at)
            VALUES ($1, $2, 1, NOW())
            ON CONFLICT (store_id, sequence_date) DO UPDATE SET
                sequence = invoice_sequences.sequence + 1,
                updated_at = NOW()
            WHERE invoice_sequences.sequence < $3
            RETURNING sequence
            "#,
        )
        .bind(store_id)
        .bind(date)
        .bind(limit)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_pg_error)?;

        debug!(store_id = %store_id, %date, ?next, "Remote invoice sequence claimed");
        Ok(next.and_then(|n| u32::try_from(n).ok()))
    }

    async fn find_store(&self, needle: &str) -> SyncResult<Option<RecordEnvelope>> {
        let sql = format!(
            r#"
            SELECT {} FROM stores
            WHERE NOT is_deleted
              AND (
                id = $1
                OR lower(business_key) = lower($1)
                OR lower(data->>'name') = lower($1)
              )
            ORDER BY
                CASE
                    WHEN id = $1 THEN 0
                    WHEN lower(business_key) = lower($1) THEN 1
                    ELSE 2
                END,
                updated_at ASC
            LIMIT 1
            "#,
            ROW_COLUMNS
        );
        self.fetch_one_envelope(EntityType::Store, &sql, &[needle.trim()]).await
    }

    async fn find_employee(&self, employee_id: &str, store_id: &str) -> SyncResult<Option<RecordEnvelope>> {
        let sql = format!(
            "SELECT {} FROM employees WHERE id = $1 AND owner_id = $2 AND NOT is_deleted",
            ROW_COLUMNS
        );
        self.fetch_one_envelope(EntityType::Employee, &sql, &[employee_id, store_id])
            .await
    }

    async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}
