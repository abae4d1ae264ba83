//! # Record Repository
//!
//! One repository for every record table. Tables share a shape (see
//! `migrations/sqlite/001_initial_schema.sql`), so the table is chosen by
//! the record type's `ENTITY` and the typed body travels as JSON.
//!
//! ## Write Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  put(&record)                                                           │
//! │     │                                                                   │
//! │     ├── serialize body ──► data                                         │
//! │     ├── id / scope / business key / flags ──► indexed columns           │
//! │     ▼                                                                   │
//! │  INSERT ... ON CONFLICT(id) DO UPDATE   (upsert by id)                  │
//! │     │                                                                   │
//! │     ├── live business key taken in scope ──► DbError::UniqueViolation   │
//! │     ▼                                                                   │
//! │  listener.on_change(Put)  ──► debounced mirror export                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::debug;

use ledger_core::{EntityType, Record};

use super::timestamp;
use crate::error::DbResult;
use crate::listener::{ChangeEvent, ChangeKind, ChangeListener};

// =============================================================================
// List Filter
// =============================================================================

/// Narrows a listing.
///
/// The default excludes soft-deleted records and spans every scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    /// Only records owned by this scope.
    pub scope_id: Option<String>,
    /// Include soft-deleted records.
    pub include_deleted: bool,
}

impl ListFilter {
    /// Live records in every scope.
    pub fn live() -> Self {
        ListFilter::default()
    }

    /// Every record, deleted or not.
    pub fn all() -> Self {
        ListFilter {
            scope_id: None,
            include_deleted: true,
        }
    }

    /// Restricts to one scope.
    pub fn scope(mut self, scope_id: impl Into<String>) -> Self {
        self.scope_id = Some(scope_id.into());
        self
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Generic CRUD over the record tables.
#[derive(Clone)]
pub struct RecordRepository {
    pool: SqlitePool,
    listener: Arc<dyn ChangeListener>,
}

impl RecordRepository {
    pub fn new(pool: SqlitePool, listener: Arc<dyn ChangeListener>) -> Self {
        RecordRepository { pool, listener }
    }

    fn notify(&self, entity: EntityType, id: &str, kind: ChangeKind) {
        self.listener.on_change(&ChangeEvent::new(entity, id, kind));
    }

    /// Inserts or replaces a record by id.
    ///
    /// ## Errors
    /// - `DbError::UniqueViolation` if another live record in the same scope
    ///   already holds this record's business key
    pub async fn put<T: Record>(&self, record: &T) -> DbResult<()> {
        let entity = T::ENTITY;
        let meta = record.meta();
        let data = serde_json::to_string(record)?;

        debug!(entity = %entity, id = %record.id(), "Putting record");

        let sql = format!(
            r#"
            INSERT INTO {table} (
                id, scope_id, business_key, is_deleted, is_synced,
                created_at, updated_at, data
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(id) DO UPDATE SET
                scope_id = excluded.scope_id,
                business_key = excluded.business_key,
                is_deleted = excluded.is_deleted,
                is_synced = excluded.is_synced,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at,
                data = excluded.data
            "#,
            table = entity.table_name()
        );

        sqlx::query(&sql)
            .bind(record.id())
            .bind(record.scope_id())
            .bind(record.business_key())
            .bind(meta.is_deleted)
            .bind(meta.is_synced)
            .bind(timestamp(meta.created_at))
            .bind(timestamp(meta.updated_at))
            .bind(data)
            .execute(&self.pool)
            .await
            .map_err(|e| crate::DbError::from(e).with_duplicate_value(record.business_key()))?;

        self.notify(entity, record.id(), ChangeKind::Put);
        Ok(())
    }

    /// Fetches a record by id, including soft-deleted ones.
    pub async fn get<T: Record>(&self, id: &str) -> DbResult<Option<T>> {
        let sql = format!("SELECT data FROM {} WHERE id = ?1", T::ENTITY.table_name());

        let data: Option<String> = sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        data.map(|d| serde_json::from_str(&d))
            .transpose()
            .map_err(Into::into)
    }

    /// Lists records in creation order.
    pub async fn list<T: Record>(&self, filter: &ListFilter) -> DbResult<Vec<T>> {
        let sql = format!(
            r#"
            SELECT data FROM {}
            WHERE (?1 IS NULL OR scope_id = ?1)
              AND (?2 OR is_deleted = 0)
            ORDER BY created_at ASC, id ASC
            "#,
            T::ENTITY.table_name()
        );

        let rows: Vec<String> = sqlx::query_scalar(&sql)
            .bind(filter.scope_id.as_deref())
            .bind(filter.include_deleted)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|d| serde_json::from_str(d).map_err(Into::into))
            .collect()
    }

    /// Lists records matching an in-process predicate.
    pub async fn list_where<T, F>(&self, filter: &ListFilter, predicate: F) -> DbResult<Vec<T>>
    where
        T: Record,
        F: Fn(&T) -> bool,
    {
        let all = self.list::<T>(filter).await?;
        Ok(all.into_iter().filter(|r| predicate(r)).collect())
    }

    /// Sets the soft-delete flag. Returns false if no such record.
    ///
    /// The record's business key is released for reuse in its scope.
    pub async fn soft_delete(&self, entity: EntityType, id: &str, at: DateTime<Utc>) -> DbResult<bool> {
        let at = timestamp(at);
        let sql = format!(
            r#"
            UPDATE {} SET
                is_deleted = 1,
                is_synced = 0,
                updated_at = ?2,
                data = json_set(data,
                    '$.is_deleted', json('true'),
                    '$.is_synced', json('false'),
                    '$.updated_at', ?2)
            WHERE id = ?1
            "#,
            entity.table_name()
        );

        let result = sqlx::query(&sql)
            .bind(id)
            .bind(&at)
            .execute(&self.pool)
            .await?;

        let found = result.rows_affected() > 0;
        if found {
            debug!(entity = %entity, id = %id, "Soft-deleted record");
            self.notify(entity, id, ChangeKind::SoftDelete);
        }
        Ok(found)
    }

    /// Removes a row. Returns false if no such record.
    pub async fn delete(&self, entity: EntityType, id: &str) -> DbResult<bool> {
        let sql = format!("DELETE FROM {} WHERE id = ?1", entity.table_name());

        let result = sqlx::query(&sql).bind(id).execute(&self.pool).await?;

        let found = result.rows_affected() > 0;
        if found {
            self.notify(entity, id, ChangeKind::Delete);
        }
        Ok(found)
    }

    /// Sets the synced flag, provided the stored version is still the one
    /// the remote store acknowledged.
    ///
    /// Returns false when the record changed (or vanished) in the meantime;
    /// the newer version keeps `is_synced = false`.
    pub async fn mark_synced(
        &self,
        entity: EntityType,
        id: &str,
        version: DateTime<Utc>,
    ) -> DbResult<bool> {
        let sql = format!(
            r#"
            UPDATE {} SET
                is_synced = 1,
                data = json_set(data, '$.is_synced', json('true'))
            WHERE id = ?1 AND updated_at = ?2
            "#,
            entity.table_name()
        );

        let result = sqlx::query(&sql)
            .bind(id)
            .bind(timestamp(version))
            .execute(&self.pool)
            .await?;

        let updated = result.rows_affected() > 0;
        if updated {
            self.notify(entity, id, ChangeKind::Synced);
        }
        Ok(updated)
    }

    /// True if a record with this id exists (deleted or not).
    pub async fn exists(&self, entity: EntityType, id: &str) -> DbResult<bool> {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1)",
            entity.table_name()
        );
        let found: bool = sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(found)
    }

    /// True if a live record in `scope_id` holds business key `code`.
    pub async fn code_exists(&self, entity: EntityType, scope_id: &str, code: &str) -> DbResult<bool> {
        let sql = format!(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM {}
                WHERE scope_id = ?1 AND business_key = ?2 AND is_deleted = 0
            )
            "#,
            entity.table_name()
        );
        let found: bool = sqlx::query_scalar(&sql)
            .bind(scope_id)
            .bind(code)
            .fetch_one(&self.pool)
            .await?;
        Ok(found)
    }

    /// Counts records in a table.
    pub async fn count(&self, entity: EntityType, include_deleted: bool) -> DbResult<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE (?1 OR is_deleted = 0)",
            entity.table_name()
        );
        let count: i64 = sqlx::query_scalar(&sql)
            .bind(include_deleted)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
