//! # Local Store Errors
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module): classified, value attached where known         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SyncError (ledger-sync)                                               │
//! │   UniqueViolation → ConstraintViolation                                │
//! │   NotFound → NotFound, the rest → StorageFailure                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Two live records in one scope share a business key (SKU, store
    /// code, employee code, invoice number).
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// The store file could not be opened or the pool is closed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// A stored body or queue row could not be decoded.
    #[error("Corrupt row: {0}")]
    Serialization(String),

    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// SQLite names only the columns of a unique violation; repositories
    /// attach the value they were writing.
    pub(crate) fn with_duplicate_value(self, value: Option<&str>) -> Self {
        match (self, value) {
            (DbError::UniqueViolation { field, .. }, Some(v)) => DbError::duplicate(field, v),
            (other, _) => other,
        }
    }
}

/// Columns named in `UNIQUE constraint failed: t.a, t.b`.
fn unique_columns(message: &str) -> String {
    message
        .split_once("constraint failed: ")
        .map(|(_, columns)| columns.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// ```text
/// RowNotFound             → NotFound
/// unique violation        → UniqueViolation (columns, value unknown)
/// other database error    → QueryFailed
/// PoolTimedOut            → PoolExhausted
/// PoolClosed              → ConnectionFailed
/// ColumnDecode / Decode   → Serialization
/// anything else           → Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                DbError::duplicate(unique_columns(db_err.message()), "unknown")
            }
            sqlx::Error::Database(db_err) => DbError::QueryFailed(db_err.message().to_string()),
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("local store is closed".to_string()),
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => DbError::Serialization(err.to_string()),
            other => DbError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Serialization(err.to_string())
    }
}

impl From<ledger_core::CoreError> for DbError {
    fn from(err: ledger_core::CoreError) -> Self {
        DbError::Serialization(err.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_value_is_attached() {
        let err = DbError::duplicate("employees.scope_id, employees.business_key", "unknown")
            .with_duplicate_value(Some("AC01"));
        assert_eq!(
            err.to_string(),
            "Duplicate employees.scope_id, employees.business_key: 'AC01' already exists"
        );
    }

    #[test]
    fn test_unique_columns_parsed_from_message() {
        assert_eq!(
            unique_columns("UNIQUE constraint failed: stores.scope_id, stores.business_key"),
            "stores.scope_id, stores.business_key"
        );
        assert_eq!(unique_columns("something else"), "unknown");
    }

    #[test]
    fn test_other_errors_pass_through() {
        let err = DbError::PoolExhausted.with_duplicate_value(Some("x"));
        assert!(matches!(err, DbError::PoolExhausted));
    }
}
