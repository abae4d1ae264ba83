//! # Sync Error Types
//!
//! Error types for the data-residency layer.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │    Storage      │  │     Remote      │  │      Identity           │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  StorageFailure │  │  Unavailable ──►│  │  ConstraintViolation    │ │
//! │  │  NotFound       │  │  Rejected    ──►│  │  SequenceExhausted      │ │
//! │  │                 │  │   (queued)      │  │  Validation             │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │     Mirror      │  │  Configuration  │  │      Internal           │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  MirrorFailed   │  │  InvalidConfig  │  │  ChannelError           │ │
//! │  │  Serialization  │  │  ConfigLoad/Save│  │  ShuttingDown           │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Row-level import problems are not errors of this type; they are collected
//! as [`ImportRowError`](crate::mirror::ImportRowError) next to the parsed rows.

use ledger_core::{CoreError, ValidationError};
use ledger_db::DbError;
use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Error type covering every failure the data-residency layer reports.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Storage Errors
    // =========================================================================
    /// The local store itself failed. Cannot be queued, the queue lives there.
    #[error("Local storage failure: {0}")]
    StorageFailure(String),

    /// Record not found in the store that was asked.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    // =========================================================================
    // Remote Errors
    // =========================================================================
    /// Remote store unreachable (network, pool timeout, closed pool).
    #[error("Remote store unavailable: {0}")]
    RemoteUnavailable(String),

    /// Remote store reachable but refused the operation.
    #[error("Remote store rejected operation: {0}")]
    RemoteRejected(String),

    // =========================================================================
    // Identity Errors
    // =========================================================================
    /// Business identifier already taken in its scope.
    #[error("Duplicate {field}: '{value}' already exists")]
    ConstraintViolation { field: String, value: String },

    /// Generator ran out of candidates for a scope.
    #[error("Sequence exhausted for {scope} (limit {limit})")]
    SequenceExhausted { scope: String, limit: u32 },

    /// Record failed field validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    // =========================================================================
    // Mirror Errors
    // =========================================================================
    /// Workbook could not be read or written.
    #[error("Spreadsheet mirror failed: {0}")]
    MirrorFailed(String),

    /// Record body or queue payload could not be (de)serialized.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid sync configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    /// A background task is shutting down.
    #[error("Sync agent is shutting down")]
    ShuttingDown,

    /// Channel send/receive failed.
    #[error("Channel error: {0}")]
    ChannelError(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<DbError> for SyncError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::UniqueViolation { field, value } => SyncError::ConstraintViolation { field, value },
            DbError::NotFound { entity, id } => SyncError::NotFound { entity, id },
            DbError::Serialization(msg) => SyncError::SerializationFailed(msg),
            other => SyncError::StorageFailure(other.to_string()),
        }
    }
}

impl From<CoreError> for SyncError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(v) => SyncError::Validation(v),
            CoreError::SequenceOutOfRange { max, .. } => SyncError::SequenceExhausted {
                scope: "daily invoice sequence".into(),
                limit: max,
            },
            other => SyncError::SerializationFailed(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::SerializationFailed(err.to_string())
    }
}

impl From<csv::Error> for SyncError {
    fn from(err: csv::Error) -> Self {
        SyncError::MirrorFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// Returns true if the same operation may succeed later unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::RemoteUnavailable(_) | SyncError::ChannelError(_))
    }

    /// Returns true if a remote write failing this way should be queued
    /// instead of surfaced.
    ///
    /// Duplicate identifiers never qualify; replaying them cannot succeed.
    pub fn should_queue(&self) -> bool {
        matches!(self, SyncError::RemoteUnavailable(_) | SyncError::RemoteRejected(_))
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_) | SyncError::ConfigLoadFailed(_) | SyncError::ConfigSaveFailed(_)
        )
    }

    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        SyncError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_violation_becomes_constraint_violation() {
        let err: SyncError = DbError::duplicate("business_key", "ACME").into();
        assert!(matches!(
            err,
            SyncError::ConstraintViolation { ref field, ref value } if field == "business_key" && value == "ACME"
        ));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_other_db_errors_are_storage_failures() {
        let err: SyncError = DbError::QueryFailed("disk I/O error".into()).into();
        assert!(matches!(err, SyncError::StorageFailure(_)));
        assert!(!err.should_queue());
    }

    #[test]
    fn test_classification() {
        assert!(SyncError::RemoteUnavailable("timeout".into()).is_retryable());
        assert!(SyncError::RemoteUnavailable("timeout".into()).should_queue());
        assert!(SyncError::RemoteRejected("permission denied".into()).should_queue());
        assert!(!SyncError::RemoteRejected("permission denied".into()).is_retryable());
        assert!(SyncError::InvalidConfig("x".into()).is_config_error());
        assert!(!SyncError::SequenceExhausted { scope: "s".into(), limit: 999 }.should_queue());
        assert!(!SyncError::ConstraintViolation {
            field: "business_key".into(),
            value: "AC01".into()
        }
        .should_queue());
    }
}
