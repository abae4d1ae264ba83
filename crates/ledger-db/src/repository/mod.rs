//! # Repository Module
//!
//! Repository implementations for the local store.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  DataService (ledger-sync)                                             │
//! │       │                                                                 │
//! │       │  db.records().put(&invoice)                                    │
//! │       ▼                                                                 │
//! │  RecordRepository          SyncQueueRepository                         │
//! │  ├── put / get / list      ├── enqueue / pending                       │
//! │  ├── soft_delete / delete  ├── remove / record_failure                 │
//! │  └── code_exists           └── dead_letters / requeue                  │
//! │                                                                         │
//! │  SequenceRepository        LookupRepository                            │
//! │  └── increment_daily       ├── find_store                              │
//! │                            └── find_employee                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, SecondsFormat, Utc};

pub mod lookup;
pub mod record;
pub mod sequence;
pub mod sync_queue;

/// Canonical text form of stored timestamps.
///
/// Fixed-width so lexical order in SQLite matches time order.
pub(crate) fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
