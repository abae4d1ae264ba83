//! # Remote Store
//!
//! The shared, cross-device copy of every record.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         RemoteStore (trait)                             │
//! │                                                                         │
//! │   upsert(envelope)          insert or replace by id                     │
//! │   delete(entity, id)        idempotent; absent is success               │
//! │   get / list                envelopes, type-erased                      │
//! │   code_exists               business-key probe within a scope           │
//! │   increment_invoice_sequence   atomic per-(store, day) counter          │
//! │   find_store / find_employee   lookups for invoice numbering            │
//! │   health_check              drives the router's online flag             │
//! │                                                                         │
//! │   ┌──────────────────────┐        ┌──────────────────────────────┐      │
//! │   │ PgRemoteStore        │        │ MemoryRemoteStore            │      │
//! │   │ PostgreSQL, JSONB    │        │ in-process, failure          │      │
//! │   │ bodies               │        │ injection for tests          │      │
//! │   └──────────────────────┘        └──────────────────────────────┘      │
//! │                                                                         │
//! │   DetachedRemoteStore: no remote configured, never reachable            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Implementations classify failures: unreachable → `RemoteUnavailable`,
//! duplicate business key → `ConstraintViolation`, anything else the remote
//! refuses → `RemoteRejected`.

pub mod detached;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::NaiveDate;

use ledger_core::{EntityType, RecordEnvelope};
use ledger_db::ListFilter;

use crate::error::SyncResult;

pub use detached::DetachedRemoteStore;
pub use memory::MemoryRemoteStore;
pub use postgres::PgRemoteStore;

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Inserts or replaces the record with `record.id`.
    async fn upsert(&self, record: &RecordEnvelope) -> SyncResult<()>;

    /// Removes a record. Deleting an absent record succeeds.
    async fn delete(&self, entity: EntityType, id: &str) -> SyncResult<()>;

    async fn get(&self, entity: EntityType, id: &str) -> SyncResult<Option<RecordEnvelope>>;

    async fn list(&self, entity: EntityType, filter: &ListFilter) -> SyncResult<Vec<RecordEnvelope>>;

    /// True if a live record in `scope_id` holds business key `code`.
    async fn code_exists(&self, entity: EntityType, scope_id: &str, code: &str) -> SyncResult<bool>;

    /// Claims the next invoice sequence for `(store_id, date)`.
    ///
    /// `None` once the day's counter has reached `limit`.
    async fn increment_invoice_sequence(
        &self,
        store_id: &str,
        date: NaiveDate,
        limit: u32,
    ) -> SyncResult<Option<u32>>;

    /// Live store by id, code or name (case-insensitive), in that priority.
    async fn find_store(&self, needle: &str) -> SyncResult<Option<RecordEnvelope>>;

    /// Live employee by id, only within `store_id`.
    async fn find_employee(&self, employee_id: &str, store_id: &str) -> SyncResult<Option<RecordEnvelope>>;

    async fn health_check(&self) -> bool;
}
