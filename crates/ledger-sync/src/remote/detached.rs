//! Remote store for a device with no remote configured.
//!
//! Never reachable: the health check fails, so the router stays offline and
//! writes are queued until a remote URL is configured and the agent restarts.

use async_trait::async_trait;
use chrono::NaiveDate;

use ledger_core::{EntityType, RecordEnvelope};
use ledger_db::ListFilter;

use super::RemoteStore;
use crate::error::{SyncError, SyncResult};

#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedRemoteStore;

fn not_configured<T>() -> SyncResult<T> {
    Err(SyncError::RemoteUnavailable("no remote store configured".into()))
}

#[async_trait]
impl RemoteStore for DetachedRemoteStore {
    async fn upsert(&self, _record: &RecordEnvelope) -> SyncResult<()> {
        not_configured()
    }

    async fn delete(&self, _entity: EntityType, _id: &str) -> SyncResult<()> {
        not_configured()
    }

    async fn get(&self, _entity: EntityType, _id: &str) -> SyncResult<Option<RecordEnvelope>> {
        not_configured()
    }

    async fn list(&self, _entity: EntityType, _filter: &ListFilter) -> SyncResult<Vec<RecordEnvelope>> {
        not_configured()
    }

    async fn code_exists(&self, _entity: EntityType, _scope_id: &str, _code: &str) -> SyncResult<bool> {
        not_configured()
    }

    async fn increment_invoice_sequence(
        &self,
        _store_id: &str,
        _date: NaiveDate,
        _limit: u32,
    ) -> SyncResult<Option<u32>> {
        not_configured()
    }

    async fn find_store(&self, _needle: &str) -> SyncResult<Option<RecordEnvelope>> {
        not_configured()
    }

    async fn find_employee(&self, _employee_id: &str, _store_id: &str) -> SyncResult<Option<RecordEnvelope>> {
        not_configured()
    }

    async fn health_check(&self) -> bool {
        false
    }
}
