//! In-process remote store.
//!
//! Behaves like the PostgreSQL store (upsert by id, unique live business
//! keys per scope, atomic day counters) and can be switched offline or told
//! to reject specific records. A test double.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::NaiveDate;

use ledger_core::{EntityType, RecordEnvelope};
use ledger_db::ListFilter;

use super::RemoteStore;
use crate::error::{SyncError, SyncResult};

#[derive(Debug, Default)]
struct MemoryState {
    online: bool,
    tables: HashMap<EntityType, BTreeMap<String, RecordEnvelope>>,
    sequences: HashMap<(String, NaiveDate), u32>,
    rejected_ids: HashSet<String>,
    writes: u64,
}

#[derive(Debug)]
pub struct MemoryRemoteStore {
    state: Mutex<MemoryState>,
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemoteStore {
    /// An empty, reachable store.
    pub fn new() -> Self {
        MemoryRemoteStore {
            state: Mutex::new(MemoryState {
                online: true,
                ..MemoryState::default()
            }),
        }
    }

    /// An empty store that reports itself unreachable.
    pub fn offline() -> Self {
        let store = Self::new();
        store.set_online(false);
        store
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn reachable(&self) -> SyncResult<MutexGuard<'_, MemoryState>> {
        let state = self.lock();
        if state.online {
            Ok(state)
        } else {
            Err(SyncError::RemoteUnavailable("remote store is offline".into()))
        }
    }

    pub fn set_online(&self, online: bool) {
        self.lock().online = online;
    }

    /// Makes every write touching `id` fail with `RemoteRejected`.
    pub fn reject_writes_for(&self, id: impl Into<String>) {
        self.lock().rejected_ids.insert(id.into());
    }

    pub fn accept_writes_for(&self, id: &str) {
        self.lock().rejected_ids.remove(id);
    }

    /// Successful upserts and deletes so far.
    pub fn write_count(&self) -> u64 {
        self.lock().writes
    }

    /// Stored envelopes of one entity, ordered by id. Ignores the online flag.
    pub fn records(&self, entity: EntityType) -> Vec<RecordEnvelope> {
        self.lock()
            .tables
            .get(&entity)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn sequence(&self, store_id: &str, date: NaiveDate) -> u32 {
        self.lock()
            .sequences
            .get(&(store_id.to_string(), date))
            .copied()
            .unwrap_or(0)
    }
}

fn json_name(record: &RecordEnvelope) -> Option<&str> {
    record.data.get("name").and_then(|v| v.as_str())
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn upsert(&self, record: &RecordEnvelope) -> SyncResult<()> {
        let mut state = self.reachable()?;
        if state.rejected_ids.contains(&record.id) {
            return Err(SyncError::RemoteRejected(format!(
                "write refused for {} {}",
                record.entity, record.id
            )));
        }

        let table = state.tables.entry(record.entity).or_default();
        if let (Some(key), false) = (record.business_key.as_deref(), record.is_deleted) {
            let taken = table.values().any(|other| {
                other.id != record.id
                    && !other.is_deleted
                    && other.scope_id == record.scope_id
                    && other.business_key.as_deref() == Some(key)
            });
            if taken {
                return Err(SyncError::ConstraintViolation {
                    field: "business_key".into(),
                    value: key.to_string(),
                });
            }
        }

        table.insert(record.id.clone(), record.clone());
        state.writes += 1;
        Ok(())
    }

    async fn delete(&self, entity: EntityType, id: &str) -> SyncResult<()> {
        let mut state = self.reachable()?;
        if state.rejected_ids.contains(id) {
            return Err(SyncError::RemoteRejected(format!("delete refused for {} {}", entity, id)));
        }
        if let Some(table) = state.tables.get_mut(&entity) {
            table.remove(id);
        }
        state.writes += 1;
        Ok(())
    }

    async fn get(&self, entity: EntityType, id: &str) -> SyncResult<Option<RecordEnvelope>> {
        let state = self.reachable()?;
        Ok(state.tables.get(&entity).and_then(|t| t.get(id)).cloned())
    }

    async fn list(&self, entity: EntityType, filter: &ListFilter) -> SyncResult<Vec<RecordEnvelope>> {
        let state = self.reachable()?;
        let mut records: Vec<RecordEnvelope> = state
            .tables
            .get(&entity)
            .map(|t| {
                t.values()
                    .filter(|r| filter.include_deleted || !r.is_deleted)
                    .filter(|r| filter.scope_id.as_deref().map_or(true, |s| r.scope_id == s))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        records.sort_by(|a, b| a.updated_at.cmp(&b.updated_at).then_with(|| a.id.cmp(&b.id)));
        Ok(records)
    }

    async fn code_exists(&self, entity: EntityType, scope_id: &str, code: &str) -> SyncResult<bool> {
        let state = self.reachable()?;
        Ok(state.tables.get(&entity).map_or(false, |t| {
            t.values().any(|r| {
                !r.is_deleted && r.scope_id == scope_id && r.business_key.as_deref() == Some(code)
            })
        }))
    }

    async fn increment_invoice_sequence(
        &self,
        store_id: &str,
        date: NaiveDate,
        limit: u32,
    ) -> SyncResult<Option<u32>> {
        let mut state = self.reachable()?;
        let counter = state.sequences.entry((store_id.to_string(), date)).or_insert(0);
        if *counter >= limit {
            return Ok(None);
        }
        *counter += 1;
        Ok(Some(*counter))
    }

    async fn find_store(&self, needle: &str) -> SyncResult<Option<RecordEnvelope>> {
        let state = self.reachable()?;
        let needle = needle.trim();
        let lowered = needle.to_lowercase();

        let Some(stores) = state.tables.get(&EntityType::Store) else {
            return Ok(None);
        };
        let live = || stores.values().filter(|r| !r.is_deleted);

        let found = live()
            .find(|r| r.id == needle)
            .or_else(|| live().find(|r| r.business_key.as_deref().map(str::to_lowercase) == Some(lowered.clone())))
            .or_else(|| live().find(|r| json_name(r).map(str::to_lowercase) == Some(lowered.clone())));
        Ok(found.cloned())
    }

    async fn find_employee(&self, employee_id: &str, store_id: &str) -> SyncResult<Option<RecordEnvelope>> {
        let state = self.reachable()?;
        Ok(state
            .tables
            .get(&EntityType::Employee)
            .and_then(|t| t.get(employee_id))
            .filter(|r| !r.is_deleted && r.scope_id == store_id)
            .cloned())
    }

    async fn health_check(&self) -> bool {
        self.lock().online
    }
}
