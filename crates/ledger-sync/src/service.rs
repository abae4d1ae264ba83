//! # Data Service
//!
//! The one entry point the dashboard uses for records. Constructed with its
//! dependencies; nothing here is global.
//!
//! ## Write Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  put(record)                                                            │
//! │    │                                                                    │
//! │    ├─ validate                        ── Err → Validation               │
//! │    ├─ stamp updated_at, clear synced                                    │
//! │    ├─ local upsert                    ── Err → ConstraintViolation /    │
//! │    │                                           StorageFailure           │
//! │    └─ route()                                                           │
//! │         LocalOnly ─────────────────────────────► LocalOnly              │
//! │         Defer ──────────► enqueue ─────────────► Queued                 │
//! │         Mirror                                                          │
//! │           ├─ earlier entry queued? ─► enqueue ─► Queued                 │
//! │           └─ remote write ── ok ──► mark synced ► Mirrored              │
//! │                            ├ unavailable/rejected ► enqueue ► Queued    │
//! │                            └ constraint ──────────► Err                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A record's queued entries, dead letters included, always replay before
//! any direct remote write for the same record, so the remote never sees an
//! older version last.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use ledger_core::{Employee, Invoice, Record, RecordEnvelope, RecordMeta, SyncAction, SyncQueueEntry};
use ledger_db::{Database, ListFilter};

use crate::clock::Clock;
use crate::error::{SyncError, SyncResult};
use crate::mirror::{ImportRowError, Mirror, SheetRecord, Snapshot};
use crate::queue::{DrainReport, SyncQueue};
use crate::reader::AuthoritativeReader;
use crate::remote::RemoteStore;
use crate::router::{Route, StoreRouter};
use crate::sequence::SequenceGenerator;

/// Where a write ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Local store and remote store both hold it.
    Mirrored,
    /// Local store holds it; the remote write waits in the sync queue.
    Queued { reason: String },
    /// Local store is authoritative; nothing else to do.
    LocalOnly,
}

impl WriteOutcome {
    pub fn is_queued(&self) -> bool {
        matches!(self, WriteOutcome::Queued { .. })
    }
}

/// Result of a bulk sheet import.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportSummary {
    pub applied: usize,
    /// Rows queued for the remote rather than mirrored.
    pub queued: usize,
    pub errors: Vec<ImportRowError>,
}

#[derive(Clone)]
pub struct DataService {
    db: Database,
    remote: Arc<dyn RemoteStore>,
    router: StoreRouter,
    clock: Arc<dyn Clock>,
    queue: Arc<SyncQueue>,
    reader: AuthoritativeReader,
    sequences: SequenceGenerator,
}

impl DataService {
    /// `db` should be the handle carrying the export listener, if any.
    pub fn new(
        db: Database,
        remote: Arc<dyn RemoteStore>,
        router: StoreRouter,
        clock: Arc<dyn Clock>,
        max_retries: u32,
    ) -> Self {
        let queue = Arc::new(SyncQueue::new(db.clone(), remote.clone(), router.clone(), max_retries));
        let reader = AuthoritativeReader::new(db.clone(), remote.clone(), router.clone());
        let sequences = SequenceGenerator::new(db.clone(), remote.clone(), router.clone(), clock.clone());

        DataService {
            db,
            remote,
            router,
            clock,
            queue,
            reader,
            sequences,
        }
    }

    pub fn router(&self) -> &StoreRouter {
        &self.router
    }

    pub fn queue(&self) -> &Arc<SyncQueue> {
        &self.queue
    }

    pub fn reader(&self) -> &AuthoritativeReader {
        &self.reader
    }

    pub fn sequences(&self) -> &SequenceGenerator {
        &self.sequences
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Validates, stamps and stores a record, then replicates it.
    ///
    /// The record's metadata is updated in place.
    pub async fn put<T: Record>(&self, record: &mut T) -> SyncResult<WriteOutcome> {
        record.validate()?;

        let action = if self.db.records().exists(T::ENTITY, record.id()).await? {
            SyncAction::Update
        } else {
            SyncAction::Create
        };

        record.meta_mut().touch(self.clock.now());
        self.db.records().put(&*record).await?;
        debug!(entity = %T::ENTITY, id = %record.id(), %action, "Record stored locally");

        let envelope = RecordEnvelope::from_record(&*record)?;
        let outcome = self.replicate(&envelope, action).await?;
        if matches!(outcome, WriteOutcome::Mirrored) {
            record.meta_mut().is_synced = true;
        }
        Ok(outcome)
    }

    /// Soft-deletes locally, deletes remotely.
    pub async fn delete<T: Record>(&self, id: &str) -> SyncResult<WriteOutcome> {
        let records = self.db.records();
        if !records.soft_delete(T::ENTITY, id, self.clock.now()).await? {
            return Err(SyncError::not_found(T::ENTITY.to_string(), id));
        }

        let deleted: T = records
            .get(id)
            .await?
            .ok_or_else(|| SyncError::not_found(T::ENTITY.to_string(), id))?;
        let envelope = RecordEnvelope::from_record(&deleted)?;
        self.replicate(&envelope, SyncAction::Delete).await
    }

    async fn replicate(&self, envelope: &RecordEnvelope, action: SyncAction) -> SyncResult<WriteOutcome> {
        match self.router.route() {
            Route::LocalOnly => Ok(WriteOutcome::LocalOnly),
            Route::Defer => {
                self.queue.enqueue(envelope, action).await?;
                Ok(WriteOutcome::Queued {
                    reason: "remote store offline".into(),
                })
            }
            Route::Mirror => {
                if self.queue.has_queued_for(envelope.entity, &envelope.id).await? {
                    self.queue.enqueue(envelope, action).await?;
                    return Ok(WriteOutcome::Queued {
                        reason: "earlier changes to this record are still queued".into(),
                    });
                }

                let result = match action {
                    SyncAction::Delete => self.remote.delete(envelope.entity, &envelope.id).await,
                    SyncAction::Create | SyncAction::Update => self.remote.upsert(envelope).await,
                };

                match result {
                    Ok(()) => {
                        self.db
                            .records()
                            .mark_synced(envelope.entity, &envelope.id, envelope.updated_at)
                            .await?;
                        Ok(WriteOutcome::Mirrored)
                    }
                    Err(e) if e.should_queue() => {
                        warn!(entity = %envelope.entity, id = %envelope.id, error = %e, "Remote write failed, queued");
                        self.queue.enqueue(envelope, action).await?;
                        Ok(WriteOutcome::Queued { reason: e.to_string() })
                    }
                    Err(e) => Err(e),
                }
            }
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn get<T: Record>(&self, id: &str) -> SyncResult<Option<T>> {
        self.reader.get(id).await
    }

    pub async fn list<T: Record>(&self, filter: &ListFilter) -> SyncResult<Vec<T>> {
        self.reader.list(filter).await
    }

    pub async fn snapshot(&self) -> SyncResult<Snapshot> {
        self.reader.snapshot().await
    }

    // =========================================================================
    // Identifiers
    // =========================================================================

    /// Mints an employee code and stores the new employee.
    pub async fn create_employee(
        &self,
        store: &str,
        name: &str,
        role: Option<String>,
    ) -> SyncResult<(Employee, WriteOutcome)> {
        let store_id = self
            .sequences
            .find_store(store)
            .await?
            .map(|s| s.id)
            .ok_or_else(|| SyncError::not_found("Store", store))?;
        let code = self.sequences.next_employee_code(&store_id, name).await?;

        let mut employee = Employee {
            id: Uuid::new_v4().to_string(),
            store_id,
            name: name.trim().to_string(),
            employee_code: code,
            role,
            phone: None,
            is_active: true,
            meta: RecordMeta::new(self.clock.now()),
        };
        let outcome = self.put(&mut employee).await?;
        info!(employee_id = %employee.id, code = %employee.employee_code, "Employee created");
        Ok((employee, outcome))
    }

    /// Stores an invoice, numbering it first if it has no number yet.
    pub async fn create_invoice(&self, invoice: &mut Invoice) -> SyncResult<WriteOutcome> {
        if invoice.invoice_number.trim().is_empty() {
            let employee_id = invoice
                .employee_id
                .clone()
                .ok_or_else(|| ledger_core::ValidationError::required("employee_id"))?;
            invoice.invoice_number = self
                .sequences
                .next_invoice_number(&invoice.store_id, &employee_id)
                .await?;
        }
        self.put(invoice).await
    }

    // =========================================================================
    // Sync Queue
    // =========================================================================

    pub async fn drain(&self) -> SyncResult<DrainReport> {
        self.queue.drain().await
    }

    pub async fn pending(&self) -> SyncResult<Vec<SyncQueueEntry>> {
        self.queue.pending().await
    }

    pub async fn dead_letters(&self) -> SyncResult<Vec<SyncQueueEntry>> {
        self.queue.dead_letters().await
    }

    // =========================================================================
    // Bulk Import
    // =========================================================================

    /// Imports one sheet through the normal write path.
    ///
    /// Rows that fail to parse, validate or store are reported and skipped.
    pub async fn import_sheet<T: SheetRecord>(&self, mirror: &Mirror, source: &Path) -> SyncResult<ImportSummary> {
        let report = mirror.import_entity::<T>(source).await?;
        let mut summary = ImportSummary {
            errors: report.errors,
            ..ImportSummary::default()
        };

        for row in report.rows {
            let mut record = row.record;
            match self.put(&mut record).await {
                Ok(outcome) => {
                    summary.applied += 1;
                    if outcome.is_queued() {
                        summary.queued += 1;
                    }
                }
                Err(e @ SyncError::StorageFailure(_)) => return Err(e),
                Err(e) => summary.errors.push(ImportRowError {
                    row: row.row,
                    message: e.to_string(),
                }),
            }
        }
        summary.errors.sort_by_key(|e| e.row);

        info!(
            entity = %T::ENTITY,
            applied = summary.applied,
            rejected = summary.errors.len(),
            "Sheet applied to store"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::config::StoreMode;
    use crate::remote::MemoryRemoteStore;
    use chrono::{TimeZone, Utc};
    use ledger_core::{Customer, Setting, Store};
    use ledger_db::DbConfig;

    async fn service(mode: StoreMode, online: bool) -> (DataService, Arc<MemoryRemoteStore>) {
        service_with_cap(mode, online, 10).await
    }

    async fn service_with_cap(mode: StoreMode, online: bool, max_retries: u32) -> (DataService, Arc<MemoryRemoteStore>) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let remote = Arc::new(MemoryRemoteStore::new());
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap()));
        let service = DataService::new(db, remote.clone(), StoreRouter::new(mode, online), clock, max_retries);
        (service, remote)
    }

    fn customer(id: &str) -> Customer {
        Customer {
            id: id.into(),
            user_id: "u-1".into(),
            name: "Jane".into(),
            email: None,
            phone: None,
            address: None,
            tax_id: None,
            meta: RecordMeta::default(),
        }
    }

    fn store(id: &str, code: &str) -> Store {
        Store {
            id: id.into(),
            user_id: "u-1".into(),
            name: format!("Store {}", code),
            code: code.into(),
            address: None,
            phone: None,
            is_active: true,
            meta: RecordMeta::default(),
        }
    }

    #[tokio::test]
    async fn test_local_mode_never_touches_remote() {
        let (service, remote) = service(StoreMode::LocalMirror, true).await;
        let outcome = service.put(&mut customer("c-1")).await.unwrap();

        assert_eq!(outcome, WriteOutcome::LocalOnly);
        assert_eq!(remote.write_count(), 0);
        assert!(service.pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_online_write_is_mirrored_and_marked_synced() {
        let (service, remote) = service(StoreMode::RemoteAuthoritative, true).await;
        let mut c = customer("c-1");
        assert_eq!(service.put(&mut c).await.unwrap(), WriteOutcome::Mirrored);
        assert!(c.meta.is_synced);

        let local: Customer = service.database().records().get("c-1").await.unwrap().unwrap();
        assert!(local.meta.is_synced);
        assert_eq!(remote.records(Customer::ENTITY).len(), 1);
    }

    #[tokio::test]
    async fn test_remote_failure_queues_and_later_writes_follow() {
        let (service, remote) = service(StoreMode::RemoteAuthoritative, true).await;
        remote.set_online(false);

        let mut c = customer("c-1");
        assert!(service.put(&mut c).await.unwrap().is_queued());

        remote.set_online(true);
        c.name = "Jane Updated".into();
        let outcome = service.put(&mut c).await.unwrap();
        assert!(outcome.is_queued());
        assert_eq!(remote.write_count(), 0);

        let pending = service.pending().await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].action, SyncAction::Create);
        assert_eq!(pending[1].action, SyncAction::Update);

        assert_eq!(service.drain().await.unwrap().synced, 2);
        let stored: Customer = remote.records(Customer::ENTITY)[0].clone().into_record().unwrap();
        assert_eq!(stored.name, "Jane Updated");
    }

    #[tokio::test]
    async fn test_duplicate_business_key_fails_immediately() {
        let (service, _) = service(StoreMode::RemoteAuthoritative, false).await;
        service.put(&mut store("s-1", "ACME")).await.unwrap();

        let err = service.put(&mut store("s-2", "ACME")).await.unwrap_err();
        assert!(matches!(err, SyncError::ConstraintViolation { .. }));
        assert_eq!(service.pending().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_remote_duplicate_is_returned_not_queued() {
        let (service, remote) = service(StoreMode::RemoteAuthoritative, true).await;
        service.put(&mut store("s-1", "ACME")).await.unwrap();
        let taken = Employee {
            id: "e-9".into(),
            store_id: "s-1".into(),
            name: "Other Device".into(),
            employee_code: "AC01".into(),
            role: None,
            phone: None,
            is_active: true,
            meta: RecordMeta::default(),
        };
        remote.upsert(&RecordEnvelope::from_record(&taken).unwrap()).await.unwrap();

        let mut local = Employee {
            id: "e-1".into(),
            name: "John Smith".into(),
            ..taken
        };
        let err = service.put(&mut local).await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::ConstraintViolation { ref value, .. } if value == "AC01"
        ));
        assert!(service.pending().await.unwrap().is_empty());
        assert!(!local.meta.is_synced);
    }

    #[tokio::test]
    async fn test_write_waits_behind_dead_letter_for_same_record() {
        let (service, remote) = service_with_cap(StoreMode::RemoteAuthoritative, true, 1).await;
        remote.reject_writes_for("c-1");

        let mut c = customer("c-1");
        c.name = "Old".into();
        assert!(service.put(&mut c).await.unwrap().is_queued());
        assert_eq!(service.drain().await.unwrap().dead_lettered, 1);

        remote.accept_writes_for("c-1");
        c.name = "New".into();
        assert!(service.put(&mut c).await.unwrap().is_queued());
        assert!(remote.records(Customer::ENTITY).is_empty());

        service.queue().requeue_dead().await.unwrap();
        assert_eq!(service.drain().await.unwrap().synced, 2);

        let stored: Customer = remote.records(Customer::ENTITY)[0].clone().into_record().unwrap();
        assert_eq!(stored.name, "New");
        let local: Customer = service.database().records().get("c-1").await.unwrap().unwrap();
        assert!(local.meta.is_synced);
    }

    #[tokio::test]
    async fn test_invalid_record_is_rejected_before_storage() {
        let (service, _) = service(StoreMode::LocalMirror, false).await;
        let mut bad = customer("c-1");
        bad.name = "  ".into();

        assert!(matches!(service.put(&mut bad).await, Err(SyncError::Validation(_))));
        assert!(service.get::<Customer>("c-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_soft_deletes_and_replicates() {
        let (service, remote) = service(StoreMode::RemoteAuthoritative, true).await;
        service.put(&mut customer("c-1")).await.unwrap();

        assert_eq!(service.delete::<Customer>("c-1").await.unwrap(), WriteOutcome::Mirrored);
        assert!(remote.records(Customer::ENTITY).is_empty());

        let local: Customer = service.get("c-1").await.unwrap().unwrap();
        assert!(local.meta.is_deleted);
        assert!(service.list::<Customer>(&ListFilter::live()).await.unwrap().is_empty());

        assert!(matches!(
            service.delete::<Customer>("c-404").await,
            Err(SyncError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_create_employee_mints_code() {
        let (service, _) = service(StoreMode::LocalMirror, false).await;
        service.put(&mut store("s-1", "ACME")).await.unwrap();

        let (first, _) = service.create_employee("ACME", "John Smith", None).await.unwrap();
        let (second, _) = service.create_employee("s-1", "Mary Major", None).await.unwrap();
        assert_eq!(first.employee_code, "AC01");
        assert_eq!(second.employee_code, "AC02");
    }

    #[tokio::test]
    async fn test_settings_are_mirrored_but_not_exported() {
        let (service, remote) = service(StoreMode::RemoteAuthoritative, true).await;
        let mut theme = Setting {
            id: "theme".into(),
            user_id: "u-1".into(),
            value: "dark".into(),
            meta: RecordMeta::default(),
        };

        assert_eq!(service.put(&mut theme).await.unwrap(), WriteOutcome::Mirrored);
        assert_eq!(remote.records(Setting::ENTITY).len(), 1);

        let stored: Setting = service.get("theme").await.unwrap().unwrap();
        assert_eq!(stored.value, "dark");
        assert_eq!(service.snapshot().await.unwrap().record_count(), 0);
    }
}
