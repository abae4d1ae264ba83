//! # Sequence Generator
//!
//! Human-facing identifiers scoped to a store.
//!
//! ## Invoice Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  route() == Mirror  → remote invoice_sequences (shared by devices)      │
//! │                       local counter raised to the claimed value         │
//! │  otherwise          → local invoice_sequences                           │
//! │                       (also when the remote call fails)                 │
//! │                                                                         │
//! │  key (store, local date) → 1, 2, 3 ... 999 → SequenceExhausted          │
//! │  midnight: new date, new key, back to 1                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Employee Code
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. store code prefix + 01..99     ACME → AC01, AC02, ... AC99          │
//! │  2. name prefix + 0..9             John Smith → JOH0 ... JOH9           │
//! │  3. random, 32 attempts            Q7ZK, 4MPA, ...                      │
//! │                                                                         │
//! │  each candidate: taken locally? taken remotely (when routed Mirror)?    │
//! │  first free candidate wins; none free → SequenceExhausted               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Probing is not a reservation. Two devices can pick the same code; the
//! local unique index stops a duplicate on one device, not across devices.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, warn};

use ledger_core::identifier::{
    format_invoice_number, format_sequence, name_code_candidates, random_code, store_code_candidates,
    MAX_DAILY_INVOICE_SEQUENCE,
};
use ledger_core::{Employee, EntityType, Store};
use ledger_db::Database;

use crate::clock::Clock;
use crate::error::{SyncError, SyncResult};
use crate::remote::RemoteStore;
use crate::router::{Route, StoreRouter};

/// Random codes tried after the deterministic candidates run out.
pub const RANDOM_CODE_ATTEMPTS: usize = 32;

#[derive(Clone)]
pub struct SequenceGenerator {
    db: Database,
    remote: Arc<dyn RemoteStore>,
    router: StoreRouter,
    clock: Arc<dyn Clock>,
}

impl SequenceGenerator {
    pub fn new(db: Database, remote: Arc<dyn RemoteStore>, router: StoreRouter, clock: Arc<dyn Clock>) -> Self {
        SequenceGenerator {
            db,
            remote,
            router,
            clock,
        }
    }

    // =========================================================================
    // Invoices
    // =========================================================================

    /// Next zero-padded daily sequence for a store, e.g. `"007"`.
    pub async fn next_invoice_sequence(&self, store_id: &str) -> SyncResult<String> {
        let n = self.claim_sequence(store_id, self.clock.today()).await?;
        Ok(format_sequence(n)?)
    }

    /// Full invoice number `STORE4-EMP4-YYYYMMDDHHmmss-SEQ3`.
    ///
    /// `store` may be the store's id, code or name.
    pub async fn next_invoice_number(&self, store: &str, employee_id: &str) -> SyncResult<String> {
        let store = self
            .find_store(store)
            .await?
            .ok_or_else(|| SyncError::not_found("Store", store))?;
        let employee = self
            .find_employee(employee_id, &store.id)
            .await?
            .ok_or_else(|| SyncError::not_found("Employee", employee_id))?;

        let issued_at = self.clock.local_now();
        let n = self.claim_sequence(&store.id, issued_at.date()).await?;
        Ok(format_invoice_number(&store.code, &employee.employee_code, issued_at, n)?)
    }

    async fn claim_sequence(&self, store_id: &str, date: NaiveDate) -> SyncResult<u32> {
        let limit = MAX_DAILY_INVOICE_SEQUENCE;

        let remote_claim = if self.router.route() == Route::Mirror {
            match self.remote.increment_invoice_sequence(store_id, date, limit).await {
                Ok(claimed) => Some(claimed),
                Err(e) => {
                    warn!(store_id = %store_id, error = %e, "Remote sequence unavailable, using local counter");
                    None
                }
            }
        } else {
            None
        };

        let claimed = match remote_claim {
            Some(Some(n)) => {
                self.db.sequences().raise_to(store_id, date, n).await?;
                Some(n)
            }
            Some(None) => None,
            None => self.db.sequences().increment_daily(store_id, date, limit).await?,
        };

        claimed.ok_or_else(|| SyncError::SequenceExhausted {
            scope: format!("store {} on {}", store_id, date),
            limit,
        })
    }

    // =========================================================================
    // Employee Codes
    // =========================================================================

    /// First free employee code for a store.
    pub async fn next_employee_code(&self, store: &str, name: &str) -> SyncResult<String> {
        let store = self
            .find_store(store)
            .await?
            .ok_or_else(|| SyncError::not_found("Store", store))?;

        for candidate in store_code_candidates(&store.code).chain(name_code_candidates(name)) {
            if !self.code_taken(&store.id, &candidate).await? {
                debug!(store_id = %store.id, code = %candidate, "Employee code chosen");
                return Ok(candidate);
            }
        }

        for _ in 0..RANDOM_CODE_ATTEMPTS {
            let candidate = random_code(&mut rand::thread_rng());
            if !self.code_taken(&store.id, &candidate).await? {
                debug!(store_id = %store.id, code = %candidate, "Random employee code chosen");
                return Ok(candidate);
            }
        }

        Err(SyncError::SequenceExhausted {
            scope: format!("employee codes for store {}", store.id),
            limit: 99 + 10 + RANDOM_CODE_ATTEMPTS as u32,
        })
    }

    async fn code_taken(&self, store_id: &str, code: &str) -> SyncResult<bool> {
        if self.db.records().code_exists(EntityType::Employee, store_id, code).await? {
            return Ok(true);
        }
        if self.router.route() != Route::Mirror {
            return Ok(false);
        }
        match self.remote.code_exists(EntityType::Employee, store_id, code).await {
            Ok(taken) => Ok(taken),
            Err(e) => {
                warn!(store_id = %store_id, error = %e, "Remote code probe failed, local answer only");
                Ok(false)
            }
        }
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Store by id, code or name; remote first when routed `Mirror`.
    pub async fn find_store(&self, needle: &str) -> SyncResult<Option<Store>> {
        if self.router.route() == Route::Mirror {
            match self.remote.find_store(needle).await {
                Ok(Some(found)) => return Ok(Some(found.into_record()?)),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Remote store lookup failed, using local copy"),
            }
        }
        Ok(self.db.lookups().find_store(needle).await?)
    }

    /// Employee by id within a store; remote first when routed `Mirror`.
    pub async fn find_employee(&self, employee_id: &str, store_id: &str) -> SyncResult<Option<Employee>> {
        if self.router.route() == Route::Mirror {
            match self.remote.find_employee(employee_id, store_id).await {
                Ok(Some(found)) => return Ok(Some(found.into_record()?)),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Remote employee lookup failed, using local copy"),
            }
        }
        Ok(self.db.lookups().find_employee(employee_id, store_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::config::StoreMode;
    use crate::remote::MemoryRemoteStore;
    use chrono::{Duration, TimeZone, Utc};
    use ledger_core::{RecordEnvelope, RecordMeta};
    use ledger_db::DbConfig;

    struct Fixture {
        db: Database,
        remote: Arc<MemoryRemoteStore>,
        router: StoreRouter,
        clock: Arc<FixedClock>,
        generator: SequenceGenerator,
    }

    async fn fixture(mode: StoreMode) -> Fixture {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let remote = Arc::new(MemoryRemoteStore::new());
        let router = StoreRouter::new(mode, true);
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 3, 15, 14, 30, 5).unwrap()));
        let generator = SequenceGenerator::new(db.clone(), remote.clone(), router.clone(), clock.clone());
        Fixture {
            db,
            remote,
            router,
            clock,
            generator,
        }
    }

    fn store() -> Store {
        Store {
            id: "s-1".into(),
            user_id: "u-1".into(),
            name: "Acme Traders".into(),
            code: "ACME".into(),
            address: None,
            phone: None,
            is_active: true,
            meta: RecordMeta::default(),
        }
    }

    fn employee(id: &str, code: &str) -> Employee {
        Employee {
            id: id.into(),
            store_id: "s-1".into(),
            name: "Jane Doe".into(),
            employee_code: code.into(),
            role: None,
            phone: None,
            is_active: true,
            meta: RecordMeta::default(),
        }
    }

    #[tokio::test]
    async fn test_local_sequence_counts_up_and_resets_daily() {
        let f = fixture(StoreMode::LocalMirror).await;
        assert_eq!(f.generator.next_invoice_sequence("s-1").await.unwrap(), "001");
        assert_eq!(f.generator.next_invoice_sequence("s-1").await.unwrap(), "002");

        f.clock.advance(Duration::days(1));
        assert_eq!(f.generator.next_invoice_sequence("s-1").await.unwrap(), "001");
    }

    #[tokio::test]
    async fn test_remote_counter_used_when_authoritative() {
        let f = fixture(StoreMode::RemoteAuthoritative).await;
        f.generator.next_invoice_sequence("s-1").await.unwrap();
        f.generator.next_invoice_sequence("s-1").await.unwrap();

        assert_eq!(f.remote.sequence("s-1", f.clock.today()), 2);
        assert_eq!(f.db.sequences().current("s-1", f.clock.today()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_local_fallback_continues_after_remote_claims() {
        let f = fixture(StoreMode::RemoteAuthoritative).await;
        assert_eq!(f.generator.next_invoice_sequence("s-1").await.unwrap(), "001");
        assert_eq!(f.generator.next_invoice_sequence("s-1").await.unwrap(), "002");

        f.remote.set_online(false);
        assert_eq!(f.generator.next_invoice_sequence("s-1").await.unwrap(), "003");
        assert_eq!(f.remote.sequence("s-1", f.clock.today()), 2);
    }

    #[tokio::test]
    async fn test_offline_uses_local_counter() {
        let f = fixture(StoreMode::RemoteAuthoritative).await;
        f.router.set_online(false);
        assert_eq!(f.generator.next_invoice_sequence("s-1").await.unwrap(), "001");
        assert_eq!(f.remote.sequence("s-1", f.clock.today()), 0);
    }

    #[tokio::test]
    async fn test_invoice_number_format() {
        let f = fixture(StoreMode::LocalMirror).await;
        f.db.records().put(&store()).await.unwrap();
        f.db.records().put(&employee("e-1", "JD1")).await.unwrap();

        let number = f.generator.next_invoice_number("acme", "e-1").await.unwrap();
        assert_eq!(number, "ACME-JD1X-20240315143005-001");
    }

    #[tokio::test]
    async fn test_invoice_number_requires_employee_of_store() {
        let f = fixture(StoreMode::LocalMirror).await;
        f.db.records().put(&store()).await.unwrap();

        let err = f.generator.next_invoice_number("s-1", "e-404").await.unwrap_err();
        assert!(matches!(err, SyncError::NotFound { ref entity, .. } if entity == "Employee"));
    }

    #[tokio::test]
    async fn test_employee_code_takes_first_free_store_candidate() {
        let f = fixture(StoreMode::LocalMirror).await;
        f.db.records().put(&store()).await.unwrap();
        f.db.records().put(&employee("e-1", "AC01")).await.unwrap();

        assert_eq!(f.generator.next_employee_code("s-1", "John").await.unwrap(), "AC02");
    }

    #[tokio::test]
    async fn test_employee_code_checks_remote_when_authoritative() {
        let f = fixture(StoreMode::RemoteAuthoritative).await;
        f.db.records().put(&store()).await.unwrap();
        f.remote
            .upsert(&RecordEnvelope::from_record(&employee("e-9", "AC01")).unwrap())
            .await
            .unwrap();

        assert_eq!(f.generator.next_employee_code("s-1", "John").await.unwrap(), "AC02");
    }
}
