//! Reads from whichever store is authoritative right now.
//!
//! Routed `Mirror`, reads go to the remote store; if that read fails the
//! local copy answers instead and a warning is logged. Every other route
//! reads locally.

use std::sync::Arc;

use tracing::warn;

use ledger_core::{Record, RecordEnvelope};
use ledger_db::{Database, ListFilter};

use crate::error::SyncResult;
use crate::mirror::Snapshot;
use crate::remote::RemoteStore;
use crate::router::{Route, StoreRouter};

#[derive(Clone)]
pub struct AuthoritativeReader {
    db: Database,
    remote: Arc<dyn RemoteStore>,
    router: StoreRouter,
}

fn decode_all<T: Record>(envelopes: Vec<RecordEnvelope>) -> SyncResult<Vec<T>> {
    envelopes
        .into_iter()
        .map(|e| e.into_record::<T>().map_err(Into::into))
        .collect()
}

impl AuthoritativeReader {
    pub fn new(db: Database, remote: Arc<dyn RemoteStore>, router: StoreRouter) -> Self {
        AuthoritativeReader { db, remote, router }
    }

    /// Record by id, soft-deleted records included.
    pub async fn get<T: Record>(&self, id: &str) -> SyncResult<Option<T>> {
        if self.router.route() == Route::Mirror {
            let remote = self
                .remote
                .get(T::ENTITY, id)
                .await
                .and_then(|found| found.map(|e| e.into_record::<T>().map_err(Into::into)).transpose());
            match remote {
                Ok(record) => return Ok(record),
                Err(e) => warn!(entity = %T::ENTITY, id = %id, error = %e, "Remote read failed, using local copy"),
            }
        }
        Ok(self.db.records().get::<T>(id).await?)
    }

    pub async fn list<T: Record>(&self, filter: &ListFilter) -> SyncResult<Vec<T>> {
        if self.router.route() == Route::Mirror {
            let remote = self.remote.list(T::ENTITY, filter).await.and_then(decode_all::<T>);
            match remote {
                Ok(records) => return Ok(records),
                Err(e) => warn!(entity = %T::ENTITY, error = %e, "Remote listing failed, using local copy"),
            }
        }
        Ok(self.db.records().list::<T>(filter).await?)
    }

    /// Live records of every mirrored entity.
    pub async fn snapshot(&self) -> SyncResult<Snapshot> {
        let live = ListFilter::live();
        Ok(Snapshot {
            products: self.list(&live).await?,
            customers: self.list(&live).await?,
            employees: self.list(&live).await?,
            invoices: self.list(&live).await?,
            invoice_items: self.list(&live).await?,
            stores: self.list(&live).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreMode;
    use crate::remote::MemoryRemoteStore;
    use ledger_core::{Customer, RecordMeta};
    use ledger_db::DbConfig;

    fn customer(id: &str, name: &str) -> Customer {
        Customer {
            id: id.into(),
            user_id: "u-1".into(),
            name: name.into(),
            email: None,
            phone: None,
            address: None,
            tax_id: None,
            meta: RecordMeta::default(),
        }
    }

    async fn setup(mode: StoreMode) -> (Database, Arc<MemoryRemoteStore>, AuthoritativeReader) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let remote = Arc::new(MemoryRemoteStore::new());
        let reader = AuthoritativeReader::new(db.clone(), remote.clone(), StoreRouter::new(mode, true));
        (db, remote, reader)
    }

    #[tokio::test]
    async fn test_remote_is_read_when_authoritative() {
        let (db, remote, reader) = setup(StoreMode::RemoteAuthoritative).await;
        db.records().put(&customer("c-1", "Local Name")).await.unwrap();
        remote
            .upsert(&RecordEnvelope::from_record(&customer("c-1", "Remote Name")).unwrap())
            .await
            .unwrap();

        let found: Customer = reader.get("c-1").await.unwrap().unwrap();
        assert_eq!(found.name, "Remote Name");
    }

    #[tokio::test]
    async fn test_falls_back_to_local_when_remote_fails() {
        let (db, remote, reader) = setup(StoreMode::RemoteAuthoritative).await;
        db.records().put(&customer("c-1", "Local Name")).await.unwrap();
        remote.set_online(false);

        let listed: Vec<Customer> = reader.list(&ListFilter::live()).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "Local Name");
    }

    #[tokio::test]
    async fn test_local_mode_ignores_remote() {
        let (db, remote, reader) = setup(StoreMode::LocalMirror).await;
        db.records().put(&customer("c-1", "Local Name")).await.unwrap();
        remote
            .upsert(&RecordEnvelope::from_record(&customer("c-2", "Remote Only")).unwrap())
            .await
            .unwrap();

        let snapshot = reader.snapshot().await.unwrap();
        assert_eq!(snapshot.customers.len(), 1);
        assert_eq!(snapshot.record_count(), 1);
    }
}
