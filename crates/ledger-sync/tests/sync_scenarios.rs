//! End-to-end scenarios across the local store, the remote store, the queue
//! and the workbook mirror.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use ledger_core::{
    Customer, Employee, Invoice, InvoiceItem, InvoiceStatus, Money, Product, Record, RecordMeta, Store, SyncAction,
    TaxRate,
};
use ledger_db::{Database, DbConfig, ListFilter};
use ledger_sync::{
    AuthoritativeReader, DataService, DrainReport, ExportOutcome, ExportScheduler, Exporter, FixedClock,
    MemoryRemoteStore, Mirror, MirrorExporter, SheetRecord, StoreMode, StoreRouter, SyncError,
};

// =============================================================================
// Fixtures
// =============================================================================

struct Harness {
    service: DataService,
    remote: Arc<MemoryRemoteStore>,
    clock: Arc<FixedClock>,
}

async fn harness(mode: StoreMode, online: bool, max_retries: u32) -> Harness {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let remote = Arc::new(if online {
        MemoryRemoteStore::new()
    } else {
        MemoryRemoteStore::offline()
    });
    let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 3, 15, 9, 30, 0).unwrap()));
    let router = StoreRouter::new(mode, online);
    let service = DataService::new(db, remote.clone(), router, clock.clone(), max_retries);
    Harness { service, remote, clock }
}

fn store(code: &str) -> Store {
    Store {
        id: format!("store-{}", code.to_lowercase()),
        user_id: "owner-1".into(),
        name: format!("{} Traders", code),
        code: code.into(),
        address: None,
        phone: None,
        is_active: true,
        meta: RecordMeta::default(),
    }
}

fn employee(id: &str, store_id: &str, code: &str) -> Employee {
    Employee {
        id: id.into(),
        store_id: store_id.into(),
        name: "Jane Doe".into(),
        employee_code: code.into(),
        role: Some("cashier".into()),
        phone: None,
        is_active: true,
        meta: RecordMeta::default(),
    }
}

fn invoice(id: &str, store_id: &str, employee_id: &str) -> Invoice {
    Invoice {
        id: id.into(),
        store_id: store_id.into(),
        invoice_number: String::new(),
        invoice_date: Utc.with_ymd_and_hms(2024, 3, 15, 9, 30, 0).unwrap(),
        customer_id: None,
        employee_id: Some(employee_id.into()),
        status: InvoiceStatus::Issued,
        subtotal: Money::from_cents(10_000),
        tax: Money::from_cents(1_800),
        total: Money::from_cents(11_800),
        notes: None,
        meta: RecordMeta::default(),
    }
}

fn product(id: &str, name: &str, price_cents: i64) -> Product {
    Product {
        id: id.into(),
        user_id: "owner-1".into(),
        name: name.into(),
        sku: format!("SKU-{}", id.to_uppercase()),
        description: Some(format!("{} for testing", name)),
        price: Money::from_cents(price_cents),
        tax_rate: TaxRate::from_bps(1800),
        stock_quantity: 12,
        is_active: true,
        meta: RecordMeta::default(),
    }
}

// =============================================================================
// Offline Queue
// =============================================================================

#[tokio::test]
async fn offline_invoices_replay_in_order_once_online() {
    let h = harness(StoreMode::RemoteAuthoritative, false, 10).await;
    let records = h.service.database().records();
    let acme = store("ACME");
    records.put(&acme).await.unwrap();
    records.put(&employee("emp-1", &acme.id, "JD01")).await.unwrap();

    let mut numbers = Vec::new();
    for id in ["inv-a", "inv-b", "inv-c"] {
        let mut inv = invoice(id, &acme.id, "emp-1");
        let outcome = h.service.create_invoice(&mut inv).await.unwrap();
        assert!(outcome.is_queued());
        numbers.push(inv.invoice_number);
    }
    assert_eq!(
        numbers,
        vec![
            "ACME-JD01-20240315093000-001",
            "ACME-JD01-20240315093000-002",
            "ACME-JD01-20240315093000-003",
        ]
    );

    let pending = h.service.pending().await.unwrap();
    assert_eq!(pending.len(), 3);
    assert!(pending.iter().all(|e| e.action == SyncAction::Create));
    assert_eq!(h.remote.write_count(), 0);

    h.remote.set_online(true);
    h.service.router().set_online(true);

    let report = h.service.drain().await.unwrap();
    assert_eq!((report.synced, report.failed), (3, 0));

    let mut replayed: Vec<String> = h.remote.records(Invoice::ENTITY).into_iter().map(|e| e.id).collect();
    replayed.sort();
    assert_eq!(replayed, vec!["inv-a", "inv-b", "inv-c"]);

    for id in ["inv-a", "inv-b", "inv-c"] {
        let local: Invoice = records.get(id).await.unwrap().unwrap();
        assert!(local.meta.is_synced, "{} should be marked synced", id);
    }

    assert_eq!(h.service.drain().await.unwrap(), DrainReport::default());
}

#[tokio::test]
async fn rejected_entry_is_dead_lettered_at_retry_cap() {
    let h = harness(StoreMode::RemoteAuthoritative, true, 2).await;
    h.remote.reject_writes_for("cust-1");

    let mut customer = Customer {
        id: "cust-1".into(),
        user_id: "owner-1".into(),
        name: "Walk-in".into(),
        email: None,
        phone: None,
        address: None,
        tax_id: None,
        meta: RecordMeta::default(),
    };
    assert!(h.service.put(&mut customer).await.unwrap().is_queued());

    let first = h.service.drain().await.unwrap();
    assert_eq!((first.failed, first.dead_lettered), (1, 0));
    assert_eq!(first.errors.len(), 1);

    let second = h.service.drain().await.unwrap();
    assert_eq!((second.failed, second.dead_lettered), (1, 1));

    assert!(h.service.pending().await.unwrap().is_empty());
    let dead = h.service.dead_letters().await.unwrap();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].entity_id, "cust-1");

    h.remote.accept_writes_for("cust-1");
    assert_eq!(h.service.queue().requeue_dead().await.unwrap(), 1);
    assert_eq!(h.service.drain().await.unwrap().synced, 1);
    assert_eq!(h.remote.records(Customer::ENTITY).len(), 1);
}

// =============================================================================
// Identifiers
// =============================================================================

#[tokio::test]
async fn thousandth_invoice_of_the_day_is_refused() {
    let h = harness(StoreMode::LocalMirror, false, 10).await;

    let mut last = String::new();
    for _ in 0..999 {
        last = h.service.sequences().next_invoice_sequence("store-acme").await.unwrap();
    }
    assert_eq!(last, "999");

    let err = h.service.sequences().next_invoice_sequence("store-acme").await.unwrap_err();
    assert!(matches!(err, SyncError::SequenceExhausted { limit: 999, .. }));

    h.clock.advance(chrono::Duration::days(1));
    assert_eq!(h.service.sequences().next_invoice_sequence("store-acme").await.unwrap(), "001");
}

#[tokio::test]
async fn employee_code_falls_back_to_name_prefix() {
    let h = harness(StoreMode::LocalMirror, false, 10).await;
    let records = h.service.database().records();
    let acme = store("ACME");
    records.put(&acme).await.unwrap();
    for n in 1..=99 {
        let code = format!("AC{:02}", n);
        records.put(&employee(&format!("emp-{}", n), &acme.id, &code)).await.unwrap();
    }

    let (created, _) = h.service.create_employee("ACME", "John Smith", None).await.unwrap();
    assert_eq!(created.employee_code, "JOH0");
    assert_eq!(created.store_id, acme.id);
}

// =============================================================================
// Workbook Mirror
// =============================================================================

#[tokio::test]
async fn export_then_import_reconstructs_live_products() {
    let h = harness(StoreMode::LocalMirror, false, 10).await;
    let dir = TempDir::new().unwrap();

    h.service.put(&mut product("p-1", "Widget", 1250)).await.unwrap();
    h.service.put(&mut product("p-2", "Gadget", 899)).await.unwrap();
    h.service.put(&mut product("p-3", "Gizmo", 100)).await.unwrap();
    h.service.delete::<Product>("p-3").await.unwrap();

    let mirror = Mirror::new(Some(dir.path().join("workbook")), dir.path().join("fallback"));
    let outcome = mirror.export_all(&h.service.snapshot().await.unwrap()).await;
    assert!(outcome.is_written());
    assert_eq!(outcome.summary().and_then(|s| s.rows("Products")), Some(2));

    let report = mirror.import_entity::<Product>(&dir.path().join("workbook")).await.unwrap();
    assert!(report.is_clean());

    let live: Vec<Product> = h.service.list(&ListFilter::live()).await.unwrap();
    assert_eq!(report.into_records(), live);
}

async fn assert_sheet_round_trips<T>(h: &Harness, mirror: &Mirror, book: &std::path::Path)
where
    T: SheetRecord + PartialEq + std::fmt::Debug,
{
    let report = mirror.import_entity::<T>(book).await.unwrap();
    assert!(report.is_clean(), "{} sheet: {:?}", T::ENTITY, report.errors);

    let live: Vec<T> = h.service.list(&ListFilter::live()).await.unwrap();
    assert!(!live.is_empty());
    assert_eq!(report.into_records(), live);
}

#[tokio::test]
async fn every_sheet_survives_export_then_import() {
    let h = harness(StoreMode::LocalMirror, false, 10).await;
    let dir = TempDir::new().unwrap();
    let records = h.service.database().records();
    let stamped = |synced: bool| RecordMeta {
        is_synced: synced,
        ..RecordMeta::new(Utc.with_ymd_and_hms(2024, 3, 14, 18, 5, 9).unwrap())
    };

    let acme = Store {
        meta: stamped(true),
        ..store("ACME")
    };
    let closed = Store {
        address: Some("4 Dock Rd, Unit \"B\"".into()),
        phone: Some("+1 555 0100".into()),
        is_active: false,
        meta: stamped(false),
        ..store("BETA")
    };
    records.put(&acme).await.unwrap();
    records.put(&closed).await.unwrap();

    records
        .put(&Customer {
            id: "cust-1".into(),
            user_id: "owner-1".into(),
            name: "Jane Roe".into(),
            email: Some("jane@example.com".into()),
            phone: Some("555-0101".into()),
            address: Some("12 Main St\nSpringfield".into()),
            tax_id: Some("GST-77".into()),
            meta: stamped(true),
        })
        .await
        .unwrap();
    records
        .put(&Customer {
            id: "cust-2".into(),
            user_id: "owner-1".into(),
            name: "Walk-in".into(),
            email: None,
            phone: None,
            address: None,
            tax_id: None,
            meta: stamped(false),
        })
        .await
        .unwrap();

    records
        .put(&Employee {
            meta: stamped(true),
            ..employee("emp-1", &acme.id, "JD01")
        })
        .await
        .unwrap();
    records
        .put(&Employee {
            role: None,
            is_active: false,
            meta: stamped(false),
            ..employee("emp-2", &acme.id, "JD02")
        })
        .await
        .unwrap();

    records
        .put(&Invoice {
            invoice_number: "ACME-JD01-20240315093000-001".into(),
            customer_id: Some("cust-1".into()),
            notes: Some("Paid, thanks".into()),
            status: InvoiceStatus::Paid,
            meta: stamped(true),
            ..invoice("inv-1", &acme.id, "emp-1")
        })
        .await
        .unwrap();

    for (id, quantity, price) in [("li-1", 3, 2_500), ("li-2", 1, 2_500)] {
        records
            .put(&InvoiceItem {
                id: id.into(),
                invoice_id: "inv-1".into(),
                product_id: Some("p-1".into()),
                description: "Widget".into(),
                quantity,
                unit_price: Money::from_cents(price),
                tax_rate: TaxRate::from_bps(825),
                line_total: Money::from_cents(price * quantity),
                meta: stamped(id == "li-1"),
            })
            .await
            .unwrap();
    }

    records
        .put(&Product {
            is_active: false,
            meta: stamped(true),
            ..product("p-1", "Widget", 2_500)
        })
        .await
        .unwrap();

    let book = dir.path().join("workbook");
    let mirror = Mirror::new(Some(book.clone()), dir.path().join("fallback"));
    assert!(mirror.export_all(&h.service.snapshot().await.unwrap()).await.is_written());

    assert_sheet_round_trips::<Product>(&h, &mirror, &book).await;
    assert_sheet_round_trips::<Customer>(&h, &mirror, &book).await;
    assert_sheet_round_trips::<Store>(&h, &mirror, &book).await;
    assert_sheet_round_trips::<Employee>(&h, &mirror, &book).await;
    assert_sheet_round_trips::<Invoice>(&h, &mirror, &book).await;
    assert_sheet_round_trips::<InvoiceItem>(&h, &mirror, &book).await;
}

#[tokio::test]
async fn export_without_target_degrades_to_fallback() {
    let h = harness(StoreMode::LocalMirror, false, 10).await;
    let dir = TempDir::new().unwrap();
    h.service.put(&mut product("p-1", "Widget", 1250)).await.unwrap();

    let mirror = Mirror::new(None, dir.path());
    match mirror.export_all(&h.service.snapshot().await.unwrap()).await {
        ExportOutcome::Degraded { summary, .. } => assert_eq!(summary.rows("Products"), Some(1)),
        other => panic!("expected degraded export, got {:?}", other),
    }
    assert!(dir.path().join("Products.csv").exists());
}

#[tokio::test]
async fn non_numeric_price_rejects_only_that_row() {
    let h = harness(StoreMode::LocalMirror, false, 10).await;
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("Products.csv");
    std::fs::write(
        &path,
        "ID,Product Name,SKU,Price,Owner ID\n\
         p-1,Widget,WID-1,12.50,owner-1\n\
         p-2,Gadget,GAD-1,twelve,owner-1\n",
    )
    .unwrap();

    let mirror = Mirror::new(None, dir.path().join("fallback"));
    let summary = h.service.import_sheet::<Product>(&mirror, &path).await.unwrap();

    assert_eq!(summary.applied, 1);
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors[0].row, 3);
    assert!(summary.errors[0].message.contains("Price"));

    let imported: Product = h.service.get("p-1").await.unwrap().unwrap();
    assert_eq!(imported.price, Money::from_cents(1250));
    assert!(h.service.get::<Product>("p-2").await.unwrap().is_none());
}

// =============================================================================
// Debounced Export
// =============================================================================

struct CountingExporter {
    inner: MirrorExporter,
    runs: AtomicUsize,
}

#[async_trait]
impl Exporter for CountingExporter {
    async fn export(&self) -> ExportOutcome {
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.inner.export().await
    }
}

#[tokio::test]
async fn burst_of_writes_exports_once() {
    let dir = TempDir::new().unwrap();
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let router = StoreRouter::local();
    let remote = Arc::new(MemoryRemoteStore::offline());

    let reader = AuthoritativeReader::new(db.clone(), remote.clone(), router.clone());
    let exporter = Arc::new(CountingExporter {
        inner: MirrorExporter::new(reader, Mirror::new(Some(dir.path().to_path_buf()), dir.path().join("fallback"))),
        runs: AtomicUsize::new(0),
    });
    let handle = ExportScheduler::new(exporter.clone(), Duration::from_millis(200)).start();

    let clock = Arc::new(FixedClock::new(Utc::now()));
    let service = DataService::new(db.with_listener(Arc::new(handle.clone())), remote, router, clock, 10);

    for n in 0..5 {
        service
            .put(&mut product(&format!("p-{}", n), "Widget", 100 + n))
            .await
            .unwrap();
    }

    for _ in 0..100 {
        if handle.last_outcome().is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(exporter.runs.load(Ordering::SeqCst), 1);
    let outcome = handle.last_outcome().unwrap();
    assert_eq!(outcome.summary().and_then(|s| s.rows("Products")), Some(5));

    handle.shutdown().await.unwrap();
}
