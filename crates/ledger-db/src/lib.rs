//! # ledger-db: Local Record Store
//!
//! The per-device embedded store. Always available; the source of truth
//! while offline, and home of the sync queue and the local counters.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  DataService / SyncQueue / SequenceGenerator (ledger-sync)             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     ledger-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ records       │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ sync_queue    │    │ 001_initial_ │  │   │
//! │  │   │ ChangeListener│    │ sequences     │    │ schema.sql   │  │   │
//! │  │   │               │    │ lookups       │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite file (WAL)                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ledger_db::{Database, DbConfig, ListFilter};
//!
//! let db = Database::new(DbConfig::new("ledger.db")).await?;
//! db.records().put(&product).await?;
//! let live: Vec<Product> = db.records().list(&ListFilter::live()).await?;
//! ```

pub mod error;
pub mod listener;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use error::{DbError, DbResult};
pub use listener::{ChangeEvent, ChangeKind, ChangeListener, NoOpListener};
pub use pool::{Database, DbConfig};

pub use repository::lookup::LookupRepository;
pub use repository::record::{ListFilter, RecordRepository};
pub use repository::sequence::SequenceRepository;
pub use repository::sync_queue::SyncQueueRepository;
