//! # ledger-sync: Data Residency & Synchronization
//!
//! Decides where each billing record lives, keeps the remote store in step
//! with the device, mirrors everything into a spreadsheet workbook, and
//! hands out invoice numbers and employee codes.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          DataService                                    │
//! │                                                                         │
//! │   put / delete ──► Local Store ──► StoreRouter.route()                  │
//! │                                      │                                  │
//! │                   ┌──────────────────┼──────────────────┐               │
//! │                   ▼                  ▼                  ▼               │
//! │              LocalOnly            Mirror              Defer             │
//! │                                 RemoteStore ──err──► SyncQueue          │
//! │                                                         │               │
//! │   get / list ──► AuthoritativeReader                    │ drain()       │
//! │                                                         ▼               │
//! │   SequenceGenerator                                RemoteStore          │
//! │   invoice numbers, employee codes                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Local Store change ──► ExportHandle.schedule() ──(quiet period)──►     │
//! │                         MirrorExporter ──► Mirror.export_all()          │
//! │                                            CSV workbook / fallback dir  │
//! │                                                                         │
//! │  SyncAgent: health checks flip the router online/offline and drain     │
//! │  the queue on reconnect and on a timer                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`service`] - `DataService`, the entry point for records
//! - [`router`] - `StoreRouter`, mode plus online flag
//! - [`remote`] - `RemoteStore` trait, PostgreSQL, detached and in-memory stores
//! - [`queue`] - `SyncQueue` replayer with dead letters
//! - [`mirror`] - Workbook export and per-row import
//! - [`debounce`] - `ExportScheduler`, debounced exports
//! - [`sequence`] - `SequenceGenerator`
//! - [`reader`] - Reads from the authoritative store
//! - [`agent`] - Background health checks and draining
//! - [`config`] - `SyncConfig` (TOML + environment)
//! - [`clock`] - Injectable time source
//! - [`error`] - Sync error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ledger_sync::{DataService, StoreRouter, SyncConfig, SystemClock};
//!
//! let config = SyncConfig::load_or_default(None);
//! let router = StoreRouter::new(config.mode(), false);
//! let service = DataService::new(db, remote, router, Arc::new(SystemClock), config.queue.max_retries);
//!
//! match service.put(&mut invoice).await? {
//!     WriteOutcome::Mirrored => {}
//!     WriteOutcome::Queued { reason } => println!("saved offline: {}", reason),
//!     WriteOutcome::LocalOnly => {}
//! }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod agent;
pub mod clock;
pub mod config;
pub mod debounce;
pub mod error;
pub mod mirror;
pub mod queue;
pub mod reader;
pub mod remote;
pub mod router;
pub mod sequence;
pub mod service;

// =============================================================================
// Re-exports
// =============================================================================

pub use agent::{AgentSettings, SyncAgent, SyncAgentHandle};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{StoreMode, SyncConfig};
pub use debounce::{ExportHandle, ExportScheduler, Exporter, MirrorExporter};
pub use error::{SyncError, SyncResult};
pub use mirror::{ExportOutcome, ExportSummary, ImportReport, ImportRowError, Mirror, SheetRecord, Snapshot};
pub use queue::{DrainReport, SyncQueue};
pub use reader::AuthoritativeReader;
pub use remote::{DetachedRemoteStore, MemoryRemoteStore, PgRemoteStore, RemoteStore};
pub use router::{Route, StoreRouter};
pub use sequence::SequenceGenerator;
pub use service::{DataService, ImportSummary, WriteOutcome};
