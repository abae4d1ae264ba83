//! # ledger-core: Domain Records for the Ledger Sync Layer
//!
//! Pure types and rules shared by the local store, the remote store and the
//! spreadsheet mirror. Nothing in this crate touches a disk or a socket.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 sync-agent / embedding application              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │   ledger-sync: router, remote store, replayer, mirror, codes    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │   ledger-db: SQLite tables, sync queue, local counters          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ ledger-core (THIS CRATE) ★                      │   │
//! │  │   types · identifier · money · validation · error               │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK                              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Records, `RecordEnvelope`, `SyncQueueEntry`
//! - [`identifier`] - Invoice number layout and employee-code candidates
//! - [`money`] - Integer money and tax rates with decimal text form
//! - [`validation`] - Field rules
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use ledger_core::{Record, RecordEnvelope, Store, RecordMeta};
//!
//! let store = Store {
//!     id: "s-1".into(),
//!     user_id: "u-1".into(),
//!     name: "Acme Traders".into(),
//!     code: "ACME".into(),
//!     address: None,
//!     phone: None,
//!     is_active: true,
//!     meta: RecordMeta::default(),
//! };
//! assert!(store.validate().is_ok());
//!
//! let envelope = RecordEnvelope::from_record(&store).unwrap();
//! assert_eq!(envelope.business_key.as_deref(), Some("ACME"));
//! ```

pub mod error;
pub mod identifier;
pub mod money;
pub mod types;
pub mod validation;

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Money, TaxRate};
pub use types::*;
