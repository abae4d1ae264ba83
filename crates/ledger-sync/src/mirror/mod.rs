//! # Spreadsheet Mirror
//!
//! A human-editable snapshot of the authoritative store, regenerated in
//! full on every export. The mirror has no identity of its own: the last
//! full export wins and nothing is merged back automatically.
//!
//! ## Export
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Snapshot (live records)                                                │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  target configured? ──no──► fallback dir ──ok──► Degraded               │
//! │        │yes                       │                                     │
//! │        ▼                          └──err──────► Failed                  │
//! │  write target ──ok──► Written                                           │
//! │        │                                                                │
//! │        └──err──► fallback dir ──ok──► Degraded                          │
//! │                        │                                                │
//! │                        └──err──► Failed                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Import
//! Best effort per row. A malformed row becomes an [`ImportRowError`]
//! carrying its spreadsheet row number and is left out of the result.

pub mod sheets;
pub mod workbook;

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use ledger_core::{Customer, Employee, Invoice, InvoiceItem, Product, Store};

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};

pub use sheets::{sheet_name, HeaderIndex, Sheet, SheetLine, SheetRecord, SheetRow};
pub use workbook::Workbook;

// =============================================================================
// Snapshot
// =============================================================================

/// Live records of every mirrored entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub products: Vec<Product>,
    pub customers: Vec<Customer>,
    pub employees: Vec<Employee>,
    pub invoices: Vec<Invoice>,
    pub invoice_items: Vec<InvoiceItem>,
    pub stores: Vec<Store>,
}

impl Snapshot {
    /// Sheets in workbook order.
    pub fn sheets(&self) -> Vec<Sheet> {
        vec![
            Sheet::from_records(&self.products),
            Sheet::from_records(&self.customers),
            Sheet::from_records(&self.employees),
            Sheet::from_records(&self.invoices),
            Sheet::from_records(&self.invoice_items),
            Sheet::from_records(&self.stores),
        ]
    }

    pub fn record_count(&self) -> usize {
        self.products.len()
            + self.customers.len()
            + self.employees.len()
            + self.invoices.len()
            + self.invoice_items.len()
            + self.stores.len()
    }
}

// =============================================================================
// Outcomes
// =============================================================================

/// What an export wrote.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSummary {
    pub location: PathBuf,
    /// `(sheet name, row count)` in workbook order.
    pub sheets: Vec<(String, usize)>,
    pub exported_at: DateTime<Utc>,
}

impl ExportSummary {
    pub fn rows(&self, sheet: &str) -> Option<usize> {
        self.sheets.iter().find(|(name, _)| name == sheet).map(|(_, n)| *n)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutcome {
    /// Written to the configured workbook.
    Written(ExportSummary),
    /// Written, but only to the local fallback directory.
    Degraded { summary: ExportSummary, reason: String },
    /// Nothing could be written.
    Failed { reason: String },
}

impl ExportOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, ExportOutcome::Written(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ExportOutcome::Failed { .. })
    }

    pub fn summary(&self) -> Option<&ExportSummary> {
        match self {
            ExportOutcome::Written(summary) | ExportOutcome::Degraded { summary, .. } => Some(summary),
            ExportOutcome::Failed { .. } => None,
        }
    }
}

/// A row that could not be imported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRowError {
    /// Spreadsheet row number; the header is row 1.
    pub row: u64,
    pub message: String,
}

impl fmt::Display for ImportRowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {}: {}", self.row, self.message)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportedRow<T> {
    pub row: u64,
    pub record: T,
}

/// Parsed rows plus the rows that were rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportReport<T> {
    pub rows: Vec<ImportedRow<T>>,
    pub errors: Vec<ImportRowError>,
}

impl<T> Default for ImportReport<T> {
    fn default() -> Self {
        ImportReport {
            rows: Vec::new(),
            errors: Vec::new(),
        }
    }
}

impl<T> ImportReport<T> {
    pub fn records(&self) -> impl Iterator<Item = &T> {
        self.rows.iter().map(|r| &r.record)
    }

    pub fn into_records(self) -> Vec<T> {
        self.rows.into_iter().map(|r| r.record).collect()
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Converts sheet lines into records. Blank lines are skipped.
pub fn parse_sheet<T: SheetRecord>(sheet: &Sheet, now: DateTime<Utc>) -> ImportReport<T> {
    let index = HeaderIndex::new(&sheet.headers);
    let mut report = ImportReport::default();

    for line in &sheet.rows {
        let row = SheetRow::new(&index, &line.cells, now);
        if row.is_blank() {
            continue;
        }

        let parsed = T::from_row(&row).and_then(|record| record.validate().map(|_| record));
        match parsed {
            Ok(record) => report.rows.push(ImportedRow {
                row: line.number,
                record,
            }),
            Err(err) => report.errors.push(ImportRowError {
                row: line.number,
                message: err.to_string(),
            }),
        }
    }

    report
}

// =============================================================================
// Mirror
// =============================================================================

#[derive(Debug, Clone)]
pub struct Mirror {
    target: Option<PathBuf>,
    fallback_dir: PathBuf,
}

impl Mirror {
    pub fn new(target: Option<PathBuf>, fallback_dir: impl Into<PathBuf>) -> Self {
        Mirror {
            target,
            fallback_dir: fallback_dir.into(),
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.mirror.path.clone(), config.mirror_fallback_dir())
    }

    pub fn target(&self) -> Option<&Path> {
        self.target.as_deref()
    }

    pub fn fallback_dir(&self) -> &Path {
        &self.fallback_dir
    }

    /// Writes a full snapshot. Never returns an error; see [`ExportOutcome`].
    pub async fn export_all(&self, snapshot: &Snapshot) -> ExportOutcome {
        let sheets = snapshot.sheets();
        let mirror = self.clone();

        match tokio::task::spawn_blocking(move || mirror.write_blocking(&sheets)).await {
            Ok(outcome) => outcome,
            Err(e) => ExportOutcome::Failed {
                reason: format!("export task failed: {}", e),
            },
        }
    }

    fn write_blocking(&self, sheets: &[Sheet]) -> ExportOutcome {
        let reason = match &self.target {
            Some(target) => match write_workbook(target, sheets) {
                Ok(summary) => {
                    info!(location = %target.display(), "Workbook exported");
                    return ExportOutcome::Written(summary);
                }
                Err(e) => {
                    warn!(location = %target.display(), error = %e, "Workbook target unwritable");
                    format!("target {} unwritable: {}", target.display(), e)
                }
            },
            None => "no workbook path configured".to_string(),
        };

        match write_workbook(&self.fallback_dir, sheets) {
            Ok(summary) => {
                warn!(location = %self.fallback_dir.display(), %reason, "Workbook exported to fallback");
                ExportOutcome::Degraded { summary, reason }
            }
            Err(e) => ExportOutcome::Failed {
                reason: format!("{}; fallback {} unwritable: {}", reason, self.fallback_dir.display(), e),
            },
        }
    }

    /// Reads one entity's sheet.
    ///
    /// `source` is either a workbook directory or the sheet's CSV file.
    pub async fn import_entity<T: SheetRecord>(&self, source: &Path) -> SyncResult<ImportReport<T>> {
        let path = if source.is_dir() {
            Workbook::open(source).sheet_path(sheet_name::<T>())
        } else {
            source.to_path_buf()
        };

        let (sheet, unreadable) = tokio::task::spawn_blocking(move || {
            workbook::read_sheet_file(&path, sheet_name::<T>())
        })
        .await
        .map_err(|e| SyncError::Internal(format!("import task failed: {}", e)))??;

        let mut report = parse_sheet::<T>(&sheet, Utc::now());
        report.errors.extend(unreadable);
        report.errors.sort_by_key(|e| e.row);

        info!(
            sheet = %sheet.name,
            imported = report.rows.len(),
            rejected = report.errors.len(),
            "Sheet imported"
        );
        Ok(report)
    }
}

fn write_workbook(root: &Path, sheets: &[Sheet]) -> SyncResult<ExportSummary> {
    Workbook::open(root).write_all(sheets)?;
    Ok(ExportSummary {
        location: root.to_path_buf(),
        sheets: sheets.iter().map(|s| (s.name.clone(), s.row_count())).collect(),
        exported_at: Utc::now(),
    })
}
