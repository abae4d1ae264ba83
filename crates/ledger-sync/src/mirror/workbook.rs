//! On-disk workbook: a directory with one UTF-8 CSV file per sheet.
//!
//! ```text
//! workbook/
//! ├── Products.csv
//! ├── Customers.csv
//! ├── Employees.csv
//! ├── Invoices.csv
//! ├── InvoiceItems.csv
//! └── Stores.csv
//! ```
//!
//! Each sheet is written to a hidden temporary file in the same directory
//! and renamed over the old one, so a reader never sees half a sheet.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::sheets::{Sheet, SheetLine};
use super::ImportRowError;
use crate::error::{SyncError, SyncResult};

fn io_error(path: &Path, err: std::io::Error) -> SyncError {
    SyncError::MirrorFailed(format!("{}: {}", path.display(), err))
}

#[derive(Debug, Clone)]
pub struct Workbook {
    root: PathBuf,
}

impl Workbook {
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Workbook { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn sheet_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.csv", name))
    }

    /// Replaces one sheet file.
    pub fn write_sheet(&self, sheet: &Sheet) -> SyncResult<PathBuf> {
        fs::create_dir_all(&self.root).map_err(|e| io_error(&self.root, e))?;

        let path = self.sheet_path(&sheet.name);
        let tmp = self.root.join(format!(".{}.csv.tmp", sheet.name));

        let mut writer = csv::Writer::from_path(&tmp)?;
        writer.write_record(&sheet.headers)?;
        for line in &sheet.rows {
            writer.write_record(&line.cells)?;
        }
        writer.flush().map_err(|e| io_error(&tmp, e))?;
        drop(writer);

        fs::rename(&tmp, &path).map_err(|e| io_error(&path, e))?;
        debug!(path = %path.display(), rows = sheet.row_count(), "Sheet written");
        Ok(path)
    }

    /// Writes every sheet; stops at the first failure.
    pub fn write_all(&self, sheets: &[Sheet]) -> SyncResult<()> {
        for sheet in sheets {
            self.write_sheet(sheet)?;
        }
        Ok(())
    }

    pub fn read_sheet(&self, name: &str) -> SyncResult<(Sheet, Vec<ImportRowError>)> {
        read_sheet_file(&self.sheet_path(name), name)
    }
}

/// Reads a sheet file.
///
/// Records the CSV reader cannot decode are returned as row errors; the rest
/// of the sheet is still read. Row numbers count records, header first, so
/// a quoted cell spanning several lines is still one row.
pub fn read_sheet_file(path: &Path, name: &str) -> SyncResult<(Sheet, Vec<ImportRowError>)> {
    if !path.is_file() {
        return Err(SyncError::MirrorFailed(format!("sheet not found: {}", path.display())));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let headers = reader.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    let mut errors = Vec::new();

    for (i, result) in reader.records().enumerate() {
        let number = i as u64 + 2;
        match result {
            Ok(record) => rows.push(SheetLine {
                number,
                cells: record.iter().map(str::to_string).collect(),
            }),
            Err(err) => errors.push(ImportRowError {
                row: number,
                message: err.to_string(),
            }),
        }
    }

    Ok((
        Sheet {
            name: name.to_string(),
            headers,
            rows,
        },
        errors,
    ))
}
