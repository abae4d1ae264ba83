//! # Sheet Layouts
//!
//! Fixed column layout of each sheet and the per-row conversions.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  export:  record ──to_row()──► ["p-1", "Widget", ..., "Yes", ...]       │
//! │                                                                         │
//! │  import:  header row ──► { "id": 0, "product name": 1, ... }            │
//! │           data row   ──► SheetRow (cells looked up by header name)      │
//! │                      ──► from_row() ──► validate() ──► record           │
//! │                                            │                            │
//! │                                            └── Err ──► ImportRowError   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Cell conventions: booleans `Yes`/`No`, money `12.50`, tax rates as
//! percentages `18.00`, timestamps RFC 3339 in UTC, absent optionals empty.

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use ledger_core::{
    Customer, Employee, Invoice, InvoiceItem, InvoiceStatus, Money, Product, Record, RecordMeta,
    Store, TaxRate, ValidationError,
};

// =============================================================================
// Sheet Data
// =============================================================================

/// One data line of a sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetLine {
    /// Spreadsheet row number; the header is row 1.
    pub number: u64,
    pub cells: Vec<String>,
}

/// A sheet held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<SheetLine>,
}

impl Sheet {
    /// Renders records in their fixed column layout.
    pub fn from_records<T: SheetRecord>(records: &[T]) -> Self {
        Sheet {
            name: sheet_name::<T>().to_string(),
            headers: T::HEADERS.iter().map(|h| h.to_string()).collect(),
            rows: records
                .iter()
                .filter(|r| !r.is_deleted())
                .enumerate()
                .map(|(i, r)| SheetLine {
                    number: i as u64 + 2,
                    cells: r.to_row(),
                })
                .collect(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

pub fn sheet_name<T: Record>() -> &'static str {
    T::ENTITY.sheet_name().unwrap_or_else(|| T::ENTITY.table_name())
}

// =============================================================================
// Cell Formatting
// =============================================================================

fn yes_no(value: bool) -> String {
    if value { "Yes" } else { "No" }.to_string()
}

fn opt(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn ts(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn meta_cells(meta: &RecordMeta) -> [String; 3] {
    [yes_no(meta.is_synced), ts(meta.created_at), ts(meta.updated_at)]
}

// =============================================================================
// Row Parsing
// =============================================================================

/// Header name → column position, matched case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct HeaderIndex {
    columns: HashMap<String, usize>,
}

impl HeaderIndex {
    pub fn new(headers: &[String]) -> Self {
        let mut columns = HashMap::new();
        for (i, h) in headers.iter().enumerate() {
            columns.entry(h.trim().to_lowercase()).or_insert(i);
        }
        HeaderIndex { columns }
    }

    fn position(&self, header: &str) -> Option<usize> {
        self.columns.get(&header.to_lowercase()).copied()
    }
}

/// Read access to one data row by header name.
pub struct SheetRow<'a> {
    index: &'a HeaderIndex,
    cells: &'a [String],
    now: DateTime<Utc>,
}

impl<'a> SheetRow<'a> {
    pub fn new(index: &'a HeaderIndex, cells: &'a [String], now: DateTime<Utc>) -> Self {
        SheetRow { index, cells, now }
    }

    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|c| c.trim().is_empty())
    }

    /// Trimmed cell text; empty when the column is missing.
    pub fn text(&self, header: &str) -> &'a str {
        self.index
            .position(header)
            .and_then(|i| self.cells.get(i))
            .map(|c| c.trim())
            .unwrap_or("")
    }

    pub fn required(&self, header: &str) -> Result<String, ValidationError> {
        match self.text(header) {
            "" => Err(ValidationError::required(header)),
            value => Ok(value.to_string()),
        }
    }

    pub fn optional(&self, header: &str) -> Option<String> {
        Some(self.text(header)).filter(|v| !v.is_empty()).map(str::to_string)
    }

    /// Record id; a blank cell mints a new one.
    pub fn id(&self) -> String {
        self.optional("ID").unwrap_or_else(|| Uuid::new_v4().to_string())
    }

    pub fn money(&self, header: &str) -> Result<Money, ValidationError> {
        let raw = self.required(header)?;
        Money::parse_decimal(&raw).map_err(|_| ValidationError::invalid(header, format!("'{}' is not a number", raw)))
    }

    /// Percentage cell; blank means 0%.
    pub fn rate(&self, header: &str) -> Result<TaxRate, ValidationError> {
        match self.text(header) {
            "" => Ok(TaxRate::default()),
            raw => TaxRate::parse_percentage(raw)
                .map_err(|_| ValidationError::invalid(header, format!("'{}' is not a percentage between 0 and 100", raw))),
        }
    }

    /// Whole number cell; blank means `default`.
    pub fn integer(&self, header: &str, default: i64) -> Result<i64, ValidationError> {
        match self.text(header) {
            "" => Ok(default),
            raw => raw
                .parse()
                .map_err(|_| ValidationError::invalid(header, format!("'{}' is not a whole number", raw))),
        }
    }

    /// `yes`/`no` in any case; blank means `default`.
    pub fn flag(&self, header: &str, default: bool) -> Result<bool, ValidationError> {
        let raw = self.text(header);
        match raw.to_lowercase().as_str() {
            "" => Ok(default),
            "yes" => Ok(true),
            "no" => Ok(false),
            _ => Err(ValidationError::invalid(header, format!("'{}' is not Yes or No", raw))),
        }
    }

    pub fn timestamp(&self, header: &str) -> Result<Option<DateTime<Utc>>, ValidationError> {
        match self.text(header) {
            "" => Ok(None),
            raw => DateTime::parse_from_rfc3339(raw)
                .map(|t| Some(t.with_timezone(&Utc)))
                .map_err(|_| ValidationError::invalid(header, format!("'{}' is not an RFC 3339 timestamp", raw))),
        }
    }

    /// `Synced`, `Created At`, `Updated At`; blank timestamps default to now.
    pub fn meta(&self) -> Result<RecordMeta, ValidationError> {
        let created_at = self.timestamp("Created At")?.unwrap_or(self.now);
        let updated_at = self.timestamp("Updated At")?.unwrap_or(created_at);
        Ok(RecordMeta {
            is_deleted: false,
            is_synced: self.flag("Synced", false)?,
            created_at,
            updated_at,
        })
    }
}

// =============================================================================
// SheetRecord
// =============================================================================

/// A record type with a sheet in the workbook.
pub trait SheetRecord: Record {
    const HEADERS: &'static [&'static str];

    fn to_row(&self) -> Vec<String>;

    fn from_row(row: &SheetRow<'_>) -> Result<Self, ValidationError>;
}

impl SheetRecord for Product {
    const HEADERS: &'static [&'static str] = &[
        "ID", "Product Name", "SKU", "Description", "Price", "Tax Rate (%)", "Stock Quantity",
        "Active", "Owner ID", "Synced", "Created At", "Updated At",
    ];

    fn to_row(&self) -> Vec<String> {
        let mut row = vec![
            self.id.clone(),
            self.name.clone(),
            self.sku.clone(),
            opt(&self.description),
            self.price.to_string(),
            self.tax_rate.to_string(),
            self.stock_quantity.to_string(),
            yes_no(self.is_active),
            self.user_id.clone(),
        ];
        row.extend(meta_cells(&self.meta));
        row
    }

    fn from_row(row: &SheetRow<'_>) -> Result<Self, ValidationError> {
        Ok(Product {
            id: row.id(),
            user_id: row.required("Owner ID")?,
            name: row.required("Product Name")?,
            sku: row.text("SKU").to_string(),
            description: row.optional("Description"),
            price: row.money("Price")?,
            tax_rate: row.rate("Tax Rate (%)")?,
            stock_quantity: row.integer("Stock Quantity", 0)?,
            is_active: row.flag("Active", true)?,
            meta: row.meta()?,
        })
    }
}

impl SheetRecord for Customer {
    const HEADERS: &'static [&'static str] = &[
        "ID", "Customer Name", "Email", "Phone", "Address", "Tax ID", "Owner ID", "Synced",
        "Created At", "Updated At",
    ];

    fn to_row(&self) -> Vec<String> {
        let mut row = vec![
            self.id.clone(),
            self.name.clone(),
            opt(&self.email),
            opt(&self.phone),
            opt(&self.address),
            opt(&self.tax_id),
            self.user_id.clone(),
        ];
        row.extend(meta_cells(&self.meta));
        row
    }

    fn from_row(row: &SheetRow<'_>) -> Result<Self, ValidationError> {
        Ok(Customer {
            id: row.id(),
            user_id: row.required("Owner ID")?,
            name: row.required("Customer Name")?,
            email: row.optional("Email"),
            phone: row.optional("Phone"),
            address: row.optional("Address"),
            tax_id: row.optional("Tax ID"),
            meta: row.meta()?,
        })
    }
}

impl SheetRecord for Store {
    const HEADERS: &'static [&'static str] = &[
        "ID", "Store Name", "Store Code", "Address", "Phone", "Active", "Owner ID", "Synced",
        "Created At", "Updated At",
    ];

    fn to_row(&self) -> Vec<String> {
        let mut row = vec![
            self.id.clone(),
            self.name.clone(),
            self.code.clone(),
            opt(&self.address),
            opt(&self.phone),
            yes_no(self.is_active),
            self.user_id.clone(),
        ];
        row.extend(meta_cells(&self.meta));
        row
    }

    fn from_row(row: &SheetRow<'_>) -> Result<Self, ValidationError> {
        Ok(Store {
            id: row.id(),
            user_id: row.required("Owner ID")?,
            name: row.required("Store Name")?,
            code: row.required("Store Code")?,
            address: row.optional("Address"),
            phone: row.optional("Phone"),
            is_active: row.flag("Active", true)?,
            meta: row.meta()?,
        })
    }
}

impl SheetRecord for Employee {
    const HEADERS: &'static [&'static str] = &[
        "ID", "Employee Name", "Employee Code", "Role", "Phone", "Active", "Store ID", "Synced",
        "Created At", "Updated At",
    ];

    fn to_row(&self) -> Vec<String> {
        let mut row = vec![
            self.id.clone(),
            self.name.clone(),
            self.employee_code.clone(),
            opt(&self.role),
            opt(&self.phone),
            yes_no(self.is_active),
            self.store_id.clone(),
        ];
        row.extend(meta_cells(&self.meta));
        row
    }

    fn from_row(row: &SheetRow<'_>) -> Result<Self, ValidationError> {
        Ok(Employee {
            id: row.id(),
            store_id: row.required("Store ID")?,
            name: row.required("Employee Name")?,
            employee_code: row.required("Employee Code")?,
            role: row.optional("Role"),
            phone: row.optional("Phone"),
            is_active: row.flag("Active", true)?,
            meta: row.meta()?,
        })
    }
}

impl SheetRecord for Invoice {
    const HEADERS: &'static [&'static str] = &[
        "ID", "Invoice Number", "Invoice Date", "Customer ID", "Employee ID", "Status", "Subtotal",
        "Tax", "Total", "Notes", "Store ID", "Synced", "Created At", "Updated At",
    ];

    fn to_row(&self) -> Vec<String> {
        let mut row = vec![
            self.id.clone(),
            self.invoice_number.clone(),
            ts(self.invoice_date),
            opt(&self.customer_id),
            opt(&self.employee_id),
            self.status.to_string(),
            self.subtotal.to_string(),
            self.tax.to_string(),
            self.total.to_string(),
            opt(&self.notes),
            self.store_id.clone(),
        ];
        row.extend(meta_cells(&self.meta));
        row
    }

    fn from_row(row: &SheetRow<'_>) -> Result<Self, ValidationError> {
        let invoice_date = row
            .timestamp("Invoice Date")?
            .ok_or_else(|| ValidationError::required("Invoice Date"))?;
        let status: InvoiceStatus = row
            .text("Status")
            .parse()
            .map_err(|_| ValidationError::invalid("Status", format!("'{}' is not a known status", row.text("Status"))))?;

        Ok(Invoice {
            id: row.id(),
            store_id: row.required("Store ID")?,
            invoice_number: row.required("Invoice Number")?,
            invoice_date,
            customer_id: row.optional("Customer ID"),
            employee_id: row.optional("Employee ID"),
            status,
            subtotal: row.money("Subtotal")?,
            tax: row.money("Tax")?,
            total: row.money("Total")?,
            notes: row.optional("Notes"),
            meta: row.meta()?,
        })
    }
}

impl SheetRecord for InvoiceItem {
    const HEADERS: &'static [&'static str] = &[
        "ID", "Invoice ID", "Product ID", "Description", "Quantity", "Unit Price", "Tax Rate (%)",
        "Line Total", "Synced", "Created At", "Updated At",
    ];

    fn to_row(&self) -> Vec<String> {
        let mut row = vec![
            self.id.clone(),
            self.invoice_id.clone(),
            opt(&self.product_id),
            self.description.clone(),
            self.quantity.to_string(),
            self.unit_price.to_string(),
            self.tax_rate.to_string(),
            self.line_total.to_string(),
        ];
        row.extend(meta_cells(&self.meta));
        row
    }

    fn from_row(row: &SheetRow<'_>) -> Result<Self, ValidationError> {
        let unit_price = row.money("Unit Price")?;
        let quantity = row.integer("Quantity", 1)?;
        let line_total = match row.text("Line Total") {
            "" => unit_price.checked_mul(quantity).ok_or_else(|| {
                ValidationError::invalid("Line Total", format!("{} x {} is too large", unit_price, quantity))
            })?,
            _ => row.money("Line Total")?,
        };

        Ok(InvoiceItem {
            id: row.id(),
            invoice_id: row.required("Invoice ID")?,
            product_id: row.optional("Product ID"),
            description: row.text("Description").to_string(),
            quantity,
            unit_price,
            tax_rate: row.rate("Tax Rate (%)")?,
            line_total,
            meta: row.meta()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 9, 30, 0).unwrap()
    }

    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn product() -> Product {
        Product {
            id: "p-1".into(),
            user_id: "u-1".into(),
            name: "Widget".into(),
            sku: "WID-001".into(),
            description: Some("Blue, large".into()),
            price: Money::from_cents(1250),
            tax_rate: TaxRate::from_bps(1800),
            stock_quantity: 40,
            is_active: true,
            meta: RecordMeta::new(now()),
        }
    }

    #[test]
    fn test_product_row_layout() {
        let row = product().to_row();
        assert_eq!(row.len(), Product::HEADERS.len());
        assert_eq!(
            row,
            cells(&[
                "p-1", "Widget", "WID-001", "Blue, large", "12.50", "18.00", "40", "Yes", "u-1", "No",
                "2024-03-15T09:30:00Z", "2024-03-15T09:30:00Z",
            ])
        );
    }

    #[test]
    fn test_every_layout_matches_its_headers() {
        let meta = RecordMeta::new(now());
        let store = Store {
            id: "s".into(),
            user_id: "u".into(),
            name: "n".into(),
            code: "ACME".into(),
            address: None,
            phone: None,
            is_active: false,
            meta: meta.clone(),
        };
        assert_eq!(store.to_row().len(), Store::HEADERS.len());

        let item = InvoiceItem {
            id: "i".into(),
            invoice_id: "inv".into(),
            product_id: None,
            description: "d".into(),
            quantity: 2,
            unit_price: Money::from_cents(100),
            tax_rate: TaxRate::default(),
            line_total: Money::from_cents(200),
            meta,
        };
        assert_eq!(item.to_row().len(), InvoiceItem::HEADERS.len());
    }

    #[test]
    fn test_headers_match_case_insensitively_in_any_order() {
        let headers = cells(&["price", "OWNER ID", "product name", "id", "active"]);
        let index = HeaderIndex::new(&headers);
        let data = cells(&["3.5", "u-9", "Bolt", "p-9", "no"]);

        let parsed = Product::from_row(&SheetRow::new(&index, &data, now())).unwrap();
        assert_eq!(parsed.id, "p-9");
        assert_eq!(parsed.price, Money::from_cents(350));
        assert!(!parsed.is_active);
        assert_eq!(parsed.meta.created_at, now());
        assert_eq!(parsed.tax_rate, TaxRate::default());
    }

    #[test]
    fn test_non_numeric_price_names_the_column() {
        let headers: Vec<String> = Product::HEADERS.iter().map(|h| h.to_string()).collect();
        let index = HeaderIndex::new(&headers);
        let mut data = product().to_row();
        data[4] = "twelve".into();

        let err = Product::from_row(&SheetRow::new(&index, &data, now())).unwrap_err();
        assert_eq!(err.to_string(), "Price has invalid format: 'twelve' is not a number");
    }

    #[test]
    fn test_blank_id_mints_a_new_one() {
        let index = HeaderIndex::new(&cells(&["ID", "Customer Name", "Owner ID"]));
        let data = cells(&["", "Jane", "u-1"]);

        let a = Customer::from_row(&SheetRow::new(&index, &data, now())).unwrap();
        let b = Customer::from_row(&SheetRow::new(&index, &data, now())).unwrap();
        assert!(!a.id.is_empty());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_flag_rejects_other_words() {
        let index = HeaderIndex::new(&cells(&["Active"]));
        let data = cells(&["maybe"]);
        let row = SheetRow::new(&index, &data, now());
        assert!(row.flag("Active", true).is_err());

        let data = cells(&["YES"]);
        assert!(SheetRow::new(&index, &data, now()).flag("Active", false).unwrap());
    }

    #[test]
    fn test_sheet_skips_deleted_records() {
        let mut gone = product();
        gone.id = "p-2".into();
        gone.meta.is_deleted = true;

        let sheet = Sheet::from_records(&[product(), gone]);
        assert_eq!(sheet.name, "Products");
        assert_eq!(sheet.row_count(), 1);
        assert_eq!(sheet.rows[0].number, 2);
    }
}
