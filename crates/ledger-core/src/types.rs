//! # Domain Types
//!
//! Records persisted by the ledger, and the sync types built around them.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  trait Record ─────────────────────────────────────────────────────┐    │
//! │   ENTITY, id(), scope_id(), business_key(), meta()                 │    │
//! │                                                                    │    │
//! │  ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────┐  │    │
//! │  │ Product  │ │ Customer │ │  Store   │ │ Employee │ │ Setting  │  │    │
//! │  │ user_id  │ │ user_id  │ │ user_id  │ │ store_id │ │ user_id  │  │    │
//! │  │ sku      │ │    -     │ │ code     │ │ emp code │ │    -     │  │    │
//! │  └──────────┘ └──────────┘ └──────────┘ └──────────┘ └──────────┘  │    │
//! │  ┌──────────────────┐ ┌───────────────────┐                        │    │
//! │  │     Invoice      │ │   InvoiceItem     │    scope ↑             │    │
//! │  │ store_id         │ │ invoice_id        │    business key ↑      │    │
//! │  │ invoice_number   │ │        -          │                        │    │
//! │  └──────────────────┘ └───────────────────┘                        │    │
//! │                                                                    │    │
//! │  RecordMeta (flattened into every record)                          │    │
//! │   is_deleted, is_synced, created_at, updated_at ◄──────────────────┘    │
//! │                                                                         │
//! │  RecordEnvelope  - type-erased record for the remote store & queue     │
//! │  SyncQueueEntry  - one pending mutation                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every record has:
//! - `id`: opaque string, immutable, unique per table
//! - Business key (SKU, store code, ...): human-readable, unique per scope
//!   among live records

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::{Money, TaxRate};
use crate::validation;

// =============================================================================
// Entity Type
// =============================================================================

/// The tables the ledger persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Product,
    Customer,
    Invoice,
    InvoiceItem,
    Employee,
    Store,
    Setting,
}

impl EntityType {
    /// Every entity type, in the order the mirror writes sheets.
    pub const ALL: [EntityType; 7] = [
        EntityType::Product,
        EntityType::Customer,
        EntityType::Employee,
        EntityType::Invoice,
        EntityType::InvoiceItem,
        EntityType::Store,
        EntityType::Setting,
    ];

    /// Stable identifier used in queue rows and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Product => "product",
            EntityType::Customer => "customer",
            EntityType::Invoice => "invoice",
            EntityType::InvoiceItem => "invoice_item",
            EntityType::Employee => "employee",
            EntityType::Store => "store",
            EntityType::Setting => "setting",
        }
    }

    /// Table name in both the local and the remote store.
    pub fn table_name(&self) -> &'static str {
        match self {
            EntityType::Product => "products",
            EntityType::Customer => "customers",
            EntityType::Invoice => "invoices",
            EntityType::InvoiceItem => "invoice_items",
            EntityType::Employee => "employees",
            EntityType::Store => "stores",
            EntityType::Setting => "settings",
        }
    }

    /// Sheet name in the spreadsheet mirror. Settings are not mirrored.
    pub fn sheet_name(&self) -> Option<&'static str> {
        match self {
            EntityType::Product => Some("Products"),
            EntityType::Customer => Some("Customers"),
            EntityType::Invoice => Some("Invoices"),
            EntityType::InvoiceItem => Some("InvoiceItems"),
            EntityType::Employee => Some("Employees"),
            EntityType::Store => Some("Stores"),
            EntityType::Setting => None,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = CoreError;

    /// Accepts the identifier, the table name, or the sheet name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        EntityType::ALL
            .into_iter()
            .find(|e| {
                wanted.eq_ignore_ascii_case(e.as_str())
                    || wanted.eq_ignore_ascii_case(e.table_name())
                    || e.sheet_name().is_some_and(|n| wanted.eq_ignore_ascii_case(n))
            })
            .ok_or_else(|| CoreError::UnknownEntityType(s.to_string()))
    }
}

// =============================================================================
// Sync Action
// =============================================================================

/// The mutation a queue entry replays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    Create,
    Update,
    Delete,
}

impl SyncAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncAction::Create => "create",
            SyncAction::Update => "update",
            SyncAction::Delete => "delete",
        }
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncAction {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "create" => Ok(SyncAction::Create),
            "update" => Ok(SyncAction::Update),
            "delete" => Ok(SyncAction::Delete),
            other => Err(CoreError::UnknownAction(other.to_string())),
        }
    }
}

// =============================================================================
// Record Metadata
// =============================================================================

/// Bookkeeping fields shared by every record.
///
/// Flattened into the record's JSON, so a stored body reads as one object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMeta {
    /// Soft-delete flag. Deleted records stay for audit and export.
    #[serde(default)]
    pub is_deleted: bool,

    /// True once the remote store has acknowledged the latest version.
    #[serde(default)]
    pub is_synced: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecordMeta {
    /// Fresh metadata stamped at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        RecordMeta {
            is_deleted: false,
            is_synced: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Marks a local change: bumps `updated_at` and clears the synced flag.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
        self.is_synced = false;
    }
}

impl Default for RecordMeta {
    fn default() -> Self {
        RecordMeta::new(Utc::now())
    }
}

// =============================================================================
// Record Trait
// =============================================================================

/// A persisted entity.
///
/// ## Contract
/// - `id()` is unique within the entity's table
/// - `scope_id()` is the owner key (user, store, or parent invoice)
/// - `business_key()`, when present, is unique per scope among live records
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Which table this record lives in.
    const ENTITY: EntityType;

    fn id(&self) -> &str;

    fn scope_id(&self) -> &str;

    fn business_key(&self) -> Option<&str> {
        None
    }

    fn meta(&self) -> &RecordMeta;

    fn meta_mut(&mut self) -> &mut RecordMeta;

    /// Field-level checks run before any store sees the record.
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }

    fn is_deleted(&self) -> bool {
        self.meta().is_deleted
    }
}

/// Empty strings are "no business key".
fn non_empty(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

// =============================================================================
// Product
// =============================================================================

/// A sellable product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub user_id: String,
    pub name: String,
    /// Stock Keeping Unit - business identifier.
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Money,
    /// Tax rate in basis points (1800 = 18%).
    #[serde(default)]
    pub tax_rate: TaxRate,
    #[serde(default)]
    pub stock_quantity: i64,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(flatten)]
    pub meta: RecordMeta,
}

fn default_true() -> bool {
    true
}

impl Record for Product {
    const ENTITY: EntityType = EntityType::Product;

    fn id(&self) -> &str {
        &self.id
    }

    fn scope_id(&self) -> &str {
        &self.user_id
    }

    fn business_key(&self) -> Option<&str> {
        non_empty(&self.sku)
    }

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validation::validate_name("product name", &self.name)?;
        if !self.sku.trim().is_empty() {
            validation::validate_sku(&self.sku)?;
        }
        validation::validate_non_negative("price", self.price.cents())?;
        Ok(())
    }
}

// =============================================================================
// Customer
// =============================================================================

/// A billed customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    /// GST/VAT registration number.
    #[serde(default)]
    pub tax_id: Option<String>,
    #[serde(flatten)]
    pub meta: RecordMeta,
}

impl Record for Customer {
    const ENTITY: EntityType = EntityType::Customer;

    fn id(&self) -> &str {
        &self.id
    }

    fn scope_id(&self) -> &str {
        &self.user_id
    }

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validation::validate_name("customer name", &self.name)
    }
}

// =============================================================================
// Store
// =============================================================================

/// A physical or logical store (branch).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Store {
    pub id: String,
    pub user_id: String,
    pub name: String,
    /// Short code used as the invoice-number prefix.
    pub code: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(flatten)]
    pub meta: RecordMeta,
}

impl Record for Store {
    const ENTITY: EntityType = EntityType::Store;

    fn id(&self) -> &str {
        &self.id
    }

    fn scope_id(&self) -> &str {
        &self.user_id
    }

    fn business_key(&self) -> Option<&str> {
        non_empty(&self.code)
    }

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validation::validate_name("store name", &self.name)?;
        validation::validate_store_code(&self.code)
    }
}

// =============================================================================
// Employee
// =============================================================================

/// A person who issues invoices at a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub id: String,
    pub store_id: String,
    pub name: String,
    /// 2-4 alphanumeric characters, unique per store.
    pub employee_code: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(flatten)]
    pub meta: RecordMeta,
}

impl Record for Employee {
    const ENTITY: EntityType = EntityType::Employee;

    fn id(&self) -> &str {
        &self.id
    }

    fn scope_id(&self) -> &str {
        &self.store_id
    }

    fn business_key(&self) -> Option<&str> {
        non_empty(&self.employee_code)
    }

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validation::validate_name("employee name", &self.name)?;
        validation::validate_employee_code(&self.employee_code)
    }
}

// =============================================================================
// Invoice
// =============================================================================

/// Lifecycle of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    #[default]
    Draft,
    Issued,
    Paid,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Issued => "issued",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" | "" => Ok(InvoiceStatus::Draft),
            "issued" => Ok(InvoiceStatus::Issued),
            "paid" => Ok(InvoiceStatus::Paid),
            "cancelled" | "canceled" => Ok(InvoiceStatus::Cancelled),
            other => Err(ValidationError::invalid(
                "status",
                format!("'{}' is not one of draft, issued, paid, cancelled", other),
            )),
        }
    }
}

/// An invoice header. Line items live in [`InvoiceItem`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub store_id: String,
    /// `STORE4-EMP4-YYYYMMDDHHmmss-SEQ3`, see [`crate::identifier`].
    pub invoice_number: String,
    pub invoice_date: DateTime<Utc>,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub employee_id: Option<String>,
    #[serde(default)]
    pub status: InvoiceStatus,
    pub subtotal: Money,
    pub tax: Money,
    pub total: Money,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(flatten)]
    pub meta: RecordMeta,
}

impl Record for Invoice {
    const ENTITY: EntityType = EntityType::Invoice;

    fn id(&self) -> &str {
        &self.id
    }

    fn scope_id(&self) -> &str {
        &self.store_id
    }

    fn business_key(&self) -> Option<&str> {
        non_empty(&self.invoice_number)
    }

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validation::validate_non_negative("subtotal", self.subtotal.cents())?;
        validation::validate_non_negative("tax", self.tax.cents())?;
        if self.subtotal.checked_add(self.tax) != Some(self.total) {
            return Err(ValidationError::invalid(
                "total",
                format!(
                    "{} does not equal subtotal {} plus tax {}",
                    self.total, self.subtotal, self.tax
                ),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Invoice Item
// =============================================================================

/// One line on an invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub id: String,
    pub invoice_id: String,
    #[serde(default)]
    pub product_id: Option<String>,
    pub description: String,
    pub quantity: i64,
    pub unit_price: Money,
    #[serde(default)]
    pub tax_rate: TaxRate,
    pub line_total: Money,
    #[serde(flatten)]
    pub meta: RecordMeta,
}

impl InvoiceItem {
    /// Quantity times unit price, before tax. `None` if it overflows.
    pub fn computed_line_total(&self) -> Option<Money> {
        self.unit_price.checked_mul(self.quantity)
    }
}

impl Record for InvoiceItem {
    const ENTITY: EntityType = EntityType::InvoiceItem;

    fn id(&self) -> &str {
        &self.id
    }

    fn scope_id(&self) -> &str {
        &self.invoice_id
    }

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validation::validate_quantity(self.quantity)?;
        validation::validate_non_negative("unit price", self.unit_price.cents())?;
        if self.computed_line_total().is_none() {
            return Err(ValidationError::invalid("line total", "quantity times unit price is too large"));
        }
        Ok(())
    }
}

// =============================================================================
// Setting
// =============================================================================

/// A per-user key/value setting. The key is the record id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setting {
    pub id: String,
    pub user_id: String,
    pub value: String,
    #[serde(flatten)]
    pub meta: RecordMeta,
}

impl Record for Setting {
    const ENTITY: EntityType = EntityType::Setting;

    fn id(&self) -> &str {
        &self.id
    }

    fn scope_id(&self) -> &str {
        &self.user_id
    }

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }
}

// =============================================================================
// Record Envelope
// =============================================================================

/// A record with its type erased.
///
/// This is what crosses the wire to the remote store and what the sync
/// queue stores as payload. `data` is the record's full JSON body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordEnvelope {
    pub entity: EntityType,
    pub id: String,
    pub scope_id: String,
    pub business_key: Option<String>,
    pub is_deleted: bool,
    pub updated_at: DateTime<Utc>,
    pub data: serde_json::Value,
}

impl RecordEnvelope {
    /// Wraps a typed record.
    pub fn from_record<T: Record>(record: &T) -> CoreResult<Self> {
        Ok(RecordEnvelope {
            entity: T::ENTITY,
            id: record.id().to_string(),
            scope_id: record.scope_id().to_string(),
            business_key: record.business_key().map(str::to_string),
            is_deleted: record.is_deleted(),
            updated_at: record.meta().updated_at,
            data: serde_json::to_value(record)?,
        })
    }

    /// Unwraps into a typed record.
    ///
    /// Fails if the envelope carries a different entity type.
    pub fn into_record<T: Record>(self) -> CoreResult<T> {
        if self.entity != T::ENTITY {
            return Err(CoreError::UnknownEntityType(format!(
                "expected {}, envelope holds {}",
                T::ENTITY,
                self.entity
            )));
        }
        Ok(serde_json::from_value(self.data)?)
    }
}

// =============================================================================
// Sync Queue Entry
// =============================================================================

/// Replay state of a queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    /// Waiting for the next drain.
    Pending,
    /// Retry budget exhausted; skipped until requeued.
    Dead,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Pending => "pending",
            QueueStatus::Dead => "dead",
        }
    }
}

impl FromStr for QueueStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(QueueStatus::Pending),
            "dead" => Ok(QueueStatus::Dead),
            other => Err(CoreError::UnknownAction(format!("queue status '{}'", other))),
        }
    }
}

/// A mutation that could not reach the remote store yet.
///
/// ## Lifecycle
/// ```text
/// enqueue ──► Pending ──drain ok──► (removed)
///                │
///                └──drain fail──► retry_count += 1 ──► Pending
///                                        │
///                                  (cap reached)
///                                        ▼
///                                      Dead ──requeue──► Pending
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncQueueEntry {
    /// Monotonic position; drain order is ascending `seq`.
    pub seq: i64,
    pub id: String,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub action: SyncAction,
    /// JSON of the [`RecordEnvelope`] at enqueue time.
    pub payload: String,
    pub created_at: DateTime<Utc>,
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub attempted_at: Option<DateTime<Utc>>,
    pub status: QueueStatus,
}

impl SyncQueueEntry {
    /// Decodes the payload back into an envelope.
    pub fn envelope(&self) -> CoreResult<RecordEnvelope> {
        Ok(serde_json::from_str(&self.payload)?)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn product() -> Product {
        Product {
            id: "p-1".into(),
            user_id: "u-1".into(),
            name: "Notebook".into(),
            sku: "NB-01".into(),
            description: None,
            price: Money::from_cents(1250),
            tax_rate: TaxRate::from_bps(1800),
            stock_quantity: 4,
            is_active: true,
            meta: RecordMeta::default(),
        }
    }

    #[test]
    fn test_entity_type_parsing() {
        assert_eq!("product".parse::<EntityType>().unwrap(), EntityType::Product);
        assert_eq!("invoice_items".parse::<EntityType>().unwrap(), EntityType::InvoiceItem);
        assert_eq!("InvoiceItems".parse::<EntityType>().unwrap(), EntityType::InvoiceItem);
        assert!("widgets".parse::<EntityType>().is_err());
    }

    #[test]
    fn test_meta_is_flattened() {
        let json = serde_json::to_value(product()).unwrap();
        assert_eq!(json["is_deleted"], serde_json::json!(false));
        assert!(json.get("meta").is_none());
    }

    #[test]
    fn test_envelope_round_trip() {
        let p = product();
        let env = RecordEnvelope::from_record(&p).unwrap();
        assert_eq!(env.entity, EntityType::Product);
        assert_eq!(env.business_key.as_deref(), Some("NB-01"));
        let back: Product = env.into_record().unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn test_envelope_rejects_wrong_entity() {
        let env = RecordEnvelope::from_record(&product()).unwrap();
        assert!(env.into_record::<Customer>().is_err());
    }

    #[test]
    fn test_empty_sku_has_no_business_key() {
        let mut p = product();
        p.sku = "  ".into();
        assert_eq!(p.business_key(), None);
    }

    #[test]
    fn test_invoice_totals_must_add_up() {
        let mut invoice = Invoice {
            id: "i-1".into(),
            store_id: "s-1".into(),
            invoice_number: String::new(),
            invoice_date: Utc::now(),
            customer_id: None,
            employee_id: None,
            status: InvoiceStatus::Draft,
            subtotal: Money::from_cents(1000),
            tax: Money::from_cents(180),
            total: Money::from_cents(1180),
            notes: None,
            meta: RecordMeta::default(),
        };
        assert!(invoice.validate().is_ok());

        invoice.total = Money::from_cents(1000);
        assert!(invoice.validate().is_err());
    }

    #[test]
    fn test_item_with_overflowing_line_total_is_invalid() {
        let mut item = InvoiceItem {
            id: "li-1".into(),
            invoice_id: "i-1".into(),
            product_id: None,
            description: "Bulk".into(),
            quantity: 1000,
            unit_price: Money::from_cents(125),
            tax_rate: TaxRate::default(),
            line_total: Money::from_cents(125_000),
            meta: RecordMeta::default(),
        };
        assert!(item.validate().is_ok());
        assert_eq!(item.computed_line_total(), Some(Money::from_cents(125_000)));

        item.unit_price = Money::from_cents(i64::MAX / 100);
        assert!(item.validate().is_err());
    }

    #[test]
    fn test_touch_clears_synced() {
        let mut meta = RecordMeta::default();
        meta.is_synced = true;
        meta.touch(Utc::now());
        assert!(!meta.is_synced);
    }
}
