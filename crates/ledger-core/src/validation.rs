//! # Validation Module
//!
//! Field checks run by [`Record::validate`](crate::Record::validate) before a
//! record reaches either store, and by the mirror importer on each row.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Layer 1: THIS MODULE - field rules (lengths, formats, ranges)          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Local SQLite - UNIQUE(scope, business key) for live rows      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Remote store - its own constraints, surfaced on replay        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Largest quantity accepted on a single invoice line.
pub const MAX_LINE_QUANTITY: i64 = 100_000;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a display name (product, customer, store, employee).
///
/// ## Rules
/// - Must not be blank
/// - At most 200 characters
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::required(field));
    }

    if name.chars().count() > 200 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates a SKU.
///
/// ## Example
/// ```rust
/// use ledger_core::validation::validate_sku;
///
/// assert!(validate_sku("NB-A5_01").is_ok());
/// assert!(validate_sku("no spaces").is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::required("sku"));
    }

    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::invalid(
            "sku",
            "must contain only letters, numbers, hyphens, and underscores",
        ));
    }

    Ok(())
}

/// Validates a store code: 2 to 10 ASCII letters or digits.
pub fn validate_store_code(code: &str) -> ValidationResult<()> {
    validate_code("store code", code, 2, 10)
}

/// Validates an employee code: 2 to 4 ASCII letters or digits.
///
/// ## Example
/// ```rust
/// use ledger_core::validation::validate_employee_code;
///
/// assert!(validate_employee_code("AC01").is_ok());
/// assert!(validate_employee_code("A").is_err());
/// assert!(validate_employee_code("ACME1").is_err());
/// ```
pub fn validate_employee_code(code: &str) -> ValidationResult<()> {
    validate_code("employee code", code, 2, 4)
}

fn validate_code(field: &str, code: &str, min: usize, max: usize) -> ValidationResult<()> {
    if code.is_empty() {
        return Err(ValidationError::required(field));
    }
    if code.len() < min {
        return Err(ValidationError::TooShort {
            field: field.to_string(),
            min,
        });
    }
    if code.len() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }
    if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::invalid(field, "must be letters and digits only"));
    }
    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Rejects negative amounts.
pub fn validate_non_negative(field: &str, value: i64) -> ValidationResult<()> {
    if value < 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

/// Validates an invoice line quantity.
pub fn validate_quantity(quantity: i64) -> ValidationResult<()> {
    if !(1..=MAX_LINE_QUANTITY).contains(&quantity) {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }
    Ok(())
}
