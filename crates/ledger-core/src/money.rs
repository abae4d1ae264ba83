//! # Money Module
//!
//! Integer money and tax-rate types, plus the decimal text form the
//! spreadsheet mirror reads and writes.
//!
//! ## Text Form
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Stored            Mirror cell                                          │
//! │  ───────────────   ─────────────                                        │
//! │  Money(1250)       "12.50"                                              │
//! │  Money(-5)         "-0.05"                                              │
//! │  TaxRate(1800)     "18.00"   (percent, two decimals)                    │
//! │                                                                         │
//! │  Parsing accepts "12", "12.5", "12.50", " 12.50 " and a leading '-'.    │
//! │  More than two fraction digits is rejected rather than rounded.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

// =============================================================================
// Fixed-point helpers
// =============================================================================

/// Parses a decimal with at most two fraction digits into hundredths.
fn parse_hundredths(raw: &str) -> Option<i64> {
    let s = raw.trim();
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };

    let (whole, frac) = match digits.split_once('.') {
        Some((w, f)) => (w, f),
        None => (digits, ""),
    };

    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    if frac.len() > 2 {
        return None;
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let whole_value: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let frac_value: i64 = match frac.len() {
        0 => 0,
        1 => frac.parse::<i64>().ok()? * 10,
        _ => frac.parse().ok()?,
    };

    let value = whole_value.checked_mul(100)?.checked_add(frac_value)?;
    Some(if negative { -value } else { value })
}

fn format_hundredths(value: i64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let sign = if value < 0 { "-" } else { "" };
    let abs = value.unsigned_abs();
    write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
}

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// `self + other`, `None` on overflow.
    #[inline]
    pub const fn checked_add(self, other: Money) -> Option<Money> {
        match self.0.checked_add(other.0) {
            Some(sum) => Some(Money(sum)),
            None => None,
        }
    }

    /// `self * quantity`, `None` on overflow.
    ///
    /// ## Example
    /// ```rust
    /// use ledger_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(250).checked_mul(3), Some(Money::from_cents(750)));
    /// assert_eq!(Money::from_cents(i64::MAX / 2).checked_mul(3), None);
    /// ```
    #[inline]
    pub const fn checked_mul(self, quantity: i64) -> Option<Money> {
        match self.0.checked_mul(quantity) {
            Some(product) => Some(Money(product)),
            None => None,
        }
    }

    /// Parses the mirror's decimal text form.
    ///
    /// ## Example
    /// ```rust
    /// use ledger_core::money::Money;
    ///
    /// assert_eq!(Money::parse_decimal("12.5").unwrap().cents(), 1250);
    /// assert!(Money::parse_decimal("twelve").is_err());
    /// ```
    pub fn parse_decimal(raw: &str) -> Result<Self, ValidationError> {
        parse_hundredths(raw)
            .map(Money)
            .ok_or_else(|| ValidationError::invalid("amount", format!("'{}' is not a number", raw.trim())))
    }
}

/// Plain decimal, no currency symbol: the mirror is currency-agnostic.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        format_hundredths(self.0, f)
    }
}

impl FromStr for Money {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Money::parse_decimal(s)
    }
}

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate in basis points: 1800 = 18.00%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Parses a percentage such as `"18"` or `"8.25"`.
    pub fn parse_percentage(raw: &str) -> Result<Self, ValidationError> {
        let value = parse_hundredths(raw)
            .ok_or_else(|| ValidationError::invalid("tax rate", format!("'{}' is not a percentage", raw.trim())))?;
        if !(0..=10_000).contains(&value) {
            return Err(ValidationError::OutOfRange {
                field: "tax rate".to_string(),
                min: 0,
                max: 100,
            });
        }
        Ok(TaxRate(value as u32))
    }
}

impl fmt::Display for TaxRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        format_hundredths(self.0 as i64, f)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(1250).to_string(), "12.50");
        assert_eq!(Money::from_cents(5).to_string(), "0.05");
        assert_eq!(Money::from_cents(-550).to_string(), "-5.50");
        assert_eq!(Money::default().to_string(), "0.00");
    }

    #[test]
    fn test_parse_accepts_common_forms() {
        assert_eq!(Money::parse_decimal("12").unwrap().cents(), 1200);
        assert_eq!(Money::parse_decimal("12.5").unwrap().cents(), 1250);
        assert_eq!(Money::parse_decimal(" 12.50 ").unwrap().cents(), 1250);
        assert_eq!(Money::parse_decimal("-0.05").unwrap().cents(), -5);
        assert_eq!(Money::parse_decimal(".75").unwrap().cents(), 75);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Money::parse_decimal("abc").is_err());
        assert!(Money::parse_decimal("").is_err());
        assert!(Money::parse_decimal("1.234").is_err());
        assert!(Money::parse_decimal("1,000").is_err());
        assert!(Money::parse_decimal("-").is_err());
    }

    #[test]
    fn test_tax_rate_text() {
        let rate = TaxRate::parse_percentage("8.25").unwrap();
        assert_eq!(rate.bps(), 825);
        assert_eq!(rate.to_string(), "8.25");
        assert!(TaxRate::parse_percentage("150").is_err());
        assert!(TaxRate::parse_percentage("-1").is_err());
    }

    #[test]
    fn test_checked_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(250);
        assert_eq!(a.checked_add(b), Some(Money::from_cents(1250)));
        assert_eq!(b.checked_mul(3), Some(Money::from_cents(750)));
        assert_eq!(Money::from_cents(i64::MAX).checked_add(b), None);
        assert_eq!(Money::from_cents(9_223_372_036_854_775_800).checked_mul(1000), None);
    }
}
