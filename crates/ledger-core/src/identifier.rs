//! # Identifier Formats
//!
//! Pure formatting and candidate generation for human-readable codes.
//! Uniqueness checks and counters live in ledger-sync; this module only
//! decides what a code looks like.
//!
//! ## Invoice Number
//! ```text
//! ACME-JD01-20240315143005-007
//! ──┬─ ──┬─ ───────┬────── ─┬─
//!   │    │         │        └── daily sequence, 001..999
//!   │    │         └─────────── issue time, YYYYMMDDHHmmss
//!   │    └───────────────────── employee code, 4 chars
//!   └────────────────────────── store code, 4 chars
//!
//! Segments are upper-cased, stripped to ASCII letters/digits, then cut
//! or right-padded with 'X' to exactly four characters.
//! ```
//!
//! ## Employee Code Candidates
//! ```text
//! 1. store prefix + 01..99     ACME → AC01, AC02, ... AC99
//! 2. name prefix  + 0..9       "Jane Doe" → JAN0, JAN1, ... JAN9
//! 3. random 4 chars            Q7ZK, 0MF2, ...
//! ```

use chrono::NaiveDateTime;
use rand::Rng;

use crate::error::{CoreError, CoreResult};

/// Highest invoice sequence a store can issue per day.
pub const MAX_DAILY_INVOICE_SEQUENCE: u32 = 999;

/// Width of the store and employee segments of an invoice number.
const SEGMENT_WIDTH: usize = 4;

const PAD: char = 'X';

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Normalizes `raw` to exactly `width` upper-case alphanumeric characters.
fn fixed_segment(raw: &str, width: usize) -> String {
    let mut out: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .take(width)
        .collect();
    while out.len() < width {
        out.push(PAD);
    }
    out
}

/// Zero-pads a daily sequence to three digits.
///
/// ## Example
/// ```rust
/// use ledger_core::identifier::format_sequence;
///
/// assert_eq!(format_sequence(7).unwrap(), "007");
/// assert!(format_sequence(1000).is_err());
/// ```
pub fn format_sequence(sequence: u32) -> CoreResult<String> {
    if sequence == 0 || sequence > MAX_DAILY_INVOICE_SEQUENCE {
        return Err(CoreError::SequenceOutOfRange {
            value: sequence,
            max: MAX_DAILY_INVOICE_SEQUENCE,
        });
    }
    Ok(format!("{:03}", sequence))
}

/// Builds `STORE4-EMP4-YYYYMMDDHHmmss-SEQ3`.
///
/// ## Example
/// ```rust
/// use chrono::NaiveDate;
/// use ledger_core::identifier::format_invoice_number;
///
/// let at = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap().and_hms_opt(14, 30, 5).unwrap();
/// let number = format_invoice_number("acme", "jd1", at, 7).unwrap();
/// assert_eq!(number, "ACME-JD1X-20240315143005-007");
/// ```
pub fn format_invoice_number(
    store_code: &str,
    employee_code: &str,
    issued_at: NaiveDateTime,
    sequence: u32,
) -> CoreResult<String> {
    Ok(format!(
        "{}-{}-{}-{}",
        fixed_segment(store_code, SEGMENT_WIDTH),
        fixed_segment(employee_code, SEGMENT_WIDTH),
        issued_at.format("%Y%m%d%H%M%S"),
        format_sequence(sequence)?
    ))
}

/// First-choice employee codes: two characters of the store code plus
/// a two digit suffix, `01` through `99`.
pub fn store_code_candidates(store_code: &str) -> impl Iterator<Item = String> {
    let prefix = fixed_segment(store_code, 2);
    (1..=99u32).map(move |n| format!("{}{:02}", prefix, n))
}

/// Second-choice employee codes: three characters of the employee's name
/// plus one digit, `0` through `9`.
pub fn name_code_candidates(name: &str) -> impl Iterator<Item = String> {
    let prefix = fixed_segment(name, 3);
    (0..=9u32).map(move |n| format!("{}{}", prefix, n))
}

/// Last-resort employee code: four random letters or digits.
pub fn random_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..SEGMENT_WIDTH)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap()
    }

    #[test]
    fn test_invoice_number_layout() {
        let n = format_invoice_number("Main Street", "AC01", at(), 1).unwrap();
        assert_eq!(n, "MAIN-AC01-20240102030405-001");
    }

    #[test]
    fn test_short_segments_are_padded() {
        let n = format_invoice_number("a-b", "7", at(), 999).unwrap();
        assert_eq!(n, "ABXX-7XXX-20240102030405-999");
    }

    #[test]
    fn test_sequence_bounds() {
        assert!(format_sequence(0).is_err());
        assert_eq!(format_sequence(999).unwrap(), "999");
        assert!(matches!(
            format_sequence(1000),
            Err(CoreError::SequenceOutOfRange { value: 1000, max: 999 })
        ));
    }

    #[test]
    fn test_store_candidates() {
        let all: Vec<String> = store_code_candidates("acme").collect();
        assert_eq!(all.len(), 99);
        assert_eq!(all[0], "AC01");
        assert_eq!(all[98], "AC99");
    }

    #[test]
    fn test_name_candidates() {
        let all: Vec<String> = name_code_candidates("Jo").collect();
        assert_eq!(all.first().map(String::as_str), Some("JOX0"));
        assert_eq!(all.len(), 10);
    }

    #[test]
    fn test_random_code_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let code = random_code(&mut rng);
            assert_eq!(code.len(), 4);
            assert!(code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }
}
