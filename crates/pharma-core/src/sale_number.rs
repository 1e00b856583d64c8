//! # Sale Numbers
//!
//! Human-readable sale identifiers of the form `PREFIX-YYYYMMDD-NNNN`.
//!
//! ```text
//! VTE-20260301-0001   first sale of 1 March 2026 (UTC)
//! VTE-20260301-0042   forty-second sale of that day
//! VTE-20260301-12345  sequences past 9999 print in full
//! ```
//!
//! The per-day counter itself is allocated by the database
//! (`sale_number_sequences`); this module only formats it.

use chrono::{DateTime, Utc};

/// The UTC calendar day a sale number is counted under, as `YYYYMMDD`.
pub fn sequence_day(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d").to_string()
}

/// Formats a sale number. `day` is the output of [`sequence_day`].
///
/// ```rust
/// use pharma_core::sale_number::format_sale_number;
///
/// assert_eq!(format_sale_number("VTE", "20260301", 7), "VTE-20260301-0007");
/// ```
pub fn format_sale_number(prefix: &str, day: &str, sequence: i64) -> String {
    format!("{}-{}-{:04}", prefix, day, sequence)
}
