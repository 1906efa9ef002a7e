//! # Document Numbering
//!
//! Purchase orders, receptions, material requests and write-offs get
//! human-readable sequential numbers. The next number is one past the
//! highest numeric suffix already issued under the same prefix, so gaps
//! left by deleted documents are never reused.
//!
//! ```
//! use inventa_core::numbering::{next_number, PURCHASE_ORDER};
//! let next = next_number(PURCHASE_ORDER, ["OC-00000007", "OC-00000002"]);
//! assert_eq!(next, "OC-00000008");
//! ```

use chrono::Datelike;

/// Prefix and zero-padding width of a numbered document kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberFormat {
    /// Leading prefix, e.g. `"OC"`.
    pub prefix: &'static str,
    /// Digits in the zero-padded counter.
    pub width: usize,
}

/// Purchase orders: `OC-00000001`.
pub const PURCHASE_ORDER: NumberFormat = NumberFormat { prefix: "OC", width: 8 };
/// Article receptions: `RART-00000001`.
pub const ARTICLE_RECEPTION: NumberFormat = NumberFormat { prefix: "RART", width: 8 };
/// Asset receptions: `RACT-00000001`.
pub const ASSET_RECEPTION: NumberFormat = NumberFormat { prefix: "RACT", width: 8 };
/// Material requests, numbered per year: `SOL-2026-000001`.
pub const MATERIAL_REQUEST: NumberFormat = NumberFormat { prefix: "SOL", width: 6 };
/// Inventory write-offs: `BAJA-00000001`.
pub const WRITE_OFF: NumberFormat = NumberFormat { prefix: "BAJA", width: 8 };

/// Next sequential number `PREFIX-<counter>` given the numbers already issued.
///
/// Numbers with a different prefix or a non-numeric suffix are ignored.
pub fn next_number<I, S>(format: NumberFormat, existing: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let head = format!("{}-", format.prefix);
    let last = highest_suffix(&head, existing);
    format!("{head}{:0width$}", last + 1, width = format.width)
}

/// Next number in the yearly sequence `PREFIX-YYYY-<counter>`.
///
/// The counter restarts at 1 for each calendar year.
pub fn next_yearly_number<I, S>(format: NumberFormat, date: impl Datelike, existing: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let head = format!("{}-{:04}-", format.prefix, date.year());
    let last = highest_suffix(&head, existing);
    format!("{head}{:0width$}", last + 1, width = format.width)
}

fn highest_suffix<I, S>(head: &str, existing: I) -> u64
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    existing
        .into_iter()
        .filter_map(|n| {
            n.as_ref()
                .strip_prefix(head)
                .filter(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
                .and_then(|rest| rest.parse::<u64>().ok())
        })
        .max()
        .unwrap_or(0)
}
