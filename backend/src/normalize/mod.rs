//! Record normalization.
//!
//! Every value of a raw [`Record`] is cleaned independently:
//!
//! 1. Null passes through unchanged.
//! 2. Text is trimmed of leading/trailing whitespace.
//! 3. A trimmed value matching `YYYY-MM-DD` that is also a real calendar
//!    date is rewritten as `Wed, 1 January, 2025`.
//! 4. Anything else is lowercased.
//!
//! A value that is already in the rendered date form is left as is, so
//! normalizing twice gives the same record as normalizing once. This keeps
//! its capitals: `Wed, 1 January, 2025` is not lowercased to
//! `wed, 1 january, 2025` as plain text would be.
//!
//! Dates before year 1 (`0000-01-01`) are not valid calendar dates here and
//! are treated as text.
//!
//! # Example
//!
//! ```rust
//! use ledgerdiff::{normalize, Record};
//!
//! let raw = Record::new().with("id", " A1 ").with("booked", "2025-01-01");
//! let clean = normalize(raw);
//!
//! assert_eq!(clean.value("id"), Some("a1"));
//! assert_eq!(clean.value("booked"), Some("Wed, 1 January, 2025"));
//! ```

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{NormalizedRecord, Record};

/// Input pattern for date-like values.
static DATE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date pattern is a valid regex")
});

const INPUT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Earliest accepted calendar year; year 0 and below stay text.
const MIN_YEAR: i32 = 1;

/// Rendered date form: abbreviated weekday, unpadded day, full month, year.
pub const DATE_DISPLAY_FORMAT: &str = "%a, %-d %B, %Y";

/// How a single value was cleaned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    /// Null input.
    Null,
    /// A valid `YYYY-MM-DD` date, rendered in display form.
    Date(String),
    /// Already in display form; kept verbatim.
    Canonical(String),
    /// Plain text, trimmed and lowercased.
    Text {
        value: String,
        /// Set when the value looked like a date but failed calendar validation.
        fallback: Option<DateFallback>,
    },
}

/// Why a date-shaped value was treated as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateFallback {
    pub reason: String,
}

impl Normalized {
    pub fn into_value(self) -> Option<String> {
        match self {
            Normalized::Null => None,
            Normalized::Date(v) | Normalized::Canonical(v) => Some(v),
            Normalized::Text { value, .. } => Some(value),
        }
    }
}

/// Clean a single value, reporting how it was handled.
pub fn normalize_value(value: Option<&str>) -> Normalized {
    let Some(raw) = value else {
        return Normalized::Null;
    };
    let trimmed = raw.trim();

    if DATE_PATTERN.is_match(trimmed) {
        return match NaiveDate::parse_from_str(trimmed, INPUT_DATE_FORMAT) {
            Ok(date) if date.year() >= MIN_YEAR => {
                Normalized::Date(date.format(DATE_DISPLAY_FORMAT).to_string())
            }
            Ok(_) => Normalized::Text {
                value: trimmed.to_lowercase(),
                fallback: Some(DateFallback { reason: "year is out of range".to_string() }),
            },
            Err(e) => Normalized::Text {
                value: trimmed.to_lowercase(),
                fallback: Some(DateFallback { reason: e.to_string() }),
            },
        };
    }

    if is_display_date(trimmed) {
        return Normalized::Canonical(trimmed.to_string());
    }

    Normalized::Text { value: trimmed.to_lowercase(), fallback: None }
}

/// True if `value` is exactly the display rendering of some calendar date.
fn is_display_date(value: &str) -> bool {
    // Cheap shape check before parsing: "Www, D Mmmm, YYYY".
    if value.len() < 14 || value.as_bytes().get(3) != Some(&b',') {
        return false;
    }
    NaiveDate::parse_from_str(value, DATE_DISPLAY_FORMAT)
        .map(|date| date.year() >= MIN_YEAR && date.format(DATE_DISPLAY_FORMAT).to_string() == value)
        .unwrap_or(false)
}

/// Normalize one raw record. Field set and order are preserved.
pub fn normalize(record: Record) -> NormalizedRecord {
    let cleaned = record
        .iter()
        .map(|(name, value)| (name.to_string(), normalize_value(value).into_value()))
        .collect::<Record>();
    NormalizedRecord::new(cleaned)
}

/// Normalize a sequence of raw records.
pub fn normalize_all(records: impl IntoIterator<Item = Record>) -> Vec<NormalizedRecord> {
    records.into_iter().map(normalize).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trims_and_lowercases() {
        let record = Record::new()
            .with("id", " 1 ")
            .with("name", "  GOKU  ")
            .with("info", " Some Mixed CASE ");
        let result = normalize(record);

        assert_eq!(result.value("id"), Some("1"));
        assert_eq!(result.value("name"), Some("goku"));
        assert_eq!(result.value("info"), Some("some mixed case"));
    }

    #[test]
    fn test_parses_valid_dates() {
        let record = Record::new().with("id", "1").with("transaction_date", " 2025-01-01 ");
        let result = normalize(record);
        assert_eq!(result.value("transaction_date"), Some("Wed, 1 January, 2025"));
    }

    #[test]
    fn test_invalid_values_fall_back_to_text() {
        let record = Record::new().with("id", "1").with("not_a_date", " someString ");
        let result = normalize(record);
        assert_eq!(result.value("not_a_date"), Some("somestring"));
    }

    #[test]
    fn test_impossible_date_is_tagged_fallback() {
        match normalize_value(Some("2025-13-40")) {
            Normalized::Text { value, fallback } => {
                assert_eq!(value, "2025-13-40");
                assert!(fallback.is_some());
            }
            other => panic!("expected text fallback, got {:?}", other),
        }
        assert_eq!(normalize_value(Some("2023-02-29")).into_value().as_deref(), Some("2023-02-29"));
    }

    #[test]
    fn test_year_zero_is_text() {
        match normalize_value(Some("0000-01-01")) {
            Normalized::Text { value, fallback } => {
                assert_eq!(value, "0000-01-01");
                assert!(fallback.is_some());
            }
            other => panic!("expected text fallback, got {:?}", other),
        }
        assert_eq!(
            normalize_value(Some("0001-01-01")).into_value().as_deref(),
            Some("Mon, 1 January, 0001")
        );
        assert_eq!(
            normalize_value(Some("Sat, 1 January, 0000")).into_value().as_deref(),
            Some("sat, 1 january, 0000")
        );
    }

    #[test]
    fn test_display_form_keeps_capitals() {
        assert_eq!(
            normalize_value(Some("  Wed, 1 January, 2025 ")),
            Normalized::Canonical("Wed, 1 January, 2025".to_string())
        );
    }

    #[test]
    fn test_loose_date_shapes_are_text() {
        // Single-digit month/day does not match the strict pattern.
        assert_eq!(normalize_value(Some("2025-1-1")).into_value().as_deref(), Some("2025-1-1"));
        assert_eq!(
            normalize_value(Some("2025-01-01T10:00")).into_value().as_deref(),
            Some("2025-01-01t10:00")
        );
    }

    #[test]
    fn test_null_passes_through() {
        let record = Record::new().with_null("tax").with("id", "X");
        let result = normalize(record);
        assert_eq!(result.get("tax"), Some(&None));
        assert_eq!(result.value("id"), Some("x"));
    }

    #[test]
    fn test_idempotent() {
        let record = Record::new()
            .with("id", " AbC ")
            .with("when", "2024-02-29")
            .with("note", "Wed, 1 January, 2025")
            .with("bad", "2025-13-40")
            .with_null("empty");
        let once = normalize(record);
        let twice = normalize(once.clone().into_record());
        assert_eq!(once, twice);
        assert_eq!(once.value("when"), Some("Thu, 29 February, 2024"));
    }

    #[test]
    fn test_wrong_weekday_display_form_is_text() {
        // 1 January 2025 was a Wednesday.
        assert_eq!(
            normalize_value(Some("Mon, 1 January, 2025")).into_value().as_deref(),
            Some("mon, 1 january, 2025")
        );
    }

    #[test]
    fn test_preserves_field_order() {
        let record = Record::new().with("z", "1").with("a", "2");
        let names: Vec<_> = normalize(record).field_names().map(String::from).collect();
        assert_eq!(names, vec!["z", "a"]);
    }
}
