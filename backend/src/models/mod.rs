//! Domain models for reconciliation.
//!
//! This module contains the data structures that flow through the core:
//!
//! - [`Record`] - One row of tabular input, field name to optional value
//! - [`NormalizedRecord`] - A record whose values have been cleaned
//! - [`Key`] - The join handle used to match records across sides
//! - [`Difference`] / [`Discrepancy`] - Field-level disagreement for one key
//! - [`ReconciliationResult`] - Output of one reconciliation run
//! - [`Report`] - A stored, identified, timestamped result

use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::ops::Deref;

/// A field value. `None` is the null marker.
pub type Value = Option<String>;

// =============================================================================
// Record
// =============================================================================

/// An ordered mapping from field name to value.
///
/// Field order is the order in which fields were first inserted (for CSV
/// input, the header order). The field set is not guaranteed to be uniform
/// across records of one collection. Lookup and insert by name are O(1).
#[derive(Debug, Clone, Default)]
pub struct Record {
    fields: Vec<(String, Value)>,
    /// Field name to its slot in `fields`.
    slots: HashMap<String, usize>,
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl Eq for Record {}

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field. An existing field keeps its position and takes the new value.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.slots.get(&name).copied() {
            Some(slot) => self.fields[slot].1 = value,
            None => {
                self.slots.insert(name.clone(), self.fields.len());
                self.fields.push((name, value));
            }
        }
    }

    /// Builder-style insert of a non-null value.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, Some(value.into()));
        self
    }

    /// Builder-style insert of a null value.
    pub fn with_null(mut self, name: impl Into<String>) -> Self {
        self.insert(name, None);
        self
    }

    /// Look up a field. `None` means the field is absent; `Some(None)` means null.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.slots.get(name).map(|&slot| &self.fields[slot].1)
    }

    /// Value of a field, treating an absent field as null.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|v| v.as_deref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    /// Field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    /// `(name, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (name, value) in iter {
            record.insert(name, value);
        }
        record
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RecordVisitor;

        impl<'de> Visitor<'de> for RecordVisitor {
            type Value = Record;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object of field names to scalar values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Record, A::Error> {
                let mut record = Record::new();
                while let Some((name, value)) =
                    access.next_entry::<String, serde_json::Value>()?
                {
                    let value = match value {
                        serde_json::Value::Null => None,
                        serde_json::Value::String(s) => Some(s),
                        other => Some(other.to_string()),
                    };
                    record.insert(name, value);
                }
                Ok(record)
            }
        }

        deserializer.deserialize_map(RecordVisitor)
    }
}

/// Mapping-literal dump: `{'id': '2', 'name': 'gohan'}`.
impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", quote(name), literal(value.as_deref()))?;
        }
        f.write_str("}")
    }
}

// =============================================================================
// Normalized Record
// =============================================================================

/// A record whose values have each been cleaned by the normalizer.
///
/// Immutable once built; only [`crate::normalize`] constructs these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct NormalizedRecord(Record);

impl NormalizedRecord {
    pub(crate) fn new(record: Record) -> Self {
        Self(record)
    }

    /// Wrap a record that is already known to be normalized (e.g. re-loaded
    /// from a previous run's output). No cleaning is performed.
    pub fn assume_normalized(record: Record) -> Self {
        Self(record)
    }

    pub fn as_record(&self) -> &Record {
        &self.0
    }

    pub fn into_record(self) -> Record {
        self.0
    }
}

impl Deref for NormalizedRecord {
    type Target = Record;

    fn deref(&self) -> &Record {
        &self.0
    }
}

impl fmt::Display for NormalizedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

// =============================================================================
// Key
// =============================================================================

/// Join handle for matching records across source and target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    /// Value of the key field.
    Value(String),
    /// Key field missing or null.
    Absent,
}

impl Key {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Key::Value(v) => Some(v),
            Key::Absent => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Key::Absent)
    }
}

impl Serialize for Key {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Key::Value(v) => serializer.serialize_str(v),
            Key::Absent => serializer.serialize_none(),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Value(v) => f.write_str(v),
            Key::Absent => f.write_str("<absent>"),
        }
    }
}

// =============================================================================
// Differences
// =============================================================================

/// One field's disagreement between the matched source and target records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Difference {
    pub source: Value,
    pub target: Value,
}

/// All differing fields for one key present on both sides.
///
/// Never built with an empty `differences` map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Discrepancy {
    pub id: Key,
    pub differences: BTreeMap<String, Difference>,
}

/// Mapping-literal dump:
/// `{'id': '1', 'differences': {'tax': {'source': '100', 'target': '999'}}}`.
impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{'id': {}, 'differences': {{", literal(self.id.as_str()))?;
        for (i, (field, diff)) in self.differences.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(
                f,
                "{}: {{'source': {}, 'target': {}}}",
                quote(field),
                literal(diff.source.as_deref()),
                literal(diff.target.as_deref())
            )?;
        }
        f.write_str("}}")
    }
}

// =============================================================================
// Diagnostics
// =============================================================================

/// Which input collection a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Source,
    Target,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Source => write!(f, "source"),
            Side::Target => write!(f, "target"),
        }
    }
}

/// Two records on the same side sharing a key. Row indexes are 0-based
/// positions in that side's input sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Collision {
    pub side: Side,
    pub key: Key,
    pub kept_row: usize,
    pub dropped_row: usize,
}

/// Number of keyless records left out of the comparison, per side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KeylessCount {
    pub source: usize,
    pub target: usize,
}

// =============================================================================
// Results
// =============================================================================

/// Immutable output of one reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationResult {
    /// Field names seen while comparing intersecting records.
    pub fields: BTreeSet<String>,
    /// Records present in source, absent in target.
    #[serde(rename = "missing_in_target")]
    pub source_only: Vec<NormalizedRecord>,
    /// Records present in target, absent in source.
    #[serde(rename = "missing_in_source")]
    pub target_only: Vec<NormalizedRecord>,
    pub discrepancies: Vec<Discrepancy>,
    /// Same-side key collisions.
    pub duplicates: Vec<Collision>,
    /// Keyless records excluded from comparison.
    pub keyless: KeylessCount,
}

impl ReconciliationResult {
    /// True when both sides agree completely.
    pub fn is_clean(&self) -> bool {
        self.source_only.is_empty() && self.target_only.is_empty() && self.discrepancies.is_empty()
    }

    /// One-line outcome, e.g. `1 missing in target, 0 missing in source, 1 discrepancies`.
    pub fn outcome(&self) -> String {
        format!(
            "{} missing in target, {} missing in source, {} discrepancies",
            self.source_only.len(),
            self.target_only.len(),
            self.discrepancies.len()
        )
    }
}

/// A stored reconciliation outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub result: ReconciliationResult,
}

// =============================================================================
// Literal helpers
// =============================================================================

fn literal(value: Option<&str>) -> String {
    match value {
        Some(v) => quote(v),
        None => "None".to_string(),
    }
}

/// Quote a string as a mapping-literal: single quotes unless the text
/// contains a single quote and no double quote.
fn quote(s: &str) -> String {
    let delim = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(delim);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == delim => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(delim);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_keeps_first_position() {
        let mut record = Record::new().with("id", "1").with("name", "goku");
        record.insert("id", Some("2".into()));

        let names: Vec<_> = record.field_names().collect();
        assert_eq!(names, vec!["id", "name"]);
        assert_eq!(record.value("id"), Some("2"));
    }

    #[test]
    fn test_lookup_on_wide_record() {
        let record: Record = (0..5000).map(|i| (format!("f{}", i), Some(i.to_string()))).collect();

        assert_eq!(record.len(), 5000);
        assert_eq!(record.value("f0"), Some("0"));
        assert_eq!(record.value("f4999"), Some("4999"));
        assert!(record.contains("f2500"));
        assert!(!record.contains("f5000"));
        assert_eq!(record.field_names().nth(4999), Some("f4999"));
    }

    #[test]
    fn test_equality_ignores_lookup_state() {
        let mut built = Record::new().with("id", "1").with("name", "goku");
        built.insert("name", Some("gohan".into()));
        let direct = Record::new().with("id", "1").with("name", "gohan");
        assert_eq!(built, direct);
        assert_ne!(direct, Record::new().with("name", "gohan").with("id", "1"));
    }

    #[test]
    fn test_absent_vs_null() {
        let record = Record::new().with_null("tax");
        assert_eq!(record.get("tax"), Some(&None));
        assert_eq!(record.get("name"), None);
        assert_eq!(record.value("tax"), None);
    }

    #[test]
    fn test_record_dump() {
        let record = Record::new().with("id", "2").with("name", "Gohan").with_null("tax");
        assert_eq!(record.to_string(), "{'id': '2', 'name': 'Gohan', 'tax': None}");
    }

    #[test]
    fn test_dump_quotes_apostrophes() {
        let record = Record::new().with("name", "o'neil");
        assert_eq!(record.to_string(), r#"{'name': "o'neil"}"#);

        let record = Record::new().with("name", r#"it's "x""#);
        assert_eq!(record.to_string(), r#"{'name': 'it\'s "x"'}"#);
    }

    #[test]
    fn test_discrepancy_dump() {
        let mut differences = BTreeMap::new();
        differences.insert(
            "tax".to_string(),
            Difference { source: Some("100".into()), target: Some("200".into()) },
        );
        let d = Discrepancy { id: Key::Value("1".into()), differences };
        assert_eq!(
            d.to_string(),
            "{'id': '1', 'differences': {'tax': {'source': '100', 'target': '200'}}}"
        );
    }

    #[test]
    fn test_record_json_preserves_order() {
        let record = Record::new().with("zeta", "1").with("alpha", "2").with_null("mid");
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"zeta":"1","alpha":"2","mid":null}"#);

        let back: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_record_deserialize_stringifies_scalars() {
        let record: Record = serde_json::from_str(r#"{"id": 7, "ok": true}"#).unwrap();
        assert_eq!(record.value("id"), Some("7"));
        assert_eq!(record.value("ok"), Some("true"));
    }

    #[test]
    fn test_result_json_shape() {
        let result = ReconciliationResult {
            source_only: vec![NormalizedRecord::assume_normalized(Record::new().with("id", "2"))],
            ..Default::default()
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["missing_in_target"][0]["id"], "2");
        assert_eq!(json["missing_in_source"].as_array().unwrap().len(), 0);
        assert_eq!(result.outcome(), "1 missing in target, 0 missing in source, 0 discrepancies");
    }
}
