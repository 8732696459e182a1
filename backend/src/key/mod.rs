//! Key extraction.
//!
//! The key is the value of one designated field (by default `id`) of a
//! normalized record. It defines the join predicate for reconciliation.

use crate::models::{Key, NormalizedRecord};

/// Canonical key field name.
pub const DEFAULT_KEY_FIELD: &str = "id";

/// Key of a record under the default `id` field.
pub fn key_of(record: &NormalizedRecord) -> Key {
    key_of_field(record, DEFAULT_KEY_FIELD)
}

/// Key of a record under a named field. Missing or null yields [`Key::Absent`].
pub fn key_of_field(record: &NormalizedRecord, field: &str) -> Key {
    match record.value(field) {
        Some(v) => Key::Value(v.to_string()),
        None => Key::Absent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Record;
    use crate::normalize::normalize;

    #[test]
    fn test_returns_id_field() {
        let record = normalize(Record::new().with("id", "123").with("name", "Goku"));
        assert_eq!(key_of(&record), Key::Value("123".into()));
    }

    #[test]
    fn test_absent_without_id() {
        let record = normalize(Record::new().with("name", "Goku"));
        assert_eq!(key_of(&record), Key::Absent);

        let record = normalize(Record::new().with_null("id"));
        assert!(key_of(&record).is_absent());
    }

    #[test]
    fn test_key_sees_normalized_value() {
        let record = normalize(Record::new().with("id", " AB-7 "));
        assert_eq!(key_of(&record), Key::Value("ab-7".into()));
    }

    #[test]
    fn test_custom_field() {
        let record = normalize(Record::new().with("sku", "X1").with("id", "9"));
        assert_eq!(key_of_field(&record, "sku"), Key::Value("x1".into()));
    }

    #[test]
    fn test_empty_string_is_a_key() {
        let record = normalize(Record::new().with("id", "   "));
        assert_eq!(key_of(&record), Key::Value(String::new()));
    }
}
