//! Raw field map to canonical `Record` normalization.
//!
//! Pure functions, no side effects: testable with literal field maps.

use std::collections::BTreeMap;

use crate::models::Record;

/// Normalized key the identity value is looked up under, by convention the
/// source's registration-number column.
pub const DEFAULT_IDENTITY_FIELD: &str = "registration_no";

/// Slug-normalize a field label: lowercase, whitespace and `/` become `_`,
/// remaining punctuation is dropped.
pub fn normalize_key(raw: &str) -> String {
    let mut key = String::with_capacity(raw.len());
    for ch in raw.trim().to_lowercase().chars() {
        if ch.is_whitespace() || ch == '/' {
            key.push('_');
        } else if ch.is_alphanumeric() || ch == '_' {
            key.push(ch);
        }
    }
    key
}

/// Derive the identity key from a raw identity value by stripping `/` and
/// whitespace, so the key is stable across formatting variations and safe
/// as a document id.
fn identity_key(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '/')
        .collect()
}

/// Map one raw field map to a canonical `Record`.
///
/// Returns `None` when the identity field is absent or empty after
/// normalization; such records cannot be persisted idempotently and must
/// be dropped by the caller.
pub fn normalize(
    raw: &BTreeMap<String, String>,
    entity_type: &str,
    identity_field: &str,
) -> Option<Record> {
    let mut fields = BTreeMap::new();
    for (key, value) in raw {
        let key = normalize_key(key);
        if !key.is_empty() {
            fields.insert(key, value.trim().to_string());
        }
    }

    let key = fields
        .get(identity_field)
        .map(|value| identity_key(value))
        .unwrap_or_default();
    if key.is_empty() {
        return None;
    }

    Some(Record::new(key, entity_type.to_string(), fields))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_normalize_key_slugs_labels() {
        assert_eq!(normalize_key("Registration No."), "registration_no");
        assert_eq!(normalize_key("Name of Entity"), "name_of_entity");
        assert_eq!(normalize_key("Tel. No/Fax"), "tel_no_fax");
        assert_eq!(normalize_key("  Email "), "email");
    }

    #[test]
    fn test_normalize_builds_record() {
        let record = normalize(
            &raw(&[
                ("Registration No.", "INA/000123 "),
                ("Name", "Acme Advisers"),
            ]),
            "investment_advisers",
            DEFAULT_IDENTITY_FIELD,
        )
        .unwrap();

        assert_eq!(record.identity_key, "INA000123");
        assert_eq!(record.entity_type, "investment_advisers");
        assert_eq!(record.fields["registration_no"], "INA/000123");
        assert_eq!(record.fields["name"], "Acme Advisers");
    }

    #[test]
    fn test_normalize_missing_identity_field() {
        let result = normalize(
            &raw(&[("Name", "Acme Advisers")]),
            "investment_advisers",
            DEFAULT_IDENTITY_FIELD,
        );
        assert!(result.is_none());
    }

    #[test]
    fn test_normalize_empty_identity_value() {
        let result = normalize(
            &raw(&[("Registration No.", "  / ")]),
            "investment_advisers",
            DEFAULT_IDENTITY_FIELD,
        );
        assert!(result.is_none());
    }

    #[test]
    fn test_normalize_custom_identity_field() {
        let record = normalize(
            &raw(&[("License Id", "L-42")]),
            "brokers",
            "license_id",
        )
        .unwrap();
        assert_eq!(record.identity_key, "L-42");
    }

    #[test]
    fn test_normalize_trims_values() {
        let record = normalize(
            &raw(&[("Registration No", "INA1"), ("City", "  Mumbai  ")]),
            "x",
            DEFAULT_IDENTITY_FIELD,
        )
        .unwrap();
        assert_eq!(record.fields["city"], "Mumbai");
    }
}
