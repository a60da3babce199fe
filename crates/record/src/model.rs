use exn::OptionExt;
use serde_json::{Map, Value};

use crate::error::{ErrorKind, Result};

/// A canonicalized scraped record.
///
/// The payload is kept opaque (whatever shape the upstream scraper produced)
/// apart from the `mal_id` key, which is the stable external identifier the
/// whole pipeline is keyed on. Construction via [`Record::from_raw`] is the
/// only way to obtain one, so every `Record` in the system is guaranteed to
/// be canonical: object keys sorted recursively at every level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    id: u64,
    payload: Value,
}

impl Record {
    /// Canonicalize a raw upstream record.
    ///
    /// Validates that the value is an object carrying an integer `mal_id`,
    /// then normalizes it so that two semantically identical records always
    /// serialize to the same bytes (and therefore the same fingerprint).
    pub fn from_raw(raw: Value) -> Result<Self> {
        let object = raw.as_object().ok_or_raise(|| ErrorKind::NotAnObject)?;
        let id_value = object.get("mal_id").ok_or_raise(|| ErrorKind::MissingField("mal_id"))?;
        let id = id_value.as_u64().ok_or_raise(|| ErrorKind::ParseError {
            field: "mal_id",
            value: id_value.to_string(),
        })?;
        Ok(Self { id, payload: normalize(raw) })
    }

    /// The stable external identifier (`mal_id`).
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The canonical payload.
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Serialize the canonical payload.
    ///
    /// Because the payload was normalized on construction, equal records
    /// produce byte-identical output here.
    pub fn canonical_json(&self) -> String {
        // A Value built from parsed JSON always re-serializes.
        serde_json::to_string(&self.payload).unwrap_or_default()
    }

    /// blake3 fingerprint over the canonical payload.
    ///
    /// Used to detect real content change: re-fetching an unchanged record
    /// yields the same fingerprint even if the upstream reordered keys.
    pub fn fingerprint(&self) -> String {
        blake3::hash(self.canonical_json().as_bytes()).to_string()
    }

    /// Fetch a string field from the payload, if present and non-null.
    pub(crate) fn str_field(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    /// Fetch any field from the payload.
    pub(crate) fn field(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }
}

/// Recursively rebuild a JSON value with object keys in sorted order.
///
/// `serde_json::Map` preserves insertion order by default, so the same
/// record fetched twice can serialize differently if the upstream shuffles
/// keys. Sorting at every level makes serialization order-independent.
fn normalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            let mut sorted = Map::new();
            for (key, inner) in entries {
                sorted.insert(key, normalize(inner));
            }
            Value::Object(sorted)
        },
        Value::Array(items) => Value::Array(items.into_iter().map(normalize).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_order_does_not_change_fingerprint() {
        let a = Record::from_raw(json!({"mal_id": 42, "title": "Cowboy Bebop", "episodes": 26})).unwrap();
        let b = Record::from_raw(json!({"episodes": 26, "mal_id": 42, "title": "Cowboy Bebop"})).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_content_change_changes_fingerprint() {
        let a = Record::from_raw(json!({"mal_id": 42, "episodes": 26})).unwrap();
        let b = Record::from_raw(json!({"mal_id": 42, "episodes": 27})).unwrap();
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_nested_objects_are_normalized() {
        let a = Record::from_raw(json!({"mal_id": 1, "aired": {"to": null, "from": "1998-04-03"}})).unwrap();
        let b = Record::from_raw(json!({"mal_id": 1, "aired": {"from": "1998-04-03", "to": null}})).unwrap();
        assert_eq!(a.canonical_json(), b.canonical_json());
    }

    #[test]
    fn test_missing_id_is_rejected() {
        let err = Record::from_raw(json!({"title": "no id here"})).unwrap_err();
        assert!(matches!(*err, ErrorKind::MissingField("mal_id")));
    }

    #[test]
    fn test_non_object_is_rejected() {
        let err = Record::from_raw(json!([1, 2, 3])).unwrap_err();
        assert!(matches!(*err, ErrorKind::NotAnObject));
    }
}
