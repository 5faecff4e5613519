//! Open attribute mapping attached to entity records.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Shared, copy-on-write attribute map.
///
/// Two records that were never touched by an attribute fragment share the
/// same allocation, so [`Attributes::ptr_eq`] is a cheap "unchanged" check.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(Arc<Map<String, Value>>);

impl Attributes {
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Numeric attribute; numeric strings (`"21.5"`) are accepted too.
    #[must_use]
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        match self.0.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Whether both values share the same underlying map.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Copy the map, insert every key of `added`, then delete every key of
    /// `removed`.
    #[must_use]
    pub fn merged(&self, added: Option<&Map<String, Value>>, removed: &[String]) -> Self {
        let mut map = (*self.0).clone();
        if let Some(added) = added {
            for (key, value) in added {
                map.insert(key.clone(), value.clone());
            }
        }
        for key in removed {
            map.remove(key);
        }
        Self(Arc::new(map))
    }
}

impl PartialEq for Attributes {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.0 == other.0
    }
}

impl From<Map<String, Value>> for Attributes {
    fn from(map: Map<String, Value>) -> Self {
        Self(Arc::new(map))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(value: Value) -> Attributes {
        value.as_object().cloned().unwrap().into()
    }

    #[test]
    fn should_add_then_remove_keys_when_merging() {
        let base = attrs(json!({"a": 1, "b": 2, "c": 3}));
        let added = json!({"b": 20, "d": 4});
        let merged = base.merged(added.as_object(), &["c".to_string()]);

        assert_eq!(merged, attrs(json!({"a": 1, "b": 20, "d": 4})));
        assert_eq!(base, attrs(json!({"a": 1, "b": 2, "c": 3})));
    }

    #[test]
    fn should_allocate_new_map_when_merging() {
        let base = attrs(json!({"a": 1}));
        let merged = base.merged(None, &[]);
        assert!(!merged.ptr_eq(&base));
        assert_eq!(merged, base);
    }

    #[test]
    fn should_share_map_between_clones() {
        let base = attrs(json!({"a": 1}));
        let clone = base.clone();
        assert!(clone.ptr_eq(&base));
    }

    #[test]
    fn should_read_numbers_and_numeric_strings() {
        let a = attrs(json!({"n": 21.5, "s": "3", "x": "abc"}));
        assert_eq!(a.get_f64("n"), Some(21.5));
        assert_eq!(a.get_f64("s"), Some(3.0));
        assert_eq!(a.get_f64("x"), None);
        assert_eq!(a.get_f64("missing"), None);
    }

    #[test]
    fn should_serialize_as_plain_json_object() {
        let a = attrs(json!({"friendly_name": "Front door", "device_class": "door"}));

        let value = serde_json::to_value(&a).unwrap();
        assert_eq!(value, json!({"friendly_name": "Front door", "device_class": "door"}));

        let back: Attributes = serde_json::from_value(value).unwrap();
        assert_eq!(back, a);
    }
}
