//! # Attribute Trees
//!
//! User input for `new`, `create` and `update` arrives as an [`AttributeTree`]:
//! an insertion-ordered map from attribute name to [`AttrValue`]. Values nest,
//! so a tree can carry child records under `<association>_attributes` keys.
//!
//! Trees convert from `serde_json::Value`, which is how presentation layers
//! usually hand parameters over.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::cmp::Ordering;

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttrValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    List(Vec<AttrValue>),
    Tree(AttributeTree),
}

impl AttrValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_tree(&self) -> Option<&AttributeTree> {
        match self {
            AttrValue::Tree(t) => Some(t),
            _ => None,
        }
    }

    /// Null, empty text and empty collections.
    pub fn is_blank(&self) -> bool {
        match self {
            AttrValue::Null => true,
            AttrValue::Text(s) => s.trim().is_empty(),
            AttrValue::List(items) => items.is_empty(),
            AttrValue::Tree(tree) => tree.is_empty(),
            _ => false,
        }
    }

    /// Numeric view used for comparisons; decimal text counts as a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Integer(i) => Some(*i as f64),
            AttrValue::Float(f) => Some(*f),
            AttrValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Orders two values of compatible kinds. Numbers compare numerically
    /// (including numeric text), dates chronologically, text lexically.
    pub fn compare(&self, other: &AttrValue) -> Option<Ordering> {
        use AttrValue::*;
        match (self, other) {
            (Null, Null) => Some(Ordering::Equal),
            (Bool(a), Bool(b)) => Some(a.cmp(b)),
            (Date(a), Date(b)) => Some(a.cmp(b)),
            (DateTime(a), DateTime(b)) => Some(a.cmp(b)),
            (Date(a), DateTime(b)) => a.and_hms_opt(0, 0, 0).map(|a| a.cmp(b)),
            (DateTime(a), Date(b)) => b.and_hms_opt(0, 0, 0).map(|b| a.cmp(&b)),
            (Text(a), Text(b)) => match (self.as_f64(), other.as_f64()) {
                (Some(x), Some(y)) => x.partial_cmp(&y),
                _ => Some(a.cmp(b)),
            },
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(x), Some(y)) => x.partial_cmp(&y),
                _ => None,
            },
        }
    }

    pub fn matches(&self, other: &AttrValue) -> bool {
        self.compare(other) == Some(Ordering::Equal)
    }
}

impl From<serde_json::Value> for AttrValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => AttrValue::Null,
            Value::Bool(b) => AttrValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => AttrValue::Integer(i),
                None => AttrValue::Float(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => AttrValue::Text(s),
            Value::Array(items) => AttrValue::List(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => AttrValue::Tree(map.into_iter().collect()),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Text(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Text(s)
    }
}

impl From<i64> for AttrValue {
    fn from(i: i64) -> Self {
        AttrValue::Integer(i)
    }
}

impl From<i32> for AttrValue {
    fn from(i: i32) -> Self {
        AttrValue::Integer(i64::from(i))
    }
}

impl From<u64> for AttrValue {
    fn from(i: u64) -> Self {
        i64::try_from(i).map_or(AttrValue::Float(i as f64), AttrValue::Integer)
    }
}

impl From<f64> for AttrValue {
    fn from(f: f64) -> Self {
        AttrValue::Float(f)
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        AttrValue::Bool(b)
    }
}

impl From<AttributeTree> for AttrValue {
    fn from(tree: AttributeTree) -> Self {
        AttrValue::Tree(tree)
    }
}

/// Insertion-ordered attribute map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeTree {
    entries: Vec<(String, AttrValue)>,
}

impl AttributeTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts or replaces, keeping the original position of an existing key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<AttrValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn remove(&mut self, key: &str) -> Option<AttrValue> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Returns `self` overlaid with `other`; keys in `other` win.
    pub fn merged(&self, other: &AttributeTree) -> AttributeTree {
        let mut out = self.clone();
        for (k, v) in other.iter() {
            out.insert(k, v.clone());
        }
        out
    }

    /// Keeps only the listed keys, in the tree's own order.
    pub fn project(&self, columns: &[String]) -> AttributeTree {
        self.iter()
            .filter(|(k, _)| columns.iter().any(|c| c == k))
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }
}

impl<K: Into<String>, V: Into<AttrValue>> FromIterator<(K, V)> for AttributeTree {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut tree = AttributeTree::new();
        for (k, v) in iter {
            tree.insert(k, v);
        }
        tree
    }
}

impl From<serde_json::Value> for AttributeTree {
    /// Objects become trees; anything else yields an empty tree.
    fn from(value: serde_json::Value) -> Self {
        match AttrValue::from(value) {
            AttrValue::Tree(tree) => tree,
            _ => AttributeTree::new(),
        }
    }
}

impl Serialize for AttributeTree {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_objects_keep_insertion_order() {
        let tree = AttributeTree::from(json!({"zeta": 1, "alpha": "a", "mid": true}));
        assert_eq!(tree.keys().collect::<Vec<_>>(), vec!["zeta", "alpha", "mid"]);

        let parsed: serde_json::Value =
            serde_json::from_str(r#"{"zeta": 1, "alpha": {"y": 2, "b": 3}}"#).unwrap();
        let tree = AttributeTree::from(parsed);
        assert_eq!(tree.keys().collect::<Vec<_>>(), vec!["zeta", "alpha"]);
        let nested = tree.get("alpha").and_then(AttrValue::as_tree).unwrap();
        assert_eq!(nested.keys().collect::<Vec<_>>(), vec!["y", "b"]);

        assert_eq!(
            serde_json::to_string(&tree).unwrap(),
            r#"{"zeta":1,"alpha":{"y":2,"b":3}}"#
        );
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut tree = AttributeTree::new().with("a", 1).with("b", 2);
        tree.insert("a", 3);
        assert_eq!(tree.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(tree.get("a"), Some(&AttrValue::Integer(3)));
    }

    #[test]
    fn test_converts_nested_json() {
        let tree = AttributeTree::from(json!({
            "name": "Widget",
            "line_items_attributes": [{"quantity": 2}]
        }));
        let AttrValue::List(items) = tree.get("line_items_attributes").unwrap() else {
            panic!("expected list");
        };
        assert_eq!(
            items[0].as_tree().and_then(|t| t.get("quantity")),
            Some(&AttrValue::Integer(2))
        );
    }

    #[test]
    fn test_merged_prefers_the_overlay() {
        let defaults = AttributeTree::new().with("status", "draft").with("qty", 1);
        let input = AttributeTree::new().with("qty", 5);
        let merged = defaults.merged(&input);
        assert_eq!(merged.get("status"), Some(&AttrValue::from("draft")));
        assert_eq!(merged.get("qty"), Some(&AttrValue::Integer(5)));
    }

    #[test]
    fn test_numeric_text_compares_numerically() {
        let a = AttrValue::from("9.5");
        let b = AttrValue::from("12.50");
        assert_eq!(a.compare(&b), Some(Ordering::Less));
        assert!(AttrValue::Integer(12).matches(&AttrValue::from("12")));
        assert_eq!(AttrValue::from("b").compare(&AttrValue::from("a")), Some(Ordering::Greater));
    }

    #[test]
    fn test_serializes_as_plain_json() {
        let tree = AttributeTree::new()
            .with("name", "Widget")
            .with("on", AttrValue::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()));
        assert_eq!(
            serde_json::to_value(&tree).unwrap(),
            json!({"name": "Widget", "on": "2024-03-01"})
        );
    }
}
