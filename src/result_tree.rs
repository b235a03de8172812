//! Nested result values assembled by summary consumers
//!
//! [`ResultData`] is a small sum type: an ordered `List`, a string-keyed
//! `Map`, or a scalar `Value`. Consumers build a tree bottom-up while
//! finalizing and store it in the run context; it is never mutated after
//! that. Read-only traversal is done either by pattern matching or through
//! [`ResultDataVisitor`].

use serde::Serialize;
use std::collections::BTreeMap;

/// Scalar leaf of a result tree
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResultValue {
    Null,
    Bool(bool),
    Integer(i64),
    Number(f64),
    Text(String),
}

impl ResultValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ResultValue::Integer(v) => Some(*v as f64),
            ResultValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ResultValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

/// A node of a result tree
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResultData {
    List(Vec<ResultData>),
    Map(BTreeMap<String, ResultData>),
    Value(ResultValue),
}

impl ResultData {
    /// An empty list node
    pub fn list() -> Self {
        ResultData::List(Vec::new())
    }

    /// An empty map node
    pub fn map() -> Self {
        ResultData::Map(BTreeMap::new())
    }

    /// Append to a list node; ignored for other variants
    pub fn push(&mut self, item: impl Into<ResultData>) {
        if let ResultData::List(items) = self {
            items.push(item.into());
        }
    }

    /// Insert into a map node; ignored for other variants
    pub fn insert(&mut self, key: impl Into<String>, item: impl Into<ResultData>) {
        if let ResultData::Map(entries) = self {
            entries.insert(key.into(), item.into());
        }
    }

    pub fn get(&self, key: &str) -> Option<&ResultData> {
        match self {
            ResultData::Map(entries) => entries.get(key),
            _ => None,
        }
    }

    pub fn at(&self, index: usize) -> Option<&ResultData> {
        match self {
            ResultData::List(items) => items.get(index),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ResultData]> {
        match self {
            ResultData::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<&ResultValue> {
        match self {
            ResultData::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_value().and_then(ResultValue::as_f64)
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_value().and_then(ResultValue::as_str)
    }

    /// Dispatch to the visitor method matching this node's variant
    pub fn accept<V: ResultDataVisitor>(&self, visitor: &mut V) -> V::Output {
        match self {
            ResultData::List(items) => visitor.visit_list(items),
            ResultData::Map(entries) => visitor.visit_map(entries),
            ResultData::Value(value) => visitor.visit_value(value),
        }
    }
}

impl From<ResultValue> for ResultData {
    fn from(value: ResultValue) -> Self {
        ResultData::Value(value)
    }
}

impl From<&str> for ResultData {
    fn from(value: &str) -> Self {
        ResultData::Value(ResultValue::Text(value.to_string()))
    }
}

impl From<String> for ResultData {
    fn from(value: String) -> Self {
        ResultData::Value(ResultValue::Text(value))
    }
}

impl From<f64> for ResultData {
    fn from(value: f64) -> Self {
        ResultData::Value(ResultValue::Number(value))
    }
}

impl From<i64> for ResultData {
    fn from(value: i64) -> Self {
        ResultData::Value(ResultValue::Integer(value))
    }
}

impl From<u64> for ResultData {
    fn from(value: u64) -> Self {
        ResultData::Value(ResultValue::Integer(value as i64))
    }
}

impl From<bool> for ResultData {
    fn from(value: bool) -> Self {
        ResultData::Value(ResultValue::Bool(value))
    }
}

impl From<Vec<ResultData>> for ResultData {
    fn from(items: Vec<ResultData>) -> Self {
        ResultData::List(items)
    }
}

/// Read-only traversal over a result tree
pub trait ResultDataVisitor {
    type Output;

    fn visit_list(&mut self, items: &[ResultData]) -> Self::Output;

    fn visit_map(&mut self, entries: &BTreeMap<String, ResultData>) -> Self::Output;

    fn visit_value(&mut self, value: &ResultValue) -> Self::Output;
}

/// Converts a result tree into a `serde_json::Value` for template rendering.
///
/// Non-finite numbers become `null`.
pub struct JsonConverter;

impl ResultDataVisitor for JsonConverter {
    type Output = serde_json::Value;

    fn visit_list(&mut self, items: &[ResultData]) -> Self::Output {
        serde_json::Value::Array(items.iter().map(|item| item.accept(self)).collect())
    }

    fn visit_map(&mut self, entries: &BTreeMap<String, ResultData>) -> Self::Output {
        let mut object = serde_json::Map::with_capacity(entries.len());
        for (key, item) in entries {
            object.insert(key.clone(), item.accept(self));
        }
        serde_json::Value::Object(object)
    }

    fn visit_value(&mut self, value: &ResultValue) -> Self::Output {
        match value {
            ResultValue::Null => serde_json::Value::Null,
            ResultValue::Bool(v) => serde_json::Value::Bool(*v),
            ResultValue::Integer(v) => serde_json::Value::from(*v),
            ResultValue::Number(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            ResultValue::Text(v) => serde_json::Value::String(v.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Counts scalar leaves
    struct LeafCounter;

    impl ResultDataVisitor for LeafCounter {
        type Output = usize;

        fn visit_list(&mut self, items: &[ResultData]) -> usize {
            items.iter().map(|i| i.accept(self)).sum()
        }

        fn visit_map(&mut self, entries: &BTreeMap<String, ResultData>) -> usize {
            entries.values().map(|i| i.accept(self)).sum()
        }

        fn visit_value(&mut self, _value: &ResultValue) -> usize {
            1
        }
    }

    fn sample_tree() -> ResultData {
        let mut row = ResultData::list();
        row.push("home");
        row.push(3_u64);
        row.push(0.5);

        let mut root = ResultData::map();
        root.insert("data", row);
        root.insert("isController", false);
        root
    }

    #[test]
    fn test_visitor_traversal() {
        assert_eq!(sample_tree().accept(&mut LeafCounter), 4);
    }

    #[test]
    fn test_accessors() {
        let tree = sample_tree();
        let data = tree.get("data").unwrap();
        assert_eq!(data.at(0).and_then(ResultData::as_str), Some("home"));
        assert_eq!(data.at(1).and_then(ResultData::as_f64), Some(3.0));
        assert!(tree.get("missing").is_none());
    }

    #[test]
    fn test_json_conversion_matches_serde() {
        let tree = sample_tree();
        let via_visitor = tree.accept(&mut JsonConverter);
        let via_serde = serde_json::to_value(&tree).unwrap();
        assert_eq!(via_visitor, via_serde);
        assert_eq!(via_visitor["data"][0], "home");
    }

    #[test]
    fn test_non_finite_numbers_become_null() {
        let value = ResultData::from(f64::NAN);
        assert_eq!(value.accept(&mut JsonConverter), serde_json::Value::Null);
    }
}
