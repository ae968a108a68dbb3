//! Value types for the warden store.
//!
//! The value model has exactly three variants:
//! - `Str`: an ASCII string
//! - `List`: a list of values; lists may nest while a program evaluates
//!   expressions, and are deep-flattened at the points the protocol
//!   requires (`return` output, `foreach`/`filtereach` iteration)
//! - `Record`: a flat mapping of string keys to string values; records
//!   never nest
//!
//! Records are stored in a `BTreeMap` so record equality and wire output are
//! deterministic regardless of insertion order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A value held by a variable or produced by an expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    /// An ASCII string.
    Str(String),
    /// A list of values. May nest during evaluation.
    List(Vec<Value>),
    /// A flat record: string keys to string values only.
    Record(BTreeMap<String, String>),
}

impl Value {
    /// Get the type name as a string.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Record(_) => "record",
        }
    }

    /// Check if this is a string value.
    pub fn is_str(&self) -> bool {
        matches!(self, Value::Str(_))
    }

    /// Check if this is a list value.
    pub fn is_list(&self) -> bool {
        matches!(self, Value::List(_))
    }

    /// Check if this is a record value.
    pub fn is_record(&self) -> bool {
        matches!(self, Value::Record(_))
    }

    /// Get as `&str` if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Get as a slice if this is a list value.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Get as the underlying map if this is a record value.
    pub fn as_record(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            Value::Record(fields) => Some(fields),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<BTreeMap<String, String>> for Value {
    fn from(fields: BTreeMap<String, String>) -> Self {
        Value::Record(fields)
    }
}

impl From<Value> for serde_json::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::Str(s) => serde_json::Value::String(s),
            Value::List(items) => {
                serde_json::Value::Array(items.into_iter().map(serde_json::Value::from).collect())
            }
            Value::Record(fields) => serde_json::Value::Object(
                fields
                    .into_iter()
                    .map(|(k, s)| (k, serde_json::Value::String(s)))
                    .collect(),
            ),
        }
    }
}

/// Deep-flatten a list of values.
///
/// Nested lists are spliced into the output in order; strings and records
/// pass through unchanged. `foreach`/`filtereach` iterate the flattened
/// form, and `return` emits it.
pub fn flatten(values: Vec<Value>) -> Vec<Value> {
    let mut out = Vec::with_capacity(values.len());
    flatten_into(&mut out, values);
    out
}

fn flatten_into(out: &mut Vec<Value>, values: Vec<Value>) {
    for value in values {
        match value {
            Value::List(items) => flatten_into(out, items),
            other => out.push(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, &str)]) -> Value {
        Value::Record(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_type_names() {
        assert_eq!(Value::Str("a".into()).type_name(), "string");
        assert_eq!(Value::List(vec![]).type_name(), "list");
        assert_eq!(record(&[]).type_name(), "record");
    }

    #[test]
    fn test_accessors() {
        let v = Value::Str("hello".into());
        assert!(v.is_str());
        assert_eq!(v.as_str(), Some("hello"));
        assert!(v.as_list().is_none());

        let l = Value::List(vec![Value::Str("a".into())]);
        assert!(l.is_list());
        assert_eq!(l.as_list().map(|s| s.len()), Some(1));

        let r = record(&[("fst", "a")]);
        assert!(r.is_record());
        assert_eq!(r.as_record().and_then(|m| m.get("fst")).map(String::as_str), Some("a"));
    }

    #[test]
    fn test_record_equality_ignores_insertion_order() {
        let a = record(&[("x", "1"), ("y", "2")]);
        let b = record(&[("y", "2"), ("x", "1")]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_flatten_passes_scalars_through() {
        let items = vec![Value::Str("a".into()), record(&[("k", "v")])];
        assert_eq!(flatten(items.clone()), items);
    }

    #[test]
    fn test_flatten_splices_nested_lists() {
        let nested = vec![
            Value::Str("a".into()),
            Value::List(vec![
                Value::Str("b".into()),
                Value::List(vec![Value::Str("c".into())]),
            ]),
            Value::Str("d".into()),
        ];
        let flat = flatten(nested);
        assert_eq!(
            flat,
            vec![
                Value::Str("a".into()),
                Value::Str("b".into()),
                Value::Str("c".into()),
                Value::Str("d".into()),
            ]
        );
    }

    #[test]
    fn test_flatten_empty_lists_vanish() {
        let nested = vec![Value::List(vec![]), Value::List(vec![Value::List(vec![])])];
        assert!(flatten(nested).is_empty());
    }

    #[test]
    fn test_json_string() {
        let json = serde_json::Value::from(Value::Str("hi".into()));
        assert_eq!(json, serde_json::json!("hi"));
    }

    #[test]
    fn test_json_list_of_strings_and_records() {
        let v = Value::List(vec![Value::Str("a".into()), record(&[("fst", "x"), ("snd", "y")])]);
        let json = serde_json::Value::from(v);
        assert_eq!(json, serde_json::json!(["a", {"fst": "x", "snd": "y"}]));
    }

    #[test]
    fn test_json_record_values_are_strings() {
        let json = serde_json::Value::from(record(&[("k", "v")]));
        assert_eq!(json, serde_json::json!({"k": "v"}));
    }
}
