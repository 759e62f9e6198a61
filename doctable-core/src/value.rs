//! Comparison and identity helpers for JSON values.
//!
//! [`Comparable`] gives JSON values the loose comparison semantics queries rely on:
//! integers and floats compare numerically, objects and arrays compare structurally,
//! and values of different kinds are simply unordered. [`Frozen`] is the hashable,
//! ordered snapshot of a value used inside query identities.

use serde_json::Value;
use std::{cmp::Ordering, collections::HashMap, fmt};

/// Borrowed, comparable view of a JSON value.
///
/// All numbers are normalized to `f64` so that `1` and `1.0` compare equal.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// Numeric value (all integers and floats normalized to f64)
    Number(f64),
    /// String value
    String(&'a str),
    /// Array of comparable values
    Array(Vec<Comparable<'a>>),
    /// Map/Object of comparable values
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl<'a> From<&'a Value> for Comparable<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::Null => Comparable::Null,
            Value::Bool(value) => Comparable::Bool(*value),
            Value::Number(number) => Comparable::Number(number.as_f64().unwrap_or(f64::NAN)),
            Value::String(value) => Comparable::String(value),
            Value::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Value::Object(map) => Comparable::Map(
                map
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>()
            ),
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            (Comparable::Array(a), Comparable::Array(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Loose equality between two JSON values.
pub(crate) fn values_equal(left: &Value, right: &Value) -> bool {
    Comparable::from(left) == Comparable::from(right)
}

/// Ordering between two JSON values, `None` when they are not comparable.
pub(crate) fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    Comparable::from(left).partial_cmp(&Comparable::from(right))
}

/// Whether `needle` is loosely equal to any item of `haystack`.
pub(crate) fn contains_value(haystack: &[Value], needle: &Value) -> bool {
    haystack.iter().any(|item| values_equal(item, needle))
}

/// An immutable, hashable and totally ordered snapshot of a JSON value.
///
/// The snapshot is the value's canonical JSON text: object keys are emitted in sorted
/// order, so two structurally equal values always freeze to the same snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Frozen(String);

impl Frozen {
    /// Returns the canonical JSON text of the frozen value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&Value> for Frozen {
    fn from(value: &Value) -> Self {
        Frozen(value.to_string())
    }
}

impl fmt::Display for Frozen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numbers_compare_across_representations() {
        assert!(values_equal(&json!(1), &json!(1.0)));
        assert_eq!(compare_values(&json!(2), &json!(1.5)), Some(Ordering::Greater));
    }

    #[test]
    fn test_mixed_kinds_are_unordered() {
        assert_eq!(compare_values(&json!("a"), &json!(1)), None);
        assert_eq!(compare_values(&json!(null), &json!(null)), None);
        assert!(!values_equal(&json!("1"), &json!(1)));
    }

    #[test]
    fn test_nested_structures_compare_structurally() {
        assert!(values_equal(&json!({"a": [1, 2], "b": null}), &json!({"b": null, "a": [1.0, 2]})));
        assert!(!values_equal(&json!([1, 2]), &json!([2, 1])));
    }

    #[test]
    fn test_frozen_is_key_order_independent() {
        let left = json!({"a": 1, "b": {"c": true}});
        let right: Value = serde_json::from_str(r#"{"b": {"c": true}, "a": 1}"#).unwrap();

        assert_eq!(Frozen::from(&left), Frozen::from(&right));
        assert_eq!(Frozen::from(&left).as_str(), r#"{"a":1,"b":{"c":true}}"#);
    }
}
