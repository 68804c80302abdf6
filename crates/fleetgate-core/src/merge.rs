//! Fan-out result merging.
//!
//! Results are folded left to right into an accumulator that starts as
//! [`Value::None`]:
//!
//! | accumulator | result | merged |
//! |-------------|--------|--------|
//! | list        | list   | concatenation |
//! | map         | map    | update, later keys win |
//! | set         | set    | union |
//! | tuple       | tuple  | concatenation |
//! | any         | none   | accumulator unchanged |
//! | any         | other  | result replaces accumulator |
//!
//! The last row drops earlier data when backends disagree on shape, e.g.
//! a list followed by a map leaves only the map.

use crate::value::Value;

/// Merge one backend result into the accumulator.
pub fn merge(accumulator: Value, result: Value) -> Value {
    match (accumulator, result) {
        (Value::List(mut acc), Value::List(res)) => {
            acc.extend(res);
            Value::List(acc)
        }
        (Value::Map(mut acc), Value::Map(res)) => {
            acc.extend(res);
            Value::Map(acc)
        }
        (Value::Set(mut acc), Value::Set(res)) => {
            acc.extend(res);
            Value::Set(acc)
        }
        (Value::Tuple(mut acc), Value::Tuple(res)) => {
            acc.extend(res);
            Value::Tuple(acc)
        }
        (acc, Value::None) => acc,
        (_, res) => res,
    }
}

/// Fold results in call order.
pub fn merge_all<I>(results: I) -> Value
where
    I: IntoIterator<Item = Value>,
{
    results.into_iter().fold(Value::None, merge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Attributes;
    use serde_json::json;

    fn list(items: &[&str]) -> Value {
        Value::List(items.iter().map(|s| Value::from(*s)).collect())
    }

    fn map(value: serde_json::Value) -> Value {
        match value {
            serde_json::Value::Object(m) => Value::Map(m),
            _ => unreachable!(),
        }
    }

    fn set(items: &[&str]) -> Value {
        Value::Set(items.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_lists_concatenate_in_order() {
        let merged = merge_all([list(&["a"]), list(&["b", "c"]), list(&[])]);
        assert_eq!(merged, list(&["a", "b", "c"]));
    }

    #[test]
    fn test_maps_update_later_wins() {
        let merged = merge_all([map(json!({"a": 1, "b": 1})), map(json!({"b": 2}))]);
        assert_eq!(merged, map(json!({"a": 1, "b": 2})));
    }

    #[test]
    fn test_sets_union() {
        let merged = merge_all([set(&["x", "y"]), set(&["y", "z"])]);
        assert_eq!(merged, set(&["x", "y", "z"]));
    }

    #[test]
    fn test_tuples_concatenate() {
        let merged = merge_all([
            Value::Tuple(vec![Value::from("a")]),
            Value::Tuple(vec![Value::from("b")]),
        ]);
        assert_eq!(merged, Value::Tuple(vec![Value::from("a"), Value::from("b")]));
    }

    #[test]
    fn test_incompatible_shapes_replace() {
        let merged = merge_all([list(&["a", "b"]), map(json!({"k": "v"}))]);
        assert_eq!(merged, map(json!({"k": "v"})));

        let merged = merge_all([map(json!({"k": "v"})), list(&[])]);
        assert_eq!(merged, list(&[]));
    }

    #[test]
    fn test_none_results_are_skipped() {
        let merged = merge_all([list(&["a"]), Value::None]);
        assert_eq!(merged, list(&["a"]));
        assert_eq!(merge_all([Value::None, Value::None]), Value::None);
    }

    #[test]
    fn test_falsy_scalars_still_replace() {
        let merged = merge_all([Value::from(true), Value::from(false)]);
        assert_eq!(merged, Value::from(false));
        let merged = merge_all([Value::Map(Attributes::new()), Value::from("")]);
        assert_eq!(merged, Value::from(""));
    }
}
