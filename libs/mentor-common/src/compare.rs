//! Deep structural equality for test-case outputs.
//!
//! Comparison semantics:
//! - sequences compare positionally (element order matters)
//! - objects compare by key-value pairs regardless of key order
//! - numbers compare by numeric value (`2 == 2.0`)
//! - scalar comparison is otherwise type-sensitive (`2 != "2"`)

use serde_json::Value;

/// Compare two JSON values for deep structural equality.
pub fn deep_equal(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => {
            // Integer 2 and float 2.0 are distinct serde_json numbers but the
            // same value to a submission; compare numerically.
            match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x == y,
                _ => a == b,
            }
        }
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| deep_equal(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, value)| b.get(key).is_some_and(|other| deep_equal(value, other)))
        }
        _ => false,
    }
}
