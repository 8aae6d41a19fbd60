//! Loose comparison of measurement and rule values
//!
//! Values reach the core from several producers: JSON front-ends store
//! qualitative value ids as strings, the persistence layer as numbers,
//! and some callers pass the whole qualitative value object. Comparisons
//! therefore go through [`value_equals`] rather than `==`.

use serde_json::Value;

/// Compare two values the way measurement values are compared
///
/// - `null` equals `null`
/// - identical values are equal
/// - numbers and numeric strings compare by numeric value (`"1"`, `"1.0"`, `1`)
/// - objects carrying an `id` compare by that id
///
/// # Examples
/// ```
/// use catchtree_common::values::value_equals;
/// use serde_json::json;
///
/// assert!(value_equals(&json!("12"), &json!(12)));
/// assert!(value_equals(&json!({"id": 3, "label": "LAN"}), &json!("3")));
/// assert!(!value_equals(&json!("LAN"), &json!("DIS")));
/// ```
pub fn value_equals(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    if a.is_null() || b.is_null() {
        return false;
    }

    if let (Some(x), Some(y)) = (as_number(a), as_number(b)) {
        return x == y;
    }

    let a = reference_id(a);
    let b = reference_id(b);
    match (a, b) {
        (Value::Object(_), _) | (_, Value::Object(_)) => false,
        (a, b) if a == b => true,
        (a, b) => match (as_number(a), as_number(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
    }
}

/// True when a value carries no information (`null`, blank string, empty list)
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Replace an object carrying an `id` by that id
fn reference_id(value: &Value) -> &Value {
    match value {
        Value::Object(map) => map.get("id").filter(|id| !id.is_null()).unwrap_or(value),
        other => other,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}
