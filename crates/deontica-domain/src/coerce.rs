//! Type-tolerant conversions for model-produced JSON
//!
//! Model replies routinely put a number where a string belongs, a single
//! string where a list belongs, or `"0.8"` where `0.8` belongs. These helpers
//! accept the obvious variants and return `None` for anything else, so a
//! caller can leave the field untouched.

use serde_json::Value;

/// Coerce an optional text field
///
/// Returns `Some(None)` to clear the field (null or blank string),
/// `Some(Some(text))` to set it, and `None` when the value has the wrong shape.
pub fn optional_text(value: &Value) -> Option<Option<String>> {
    match value {
        Value::Null => Some(None),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Some(None)
            } else {
                Some(Some(trimmed.to_string()))
            }
        }
        Value::Number(n) => Some(Some(n.to_string())),
        Value::Bool(b) => Some(Some(b.to_string())),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Coerce a list of strings
///
/// A bare string becomes a one-element list and null becomes an empty list.
pub fn text_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Null => Some(Vec::new()),
        Value::String(s) if s.trim().is_empty() => Some(Vec::new()),
        Value::String(s) => Some(vec![s.trim().to_string()]),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|item| match item {
                    Value::Null => None,
                    Value::String(s) if s.trim().is_empty() => None,
                    Value::String(s) => Some(s.trim().to_string()),
                    other => Some(other.to_string()),
                })
                .collect(),
        ),
        _ => None,
    }
}

/// Coerce a list of JSON values; a lone object becomes a one-element list
pub fn value_list(value: &Value) -> Option<Vec<Value>> {
    match value {
        Value::Null => Some(Vec::new()),
        Value::Array(items) => Some(items.clone()),
        Value::Object(_) => Some(vec![value.clone()]),
        _ => None,
    }
}

/// Coerce a confidence score from a number or a numeric string
///
/// Non-finite values are rejected.
pub fn confidence(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}

/// Coerce a boolean flag, falling back to `default` for anything unrecognized
pub fn flag(value: Option<&Value>, default: bool) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => true,
            "false" | "no" | "0" => false,
            _ => default,
        },
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(default),
        _ => default,
    }
}
