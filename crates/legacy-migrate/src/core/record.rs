//! Record representation shared by every pipeline stage.
//!
//! A record is an ordered JSON object: column name → value. Column order is
//! preserved from the legacy row through transformation to the written file,
//! so CSV headers and SQL column lists follow the source table layout.

use serde_json::{Map, Number, Value};

/// One row, keyed by column name.
pub type Record = Map<String, Value>;

/// Whether a value counts as "missing" for required-field screening.
pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

/// Parse a numeric string into a JSON number, integers first.
pub fn parse_number(s: &str) -> Option<Number> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(Number::from(i));
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .and_then(Number::from_f64)
}

/// Whether a value is a number or a string holding one.
pub fn is_numeric(value: &Value) -> bool {
    match value {
        Value::Number(_) => true,
        Value::String(s) => parse_number(s).is_some(),
        _ => false,
    }
}

/// Interpret a value as a 0/1 flag.
pub fn as_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => match n.as_f64() {
                Some(f) if f == 0.0 => Some(false),
                Some(f) if f == 1.0 => Some(true),
                _ => None,
            },
        },
        Value::String(s) => match s.trim() {
            "0" => Some(false),
            "1" => Some(true),
            _ => None,
        },
        _ => None,
    }
}

/// Render a scalar for text formats; arrays and objects become JSON text.
pub fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Short label of a record for error messages: its primary key when present,
/// otherwise its position.
pub fn record_label(record: &Record, primary_key: &str, index: usize) -> String {
    match record.get(primary_key).and_then(value_to_text) {
        Some(pk) => format!("{}={}", primary_key, pk),
        None => format!("#{}", index + 1),
    }
}
