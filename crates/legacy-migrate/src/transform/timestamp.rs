//! Lenient timestamp coercion.
//!
//! Legacy rows carry dates in whatever shape the old application wrote them.
//! Coercion never fails: a value that cannot be read as a date-time is
//! replaced with "now".

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

/// Canonical output format for every timestamp column.
pub const CANONICAL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"];

/// Whether a column is treated as a timestamp.
pub fn is_timestamp_column(column: &str) -> bool {
    column.ends_with("_at") || column == "created" || column == "modified"
}

/// Format a date-time in the canonical layout.
pub fn format_canonical(ts: NaiveDateTime) -> String {
    ts.format(CANONICAL_FORMAT).to_string()
}

/// Parse a string in any accepted layout.
pub fn parse_timestamp(input: &str) -> Option<NaiveDateTime> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }

    // Offsets are normalised to UTC
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Coerce a value to a canonical timestamp string.
///
/// Nulls stay null. Integers are read as unix epoch seconds. Everything that
/// cannot be parsed becomes `now`.
pub fn coerce_timestamp(value: &Value, now: NaiveDateTime) -> Value {
    let parsed = match value {
        Value::Null => return Value::Null,
        Value::String(s) => parse_timestamp(s),
        Value::Number(n) => n
            .as_i64()
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .map(|dt| dt.naive_utc()),
        _ => None,
    };
    Value::String(format_canonical(parsed.unwrap_or(now)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_timestamp_columns() {
        assert!(is_timestamp_column("created_at"));
        assert!(is_timestamp_column("published_at"));
        assert!(is_timestamp_column("created"));
        assert!(is_timestamp_column("modified"));
        assert!(!is_timestamp_column("created_by"));
        assert!(!is_timestamp_column("status"));
    }

    #[test]
    fn test_accepted_layouts() {
        let cases = [
            ("2020-01-02 03:04:05", "2020-01-02 03:04:05"),
            ("2020-01-02 03:04:05.123456", "2020-01-02 03:04:05"),
            ("2020-01-02T03:04:05", "2020-01-02 03:04:05"),
            ("2020-01-02T03:04:05+02:00", "2020-01-02 01:04:05"),
            ("2020-01-02T03:04:05Z", "2020-01-02 03:04:05"),
            ("2020-01-02", "2020-01-02 00:00:00"),
            ("2020/01/02 03:04:05", "2020-01-02 03:04:05"),
            ("31/12/2019", "2019-12-31 00:00:00"),
        ];
        for (input, expected) in cases {
            assert_eq!(
                coerce_timestamp(&json!(input), now()),
                json!(expected),
                "input {}",
                input
            );
        }
    }

    #[test]
    fn test_epoch_seconds() {
        assert_eq!(
            coerce_timestamp(&json!(0), now()),
            json!("1970-01-01 00:00:00")
        );
    }

    #[test]
    fn test_unparsable_becomes_now() {
        for input in [json!("not a date"), json!("0000-00-00 00:00:00"), json!(""), json!(true)] {
            assert_eq!(coerce_timestamp(&input, now()), json!("2024-05-01 12:00:00"));
        }
    }

    #[test]
    fn test_null_stays_null() {
        assert_eq!(coerce_timestamp(&Value::Null, now()), Value::Null);
    }

    #[test]
    fn test_coercion_is_total() {
        let inputs = [
            "", " ", "2020-13-45", "99999-01-01", "-1", "2020-02-30 25:61:61",
            "\u{0}", "😀", "2020-01-01T", "T12:00", "1e309",
        ];
        for input in inputs {
            let out = coerce_timestamp(&json!(input), now());
            let text = out.as_str().unwrap();
            assert!(NaiveDateTime::parse_from_str(text, CANONICAL_FORMAT).is_ok());
        }
        let out = coerce_timestamp(&json!(i64::MAX), now());
        assert_eq!(out, json!("2024-05-01 12:00:00"));
    }
}
