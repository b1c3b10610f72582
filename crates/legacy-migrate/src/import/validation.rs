//! Pre-insert record validation against a table's declared rules.

use serde_json::Value;

use crate::catalog::TableSpec;
use crate::core::record::is_numeric;
use crate::core::Record;
use crate::transform::missing_required_field;

/// Check a raw record against `spec`. Returns the first problem found.
pub fn validate_record(spec: &TableSpec, record: &Record) -> Result<(), String> {
    if let Some(field) = missing_required_field(spec, record) {
        return Err(format!("missing required field '{}'", field));
    }

    for field in &spec.numeric_fields {
        match record.get(field) {
            None | Some(Value::Null) => {}
            Some(value) if is_numeric(value) => {}
            Some(value) => return Err(format!("field '{}' is not numeric: {}", field, value)),
        }
    }

    for field in &spec.json_fields {
        if let Some(Value::String(text)) = record.get(field) {
            if serde_json::from_str::<Value>(text).is_err() {
                return Err(format!("field '{}' is not valid JSON", field));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn events() -> TableSpec {
        TableSpec::new("events", "events")
            .required(&["title"])
            .numeric(&["capacity"])
            .json(&["location_details"])
    }

    fn row(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_valid_record() {
        let record = row(json!({
            "title": "Meetup",
            "capacity": "40",
            "location_details": "{\"room\": 2}"
        }));
        assert!(validate_record(&events(), &record).is_ok());
        assert!(validate_record(&events(), &row(json!({"title": "x", "capacity": null}))).is_ok());
    }

    #[test]
    fn test_invalid_records() {
        let missing = row(json!({"capacity": 3}));
        assert_eq!(
            validate_record(&events(), &missing).unwrap_err(),
            "missing required field 'title'"
        );

        let not_numeric = row(json!({"title": "x", "capacity": "many"}));
        assert!(validate_record(&events(), &not_numeric)
            .unwrap_err()
            .contains("not numeric"));

        let bad_json = row(json!({"title": "x", "location_details": "{room"}));
        assert!(validate_record(&events(), &bad_json)
            .unwrap_err()
            .contains("not valid JSON"));
    }
}
