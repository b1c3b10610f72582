//! MySQL `INSERT` statements, one per record.

use serde_json::Value;

use crate::core::record::value_to_text;
use crate::core::Record;

pub(super) fn encode(table: &str, records: &[Record]) -> String {
    let mut out = String::new();
    for record in records {
        out.push_str(&insert_statement(table, record));
        out.push('\n');
    }
    out
}

/// ``INSERT INTO `table` (`a`, `b`) VALUES (1, 'x');``
pub fn insert_statement(table: &str, record: &Record) -> String {
    let columns: Vec<String> = record.keys().map(|c| quote_ident(c)).collect();
    let values: Vec<String> = record.values().map(quote_literal).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({});",
        quote_ident(table),
        columns.join(", "),
        values.join(", ")
    )
}

/// Render a value as a MySQL literal.
pub fn quote_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => if *b { "1" } else { "0" }.to_string(),
        Value::Number(n) => n.to_string(),
        other => {
            let text = value_to_text(other).unwrap_or_default();
            format!("'{}'", text.replace('\\', "\\\\").replace('\'', "''"))
        }
    }
}

fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insert_statement() {
        let record = json!({"id": 3, "name": "O'Brien", "bio": null, "is_active": true})
            .as_object()
            .cloned()
            .unwrap();
        assert_eq!(
            insert_statement("users", &record),
            "INSERT INTO `users` (`id`, `name`, `bio`, `is_active`) VALUES (3, 'O''Brien', NULL, 1);"
        );
    }

    #[test]
    fn test_literals() {
        assert_eq!(quote_literal(&json!("a\\b")), r"'a\\b'");
        assert_eq!(quote_literal(&json!(["x"])), r#"'["x"]'"#);
        assert_eq!(quote_literal(&json!(2.5)), "2.5");
    }
}
