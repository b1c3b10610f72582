//! Table structure metadata.

use serde::{Deserialize, Serialize};

/// One column as reported by `DESCRIBE <table>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ColumnInfo {
    /// Column name.
    pub field: String,
    /// Full column type, e.g. `varchar(255)` or `tinyint(1)`.
    #[serde(rename = "Type")]
    pub column_type: String,
    /// "YES" or "NO".
    pub null: String,
    /// "PRI", "UNI", "MUL" or empty.
    pub key: String,
    /// Default value, if any.
    pub default: Option<String>,
    /// Extra attributes such as `auto_increment`.
    pub extra: String,
}

impl ColumnInfo {
    /// Create a nullable column with no key or default.
    pub fn new(field: impl Into<String>, column_type: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            column_type: column_type.into(),
            null: "YES".to_string(),
            key: String::new(),
            default: None,
            extra: String::new(),
        }
    }

    /// Mark the column as the auto-increment primary key.
    pub fn primary(mut self) -> Self {
        self.null = "NO".to_string();
        self.key = "PRI".to_string();
        self.extra = "auto_increment".to_string();
        self
    }
}
