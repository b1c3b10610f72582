//! Per-table transformation rules.

use serde::Serialize;

/// Column name segments that mark a 0/1 column as boolean when the table
/// does not declare it explicitly.
pub const BOOLEAN_NAME_SEGMENTS: &[&str] = &["active", "enabled", "published", "verified", "deleted"];

/// Rules for one legacy table and its target counterpart.
///
/// Built once when the catalog is assembled and never mutated afterwards.
/// Every per-field decision in the transformer is a lookup on this struct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSpec {
    /// Table name in the legacy schema.
    pub legacy_name: String,
    /// Table name in the target schema.
    pub target_name: String,
    /// Primary key column (used for ordering and skip-existing).
    pub primary_key: String,
    /// Fields that must be present and non-empty.
    pub required_fields: Vec<String>,
    /// Fields holding 0/1 flags.
    pub boolean_fields: Vec<String>,
    /// Fields holding JSON documents stored as text.
    pub json_fields: Vec<String>,
    /// Fields that must be numeric (anything else becomes null).
    pub numeric_fields: Vec<String>,
    /// Target tables this table references through foreign keys.
    pub depends_on: Vec<String>,
}

impl TableSpec {
    /// Create a spec with no field rules and `id` as primary key.
    pub fn new(legacy_name: impl Into<String>, target_name: impl Into<String>) -> Self {
        Self {
            legacy_name: legacy_name.into(),
            target_name: target_name.into(),
            primary_key: "id".to_string(),
            required_fields: Vec::new(),
            boolean_fields: Vec::new(),
            json_fields: Vec::new(),
            numeric_fields: Vec::new(),
            depends_on: Vec::new(),
        }
    }

    pub fn required(mut self, fields: &[&str]) -> Self {
        self.required_fields = to_owned(fields);
        self
    }

    pub fn booleans(mut self, fields: &[&str]) -> Self {
        self.boolean_fields = to_owned(fields);
        self
    }

    pub fn json(mut self, fields: &[&str]) -> Self {
        self.json_fields = to_owned(fields);
        self
    }

    pub fn numeric(mut self, fields: &[&str]) -> Self {
        self.numeric_fields = to_owned(fields);
        self
    }

    pub fn depends_on(mut self, tables: &[&str]) -> Self {
        self.depends_on = to_owned(tables);
        self
    }

    pub fn is_json(&self, column: &str) -> bool {
        self.json_fields.iter().any(|f| f == column)
    }

    pub fn is_numeric(&self, column: &str) -> bool {
        self.numeric_fields.iter().any(|f| f == column)
    }

    /// Whether a column carries boolean flags.
    ///
    /// Declared boolean fields always match. Otherwise one of the column's
    /// `_`-separated segments must equal a word in [`BOOLEAN_NAME_SEGMENTS`],
    /// so `is_active` matches while `deactivated_by_id` does not.
    pub fn is_boolean(&self, column: &str) -> bool {
        self.boolean_fields.iter().any(|f| f == column) || has_boolean_segment(column)
    }

    /// Whether validation has anything to check for this table.
    pub fn has_validation_rules(&self) -> bool {
        !self.required_fields.is_empty()
            || !self.numeric_fields.is_empty()
            || !self.json_fields.is_empty()
    }
}

/// Segment match against the boolean word list.
pub fn has_boolean_segment(column: &str) -> bool {
    column
        .to_ascii_lowercase()
        .split('_')
        .any(|segment| BOOLEAN_NAME_SEGMENTS.contains(&segment))
}

fn to_owned(fields: &[&str]) -> Vec<String> {
    fields.iter().map(|f| f.to_string()).collect()
}
