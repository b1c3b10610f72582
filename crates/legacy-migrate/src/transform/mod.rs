//! Record transformation from legacy to target conventions.
//!
//! [`RecordTransformer`] converts one legacy record into one target record.
//! Every per-field decision is a lookup on the table's [`TableSpec`]; the
//! transformer itself holds no state besides its mode and an optional fixed
//! "now", which makes it deterministic under test.
//!
//! Per field, the first matching rule wins:
//!
//! 1. null stays null
//! 2. timestamp columns are coerced to `YYYY-MM-DD HH:MM:SS`
//! 3. 0/1 values in boolean columns become `true`/`false`
//! 4. JSON columns holding text are decoded
//! 5. numeric columns are converted or nulled
//! 6. otherwise the mode's fallback applies

mod timestamp;

pub use timestamp::{
    coerce_timestamp, format_canonical, is_timestamp_column, parse_timestamp, CANONICAL_FORMAT,
};

use chrono::{NaiveDateTime, Utc};
use serde_json::Value;

use crate::catalog::TableSpec;
use crate::core::record::{as_flag, is_blank, parse_number, value_to_text, Record};

/// Legacy column renames applied to every table.
const COLUMN_RENAMES: &[(&str, &str)] = &[("created", "created_at"), ("modified", "updated_at")];

/// Columns synthesised as "now" when missing after transformation.
const SYNTHESISED_TIMESTAMPS: &[&str] = &["created_at", "updated_at"];

/// Which pipeline stage the transformer serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformMode {
    /// Incremental import: unmatched values pass through unchanged.
    Import,
    /// Bulk seeding: unmatched scalars are stringified.
    Seed,
    /// Export: no screening, JSON-looking strings are decoded.
    Export,
}

/// Outcome of transforming one record.
#[derive(Debug, Clone, PartialEq)]
pub struct Transformed {
    /// The record in target conventions. Empty when `skip` is set.
    pub record: Record,
    /// The record failed required-field screening and must not be loaded.
    pub skip: bool,
}

impl Transformed {
    fn skipped() -> Self {
        Self {
            record: Record::new(),
            skip: true,
        }
    }
}

/// Converts legacy records into target records.
#[derive(Debug, Clone)]
pub struct RecordTransformer {
    mode: TransformMode,
    now: Option<NaiveDateTime>,
}

impl RecordTransformer {
    pub fn new(mode: TransformMode) -> Self {
        Self { mode, now: None }
    }

    /// Use a fixed timestamp wherever "now" is needed.
    pub fn with_now(mut self, now: NaiveDateTime) -> Self {
        self.now = Some(now);
        self
    }

    pub fn mode(&self) -> TransformMode {
        self.mode
    }

    /// Transform one raw record for `spec`'s table.
    pub fn transform(&self, spec: &TableSpec, raw: &Record) -> Transformed {
        if self.mode != TransformMode::Export && missing_required_field(spec, raw).is_some() {
            return Transformed::skipped();
        }

        let now = self.now.unwrap_or_else(|| Utc::now().naive_utc());
        let mut record = Record::with_capacity(raw.len() + 2);

        for (column, value) in raw {
            let name = target_column_name(column);
            // An explicit target column wins over its legacy alias
            if name != column.as_str() && raw.contains_key(name) {
                continue;
            }
            let coerced = self.coerce_field(spec, name, value, now);
            record.insert(name.to_string(), coerced);
        }

        if self.mode != TransformMode::Export {
            for column in SYNTHESISED_TIMESTAMPS {
                if matches!(record.get(*column), None | Some(Value::Null)) {
                    record.insert(column.to_string(), Value::String(format_canonical(now)));
                }
            }
        }

        Transformed {
            record,
            skip: false,
        }
    }

    fn coerce_field(
        &self,
        spec: &TableSpec,
        column: &str,
        value: &Value,
        now: NaiveDateTime,
    ) -> Value {
        if value.is_null() {
            return Value::Null;
        }

        if is_timestamp_column(column) {
            return coerce_timestamp(value, now);
        }

        if spec.is_boolean(column) {
            if let Some(flag) = as_flag(value) {
                return Value::Bool(flag);
            }
        }

        if let Value::String(text) = value {
            let decode = spec.is_json(column)
                || (self.mode == TransformMode::Export && looks_like_json(text));
            if decode {
                return serde_json::from_str(text).unwrap_or_else(|_| value.clone());
            }
        }

        if self.mode != TransformMode::Export && spec.is_numeric(column) {
            return match value {
                Value::Number(_) => value.clone(),
                Value::String(s) => parse_number(s).map(Value::Number).unwrap_or(Value::Null),
                _ => Value::Null,
            };
        }

        match self.mode {
            TransformMode::Seed => value_to_text(value).map(Value::String).unwrap_or(Value::Null),
            TransformMode::Import | TransformMode::Export => value.clone(),
        }
    }
}

/// Target name of a legacy column.
pub fn target_column_name(column: &str) -> &str {
    COLUMN_RENAMES
        .iter()
        .find(|(legacy, _)| *legacy == column)
        .map(|(_, target)| *target)
        .unwrap_or(column)
}

/// First required field of `spec` that is missing or blank in a raw record.
///
/// Required fields are named in target conventions; a renamed legacy column
/// (`created` for `created_at`) satisfies the requirement.
pub fn missing_required_field<'a>(spec: &'a TableSpec, raw: &Record) -> Option<&'a str> {
    spec.required_fields
        .iter()
        .find(|field| {
            let legacy_alias = COLUMN_RENAMES
                .iter()
                .find(|(_, target)| target == field)
                .and_then(|(legacy, _)| raw.get(*legacy));
            is_blank(raw.get(field.as_str())) && is_blank(legacy_alias)
        })
        .map(String::as_str)
}

fn looks_like_json(text: &str) -> bool {
    let trimmed = text.trim_start();
    trimmed.starts_with('{') || trimmed.starts_with('[')
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn users() -> TableSpec {
        TableSpec::new("users", "users")
            .required(&["name", "email"])
            .json(&["preferences"])
    }

    fn importer() -> RecordTransformer {
        RecordTransformer::new(TransformMode::Import).with_now(now())
    }

    #[test]
    fn test_rename_legacy_timestamps() {
        let raw = record(json!({
            "id": 1,
            "name": "Ada",
            "email": "ada@example.org",
            "created": "2020-01-02 03:04:05",
            "modified": "2021-01-02 03:04:05"
        }));
        let out = importer().transform(&users(), &raw);
        assert!(!out.skip);
        let keys: Vec<&str> = out.record.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["id", "name", "email", "created_at", "updated_at"]);
        assert_eq!(out.record["created_at"], json!("2020-01-02 03:04:05"));
    }

    #[test]
    fn test_rename_is_idempotent() {
        let raw = record(json!({
            "id": 1,
            "name": "Ada",
            "email": "ada@example.org",
            "created_at": "2020-01-02 03:04:05",
            "updated_at": "2020-01-02 03:04:05"
        }));
        let once = importer().transform(&users(), &raw).record;
        let twice = importer().transform(&users(), &once).record;
        let keys = |r: &Record| r.keys().cloned().collect::<Vec<_>>();
        assert_eq!(keys(&raw), keys(&once));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_explicit_target_column_beats_alias() {
        let raw = record(json!({
            "name": "Ada",
            "email": "a@b.c",
            "created": "2000-01-01",
            "created_at": "2020-01-01"
        }));
        let out = importer().transform(&users(), &raw).record;
        assert_eq!(out["created_at"], json!("2020-01-01 00:00:00"));
        assert!(!out.contains_key("created"));
    }

    #[test]
    fn test_boolean_coercion() {
        let spec = TableSpec::new("events", "events").booleans(&["is_online"]);
        let raw = record(json!({
            "is_active": 1,
            "email_verified": "0",
            "is_online": 1,
            "is_deleted": 2,
            "deactivated_by_id": 1
        }));
        let out = importer().transform(&spec, &raw).record;
        assert_eq!(out["is_active"], json!(true));
        assert_eq!(out["email_verified"], json!(false));
        assert_eq!(out["is_online"], json!(true));
        assert_eq!(out["is_deleted"], json!(2));
        assert_eq!(out["deactivated_by_id"], json!(1));
    }

    #[test]
    fn test_required_field_screening() {
        let missing = record(json!({"id": 1, "name": "Ada"}));
        let blank = record(json!({"id": 2, "name": "Ada", "email": "  "}));
        let null = record(json!({"id": 3, "name": null, "email": "a@b.c"}));
        for raw in [missing, blank, null] {
            let out = importer().transform(&users(), &raw);
            assert!(out.skip);
            assert!(out.record.is_empty());
        }
        assert_eq!(
            missing_required_field(&users(), &record(json!({"name": "Ada"}))),
            Some("email")
        );
    }

    #[test]
    fn test_required_timestamp_satisfied_by_legacy_name() {
        let spec = TableSpec::new("events", "events").required(&["created_at"]);
        let raw = record(json!({"created": "2020-01-01"}));
        assert!(!importer().transform(&spec, &raw).skip);
    }

    #[test]
    fn test_declared_json_decoded() {
        let raw = record(json!({
            "name": "Ada",
            "email": "a@b.c",
            "preferences": "{\"theme\":\"dark\"}",
            "bio": "[not json for import]"
        }));
        let out = importer().transform(&users(), &raw).record;
        assert_eq!(out["preferences"], json!({"theme": "dark"}));
        assert_eq!(out["bio"], json!("[not json for import]"));
    }

    #[test]
    fn test_invalid_json_kept_as_text() {
        let raw = record(json!({"name": "Ada", "email": "a@b.c", "preferences": "{oops"}));
        let out = importer().transform(&users(), &raw).record;
        assert_eq!(out["preferences"], json!("{oops"));
    }

    #[test]
    fn test_export_detects_json_strings() {
        let spec = TableSpec::new("news", "posts");
        let raw = record(json!({
            "tags": "[\"a\",\"b\"]",
            "meta": " {\"k\": 1}",
            "title": "{not json",
            "body": "plain"
        }));
        let out = RecordTransformer::new(TransformMode::Export)
            .with_now(now())
            .transform(&spec, &raw);
        assert_eq!(out.record["tags"], json!(["a", "b"]));
        assert_eq!(out.record["meta"], json!({"k": 1}));
        assert_eq!(out.record["title"], json!("{not json"));
        assert_eq!(out.record["body"], json!("plain"));
        assert!(!out.record.contains_key("created_at"));
    }

    #[test]
    fn test_export_does_not_screen() {
        let raw = record(json!({"id": 1}));
        let out = RecordTransformer::new(TransformMode::Export).transform(&users(), &raw);
        assert!(!out.skip);
    }

    #[test]
    fn test_numeric_coercion() {
        let spec = TableSpec::new("events", "events").numeric(&["capacity", "price", "views"]);
        let raw = record(json!({"capacity": "120", "price": 9.5, "views": "lots"}));
        let out = importer().transform(&spec, &raw).record;
        assert_eq!(out["capacity"], json!(120));
        assert_eq!(out["price"], json!(9.5));
        assert_eq!(out["views"], Value::Null);
    }

    #[test]
    fn test_seed_fallback_stringifies() {
        let spec = TableSpec::new("resources", "resources");
        let raw = record(json!({
            "downloads": 12,
            "flag": true,
            "tags": ["a"],
            "title": "Guide",
            "note": null
        }));
        let out = RecordTransformer::new(TransformMode::Seed)
            .with_now(now())
            .transform(&spec, &raw)
            .record;
        assert_eq!(out["downloads"], json!("12"));
        assert_eq!(out["flag"], json!("1"));
        assert_eq!(out["tags"], json!("[\"a\"]"));
        assert_eq!(out["title"], json!("Guide"));
        assert_eq!(out["note"], Value::Null);
    }

    #[test]
    fn test_import_fallback_passes_through() {
        let spec = TableSpec::new("resources", "resources");
        let raw = record(json!({"downloads": 12, "tags": ["a"]}));
        let out = importer().transform(&spec, &raw).record;
        assert_eq!(out["downloads"], json!(12));
        assert_eq!(out["tags"], json!(["a"]));
    }

    #[test]
    fn test_missing_timestamps_synthesised() {
        let raw = record(json!({"name": "Ada", "email": "a@b.c", "updated_at": null}));
        let out = importer().transform(&users(), &raw).record;
        assert_eq!(out["created_at"], json!("2024-05-01 12:00:00"));
        assert_eq!(out["updated_at"], json!("2024-05-01 12:00:00"));
    }

    #[test]
    fn test_unparsable_timestamp_becomes_now() {
        let raw = record(json!({
            "name": "Ada",
            "email": "a@b.c",
            "verified_at": "0000-00-00 00:00:00"
        }));
        let out = importer().transform(&users(), &raw).record;
        assert_eq!(out["verified_at"], json!("2024-05-01 12:00:00"));
    }

    #[test]
    fn test_target_column_name() {
        assert_eq!(target_column_name("created"), "created_at");
        assert_eq!(target_column_name("modified"), "updated_at");
        assert_eq!(target_column_name("created_at"), "created_at");
        assert_eq!(target_column_name("title"), "title");
    }
}
