//! In-memory legacy source and target store.
//!
//! Used for rehearsing a migration without a database and by the test
//! suite. [`MemoryTargetStore`] records every foreign-key flag change and
//! every write so callers can assert on them, and can be told to reject
//! records or whole batches.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::core::schema::ColumnInfo;
use crate::core::traits::{LegacySource, TargetStore};
use crate::core::Record;
use crate::error::{MigrateError, Result};

type RejectFn = Box<dyn Fn(&str, &Record) -> bool + Send + Sync>;

struct MemoryTable {
    columns: Vec<ColumnInfo>,
    rows: Vec<Record>,
}

/// Legacy tables held in memory.
#[derive(Default)]
pub struct MemoryLegacySource {
    tables: BTreeMap<String, MemoryTable>,
    failing: HashSet<String>,
    unreachable: bool,
}

impl MemoryLegacySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table. Column metadata is derived from the first row when
    /// `columns` is empty.
    pub fn with_table(mut self, name: &str, columns: Vec<ColumnInfo>, rows: Vec<Record>) -> Self {
        let columns = if columns.is_empty() {
            rows.first()
                .map(|row| {
                    row.keys()
                        .map(|k| ColumnInfo::new(k.as_str(), "varchar(255)"))
                        .collect()
                })
                .unwrap_or_default()
        } else {
            columns
        };
        self.tables
            .insert(name.to_string(), MemoryTable { columns, rows });
        self
    }

    /// Make every read of `table` fail.
    pub fn with_failing_table(mut self, table: &str) -> Self {
        self.failing.insert(table.to_string());
        self
    }

    /// Make the source unreachable.
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    fn table(&self, name: &str) -> Result<&MemoryTable> {
        if self.failing.contains(name) {
            return Err(MigrateError::table(name, "simulated read failure"));
        }
        self.tables
            .get(name)
            .ok_or_else(|| MigrateError::table(name, "table not found in legacy schema"))
    }
}

#[async_trait]
impl LegacySource for MemoryLegacySource {
    async fn ping(&self) -> Result<()> {
        if self.unreachable {
            return Err(MigrateError::connection("legacy", "memory source is unreachable"));
        }
        Ok(())
    }

    async fn describe_table(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        Ok(self.table(table)?.columns.clone())
    }

    async fn read_chunk(
        &self,
        table: &str,
        order_by: &str,
        offset: u64,
        limit: usize,
    ) -> Result<Vec<Record>> {
        let mut rows: Vec<&Record> = self.table(table)?.rows.iter().collect();
        rows.sort_by(|a, b| compare_values(a.get(order_by), b.get(order_by)));
        Ok(rows
            .into_iter()
            .skip(offset as usize)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn row_count(&self, table: &str) -> Result<u64> {
        Ok(self.table(table)?.rows.len() as u64)
    }
}

#[derive(Default)]
struct TargetState {
    tables: BTreeMap<String, Vec<Record>>,
    foreign_key_checks: bool,
    fk_history: Vec<bool>,
    writes: u64,
}

/// Target tables held in memory.
///
/// Rows with an `id` are unique on it, mirroring an auto-increment primary
/// key.
pub struct MemoryTargetStore {
    state: Mutex<TargetState>,
    reject: Option<RejectFn>,
    fail_batches: bool,
    unreachable: bool,
}

impl Default for MemoryTargetStore {
    fn default() -> Self {
        Self {
            state: Mutex::new(TargetState {
                foreign_key_checks: true,
                ..TargetState::default()
            }),
            reject: None,
            fail_batches: false,
            unreachable: false,
        }
    }
}

impl MemoryTargetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create empty tables.
    pub fn with_tables(mut self, names: &[&str]) -> Self {
        let state = self.state.get_mut();
        for name in names {
            state.tables.entry(name.to_string()).or_default();
        }
        self
    }

    /// Create a table holding `rows`.
    pub fn with_rows(mut self, name: &str, rows: Vec<Record>) -> Self {
        self.state.get_mut().tables.insert(name.to_string(), rows);
        self
    }

    /// Reject single-record inserts for which `predicate` holds.
    pub fn reject_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&str, &Record) -> bool + Send + Sync + 'static,
    {
        self.reject = Some(Box::new(predicate));
        self
    }

    /// Make every bulk insert fail.
    pub fn failing_batches(mut self) -> Self {
        self.fail_batches = true;
        self
    }

    /// Make the store unreachable.
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    /// Rows currently stored in `table`.
    pub async fn rows(&self, table: &str) -> Vec<Record> {
        let state = self.state.lock().await;
        state.tables.get(table).cloned().unwrap_or_default()
    }

    /// Current foreign-key check flag.
    pub async fn foreign_key_checks(&self) -> bool {
        self.state.lock().await.foreign_key_checks
    }

    /// Every value the foreign-key flag was set to, in order.
    pub async fn foreign_key_history(&self) -> Vec<bool> {
        self.state.lock().await.fk_history.clone()
    }

    /// Number of successful insert statements.
    pub async fn write_count(&self) -> u64 {
        self.state.lock().await.writes
    }

    fn check_insert(&self, state: &TargetState, table: &str, record: &Record) -> Result<()> {
        let rows = state
            .tables
            .get(table)
            .ok_or_else(|| MigrateError::table(table, "table does not exist"))?;
        if let Some(id) = record.get("id").filter(|v| !v.is_null()) {
            if rows.iter().any(|row| row.get("id") == Some(id)) {
                return Err(MigrateError::record(
                    table,
                    format!("Duplicate entry '{}' for key 'PRIMARY'", id),
                ));
            }
        }
        if self.reject.as_ref().is_some_and(|reject| reject(table, record)) {
            return Err(MigrateError::record(table, "rejected by target store"));
        }
        Ok(())
    }
}

#[async_trait]
impl TargetStore for MemoryTargetStore {
    async fn ping(&self) -> Result<()> {
        if self.unreachable {
            return Err(MigrateError::connection("target", "memory store is unreachable"));
        }
        Ok(())
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        Ok(self.state.lock().await.tables.contains_key(table))
    }

    async fn record_exists(&self, table: &str, key_column: &str, key: &Value) -> Result<bool> {
        let state = self.state.lock().await;
        Ok(state
            .tables
            .get(table)
            .is_some_and(|rows| rows.iter().any(|row| row.get(key_column) == Some(key))))
    }

    async fn insert_record(&self, table: &str, record: &Record) -> Result<()> {
        let mut state = self.state.lock().await;
        self.check_insert(&state, table, record)?;
        if let Some(rows) = state.tables.get_mut(table) {
            rows.push(record.clone());
        }
        state.writes += 1;
        Ok(())
    }

    async fn insert_batch(&self, table: &str, records: &[Record]) -> Result<u64> {
        if self.fail_batches {
            return Err(MigrateError::table(table, "bulk insert failed"));
        }
        let mut state = self.state.lock().await;
        // All-or-nothing: check every record before writing any
        let mut staged: Vec<Record> = Vec::with_capacity(records.len());
        for record in records {
            self.check_insert(&state, table, record)?;
            let id = record.get("id").filter(|v| !v.is_null());
            if id.is_some() && staged.iter().any(|r| r.get("id") == id) {
                return Err(MigrateError::record(table, "duplicate id within batch"));
            }
            staged.push(record.clone());
        }
        let count = staged.len() as u64;
        if let Some(rows) = state.tables.get_mut(table) {
            rows.extend(staged);
        }
        state.writes += 1;
        Ok(count)
    }

    async fn set_foreign_key_checks(&self, enabled: bool) -> Result<()> {
        let mut state = self.state.lock().await;
        state.foreign_key_checks = enabled;
        state.fk_history.push(enabled);
        Ok(())
    }

    async fn row_count(&self, table: &str) -> Result<u64> {
        let state = self.state.lock().await;
        state
            .tables
            .get(table)
            .map(|rows| rows.len() as u64)
            .ok_or_else(|| MigrateError::table(table, "table does not exist"))
    }
}

/// Order values numerically when both are numbers, otherwise as text.
/// Missing values sort first.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_read_chunk_pages_by_order_column() {
        let source = MemoryLegacySource::new().with_table(
            "news",
            vec![],
            vec![
                row(json!({"id": 10, "title": "c"})),
                row(json!({"id": 2, "title": "a"})),
                row(json!({"id": 7, "title": "b"})),
            ],
        );

        let first = source.read_chunk("news", "id", 0, 2).await.unwrap();
        let second = source.read_chunk("news", "id", 2, 2).await.unwrap();
        let third = source.read_chunk("news", "id", 4, 2).await.unwrap();

        assert_eq!(first[0]["id"], json!(2));
        assert_eq!(first[1]["id"], json!(7));
        assert_eq!(second.len(), 1);
        assert_eq!(second[0]["id"], json!(10));
        assert!(third.is_empty());
        assert_eq!(source.describe_table("news").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_and_failing_tables() {
        let source = MemoryLegacySource::new()
            .with_table("users", vec![], vec![])
            .with_failing_table("users");
        assert!(source.row_count("users").await.is_err());
        assert!(source.row_count("sessions").await.is_err());
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let store = MemoryTargetStore::new().with_rows("users", vec![row(json!({"id": 1}))]);
        let err = store
            .insert_record("users", &row(json!({"id": 1})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Duplicate entry"));
        assert!(store.record_exists("users", "id", &json!(1)).await.unwrap());
        assert!(!store.record_exists("users", "id", &json!(2)).await.unwrap());
    }

    #[tokio::test]
    async fn test_batch_is_all_or_nothing() {
        let store = MemoryTargetStore::new()
            .with_tables(&["posts"])
            .reject_when(|_, r| r.get("title") == Some(&json!("bad")));
        let batch = vec![
            row(json!({"id": 1, "title": "ok"})),
            row(json!({"id": 2, "title": "bad"})),
        ];
        assert!(store.insert_batch("posts", &batch).await.is_err());
        assert!(store.rows("posts").await.is_empty());
        assert_eq!(store.write_count().await, 0);
    }

    #[tokio::test]
    async fn test_foreign_key_history() {
        let store = MemoryTargetStore::new();
        assert!(store.foreign_key_checks().await);
        store.set_foreign_key_checks(false).await.unwrap();
        store.set_foreign_key_checks(true).await.unwrap();
        assert_eq!(store.foreign_key_history().await, vec![false, true]);
    }
}
