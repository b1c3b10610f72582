//! Core traits at the database seam.
//!
//! - [`LegacySource`]: reads structure and rows from the legacy schema
//! - [`TargetStore`]: checks and writes rows in the target schema
//!
//! The exporter, importer and seeder only see these traits, so the same
//! pipeline runs against MySQL (`drivers::mysql`) or the in-memory stores in
//! `drivers::memory`.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

use super::record::Record;
use super::schema::ColumnInfo;

/// Read access to the legacy schema.
#[async_trait]
pub trait LegacySource: Send + Sync {
    /// Check that the store is reachable.
    async fn ping(&self) -> Result<()>;

    /// Column metadata for a table (`DESCRIBE` equivalent).
    async fn describe_table(&self, table: &str) -> Result<Vec<ColumnInfo>>;

    /// Read one chunk of rows ordered by `order_by` ascending.
    ///
    /// `offset` is the number of rows already read; an empty result means the
    /// table is exhausted.
    async fn read_chunk(
        &self,
        table: &str,
        order_by: &str,
        offset: u64,
        limit: usize,
    ) -> Result<Vec<Record>>;

    /// Number of rows in a table.
    async fn row_count(&self, table: &str) -> Result<u64>;
}

/// Write access to the target schema.
///
/// Implementations hold a single session: the foreign-key check flag set by
/// [`set_foreign_key_checks`](TargetStore::set_foreign_key_checks) applies to
/// every subsequent call until it is changed again.
#[async_trait]
pub trait TargetStore: Send + Sync {
    /// Check that the store is reachable.
    async fn ping(&self) -> Result<()>;

    /// Whether a table exists in the target schema.
    async fn table_exists(&self, table: &str) -> Result<bool>;

    /// Whether a row with `key_column = key` exists.
    async fn record_exists(&self, table: &str, key_column: &str, key: &Value) -> Result<bool>;

    /// Insert a single record.
    async fn insert_record(&self, table: &str, record: &Record) -> Result<()>;

    /// Insert many records in one statement. Either every record is written
    /// or none is.
    async fn insert_batch(&self, table: &str, records: &[Record]) -> Result<u64>;

    /// Enable or disable foreign-key constraint checking for this session.
    async fn set_foreign_key_checks(&self, enabled: bool) -> Result<()>;

    /// Number of rows in a table.
    async fn row_count(&self, table: &str) -> Result<u64>;
}
