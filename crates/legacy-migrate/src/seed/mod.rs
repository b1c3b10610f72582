//! Seeder: bulk-loads an export for environment population.
//!
//! Uses the same manifest, file discovery and table order as the importer,
//! with the [`TransformMode::Seed`] fallback. Each chunk is written with one
//! bulk insert; when that fails the chunk is retried record by record and
//! individual failures are logged and counted. There is no error budget.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::catalog::{TableCatalog, TableSpec};
use crate::codec::{write_atomic, ExportFormat};
use crate::core::record::record_label;
use crate::core::traits::TargetStore;
use crate::core::Record;
use crate::error::{MigrateError, Result};
use crate::export::ExportManifest;
use crate::import::{load_exported_records, select_tables, with_foreign_key_checks_disabled};
use crate::transform::{RecordTransformer, TransformMode};

pub const SEED_SUMMARY_FILE: &str = "seeding_summary.json";
pub const SEED_SUMMARY_TEXT_FILE: &str = "seeding_summary.txt";

/// Seeding parameters.
#[derive(Debug, Clone)]
pub struct SeedOptions {
    pub source_dir: PathBuf,
    /// Tables to seed; empty means every table exported without error.
    pub tables: Vec<String>,
    /// Records per bulk insert.
    pub chunk_size: usize,
}

impl Default for SeedOptions {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("exports"),
            tables: Vec::new(),
            chunk_size: 500,
        }
    }
}

/// Counters of one table's seeding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedResult {
    pub table: String,
    pub seeded: u64,
    /// Records screened out by the transformer.
    pub skipped: u64,
    /// Records that failed their single-record retry.
    pub failed: u64,
    /// Chunks whose bulk insert failed and were retried record by record.
    pub fallback_chunks: u64,
    /// Table-level failure (missing table or export file).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub error_details: Vec<String>,
}

impl SeedResult {
    fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            ..Self::default()
        }
    }

    fn unavailable(table: &str, message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::new(table)
        }
    }
}

/// Everything one seeding run did.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub format: ExportFormat,
    pub tables: Vec<SeedResult>,
    pub total_seeded: u64,
    pub total_skipped: u64,
    pub total_failed: u64,
}

impl SeedSummary {
    fn new(started_at: DateTime<Utc>, format: ExportFormat, tables: Vec<SeedResult>) -> Self {
        let finished_at = Utc::now();
        Self {
            started_at,
            finished_at,
            duration_seconds: (finished_at - started_at).num_milliseconds().max(0) as f64 / 1000.0,
            format,
            total_seeded: tables.iter().map(|t| t.seeded).sum(),
            total_skipped: tables.iter().map(|t| t.skipped).sum(),
            total_failed: tables.iter().map(|t| t.failed).sum(),
            tables,
        }
    }

    /// Whether any record or table failed.
    pub fn has_failures(&self) -> bool {
        self.total_failed > 0 || self.tables.iter().any(|t| t.error.is_some())
    }

    pub fn table(&self, name: &str) -> Option<&SeedResult> {
        self.tables.iter().find(|t| t.table == name)
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        write_atomic(&dir.join(SEED_SUMMARY_FILE), json.as_bytes())?;
        write_atomic(&dir.join(SEED_SUMMARY_TEXT_FILE), self.render_text().as_bytes())?;
        Ok(())
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Seeding Summary");
        let _ = writeln!(out, "===============");
        let _ = writeln!(out, "Started:  {}", self.started_at.format("%Y-%m-%d %H:%M:%S UTC"));
        let _ = writeln!(out, "Duration: {:.2}s", self.duration_seconds);
        let _ = writeln!(out);
        for t in &self.tables {
            match &t.error {
                Some(error) => {
                    let _ = writeln!(out, "{}: ERROR: {}", t.table, error);
                }
                None => {
                    let _ = writeln!(
                        out,
                        "{}: {} seeded, {} skipped, {} failed ({} chunks retried per record)",
                        t.table, t.seeded, t.skipped, t.failed, t.fallback_chunks
                    );
                }
            }
        }
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Total: {} seeded, {} skipped, {} failed",
            self.total_seeded, self.total_skipped, self.total_failed
        );
        out
    }
}

/// Bulk-loads exported tables into the target store.
pub struct Seeder {
    target: Arc<dyn TargetStore>,
    catalog: Arc<TableCatalog>,
    transformer: RecordTransformer,
}

impl Seeder {
    pub fn new(target: Arc<dyn TargetStore>, catalog: Arc<TableCatalog>) -> Self {
        Self {
            target,
            catalog,
            transformer: RecordTransformer::new(TransformMode::Seed),
        }
    }

    pub fn with_now(mut self, now: NaiveDateTime) -> Self {
        self.transformer = self.transformer.with_now(now);
        self
    }

    /// Seed the selected tables and write the seeding summary.
    pub async fn run(&self, options: &SeedOptions) -> Result<SeedSummary> {
        if options.chunk_size == 0 {
            return Err(MigrateError::Config("chunk size must be at least 1".into()));
        }

        let manifest = ExportManifest::load(&options.source_dir)?;
        self.target
            .ping()
            .await
            .map_err(|e| e.into_connection("target"))?;

        let started_at = Utc::now();
        let tables = select_tables(&self.catalog, &manifest, &options.tables);
        info!("Seeding {} tables from {}", tables.len(), options.source_dir.display());

        let results = with_foreign_key_checks_disabled(self.target.as_ref(), async {
            let mut results = Vec::with_capacity(tables.len());
            for table in &tables {
                let result = match self.catalog.by_target(table) {
                    Some(spec) => self.seed_table(spec, manifest.format, options).await,
                    None => SeedResult::unavailable(table, "Table is not in the catalog"),
                };
                match &result.error {
                    Some(error) => warn!("{}: {}", result.table, error),
                    None => info!(
                        "{}: {} seeded, {} skipped, {} failed",
                        result.table, result.seeded, result.skipped, result.failed
                    ),
                }
                results.push(result);
            }
            Ok::<_, MigrateError>(results)
        })
        .await?;

        let summary = SeedSummary::new(started_at, manifest.format, results);
        summary.save(&options.source_dir)?;
        Ok(summary)
    }

    /// Seed one table.
    pub async fn seed_table(
        &self,
        spec: &TableSpec,
        format: ExportFormat,
        options: &SeedOptions,
    ) -> SeedResult {
        let table = spec.target_name.as_str();

        match self.target.table_exists(table).await {
            Ok(true) => {}
            Ok(false) => {
                return SeedResult::unavailable(
                    table,
                    format!("Table {} does not exist in target database", table),
                )
            }
            Err(e) => return SeedResult::unavailable(table, e.to_string()),
        }

        let records = match load_exported_records(&options.source_dir, table, format) {
            Ok(records) => records,
            Err(message) => return SeedResult::unavailable(table, message),
        };

        let mut result = SeedResult::new(table);
        for (chunk_index, chunk) in records.chunks(options.chunk_size).enumerate() {
            let offset = chunk_index * options.chunk_size;
            let mut batch: Vec<(String, Record)> = Vec::with_capacity(chunk.len());
            for (i, raw) in chunk.iter().enumerate() {
                let transformed = self.transformer.transform(spec, raw);
                if transformed.skip {
                    result.skipped += 1;
                } else {
                    batch.push((record_label(raw, &spec.primary_key, offset + i), transformed.record));
                }
            }
            self.insert_chunk(table, batch, &mut result).await;
            debug!("{}: chunk {} done ({} seeded so far)", table, chunk_index + 1, result.seeded);
        }

        result
    }

    /// Bulk insert, degrading to single-record inserts on failure.
    async fn insert_chunk(&self, table: &str, batch: Vec<(String, Record)>, result: &mut SeedResult) {
        if batch.is_empty() {
            return;
        }

        let records: Vec<Record> = batch.iter().map(|(_, r)| r.clone()).collect();
        match self.target.insert_batch(table, &records).await {
            Ok(count) => {
                result.seeded += count;
                return;
            }
            Err(e) => {
                warn!(
                    "{}: bulk insert of {} records failed ({}), retrying one by one",
                    table,
                    records.len(),
                    e
                );
                result.fallback_chunks += 1;
            }
        }

        for (label, record) in &batch {
            match self.target.insert_record(table, record).await {
                Ok(()) => result.seeded += 1,
                Err(e) => {
                    warn!("{}: record {} failed: {}", table, label, e);
                    result.failed += 1;
                    result.error_details.push(format!("Record {}: {}", label, e));
                }
            }
        }
    }
}
