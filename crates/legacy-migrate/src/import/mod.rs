//! Importer: loads exported files into the target schema.
//!
//! Tables are loaded in catalog order with foreign-key checks suspended for
//! the whole table loop. Each table goes through
//! `Loading -> (Validating) -> Inserting/Simulating` and ends either
//! [`TableOutcome::Completed`] or [`TableOutcome::AbortedOnErrorBudget`];
//! a table that cannot be loaded at all ends [`TableOutcome::Unavailable`].
//! None of these stop the run. Only a missing export manifest or an
//! unreachable target does.

mod guard;
mod result;
mod validation;

pub use guard::with_foreign_key_checks_disabled;
pub use result::{
    ImportResult, ImportSummary, TableOutcome, IMPORT_ERROR_LOG, IMPORT_SUMMARY_FILE,
    IMPORT_SUMMARY_TEXT_FILE,
};
pub use validation::validate_record;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};
use tracing::{debug, info, warn};

use crate::catalog::{TableCatalog, TableSpec};
use crate::codec::{chunk_file_name, chunk_files, ExportFormat};
use crate::core::record::record_label;
use crate::core::traits::TargetStore;
use crate::core::Record;
use crate::error::{MigrateError, Result};
use crate::export::ExportManifest;
use crate::transform::{RecordTransformer, TransformMode};

/// Default record-level error budget per table.
pub const DEFAULT_MAX_ERRORS: usize = 100;

/// Import parameters.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Directory holding the export.
    pub source_dir: PathBuf,
    /// Tables to import; empty means every table exported without error.
    pub tables: Vec<String>,
    /// Check records against their table's declared rules before loading.
    pub validate: bool,
    /// Run every step except the inserts.
    pub dry_run: bool,
    /// Records per processing chunk.
    pub chunk_size: usize,
    /// Leave records whose primary key is already present alone.
    pub skip_existing: bool,
    /// Record-level errors tolerated per table.
    pub max_errors: usize,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("exports"),
            tables: Vec::new(),
            validate: false,
            dry_run: false,
            chunk_size: 500,
            skip_existing: false,
            max_errors: DEFAULT_MAX_ERRORS,
        }
    }
}

/// Loads exported tables into the target store.
pub struct Importer {
    target: Arc<dyn TargetStore>,
    catalog: Arc<TableCatalog>,
    transformer: RecordTransformer,
}

impl Importer {
    pub fn new(target: Arc<dyn TargetStore>, catalog: Arc<TableCatalog>) -> Self {
        Self {
            target,
            catalog,
            transformer: RecordTransformer::new(TransformMode::Import),
        }
    }

    /// Use a fixed "now" for timestamp coercion and synthesis.
    pub fn with_now(mut self, now: NaiveDateTime) -> Self {
        self.transformer = self.transformer.with_now(now);
        self
    }

    /// Import the selected tables and write the import summary files.
    pub async fn run(&self, options: &ImportOptions) -> Result<ImportSummary> {
        if options.chunk_size == 0 || options.max_errors == 0 {
            return Err(MigrateError::Config(
                "chunk size and error budget must be at least 1".into(),
            ));
        }

        let manifest = ExportManifest::load(&options.source_dir)?;
        self.target
            .ping()
            .await
            .map_err(|e| e.into_connection("target"))?;

        let started_at = Utc::now();
        let tables = select_tables(&self.catalog, &manifest, &options.tables);

        info!(
            "Importing {} tables from {} ({}{})",
            tables.len(),
            options.source_dir.display(),
            manifest.format,
            if options.dry_run { ", dry run" } else { "" }
        );

        let results = with_foreign_key_checks_disabled(self.target.as_ref(), async {
            let mut results = Vec::with_capacity(tables.len());
            for table in &tables {
                let result = match self.catalog.by_target(table) {
                    Some(spec) => self.import_table(spec, manifest.format, options).await,
                    None => ImportResult::unavailable(table.as_str(), "Table is not in the catalog"),
                };
                info!(
                    "{}: {} imported, {} skipped, {} errors ({})",
                    result.table,
                    result.imported,
                    result.skipped,
                    result.errors,
                    result.outcome.as_str()
                );
                results.push(result);
            }
            Ok::<_, MigrateError>(results)
        })
        .await?;

        let summary = ImportSummary::new(started_at, options.dry_run, manifest.format, results);
        summary.save(&options.source_dir)?;

        info!(
            "Import finished: {} imported, {} skipped, {} errors",
            summary.total_imported, summary.total_skipped, summary.total_errors
        );

        Ok(summary)
    }

    /// Import one table. Failures are reported in the result, never raised.
    pub async fn import_table(
        &self,
        spec: &TableSpec,
        format: ExportFormat,
        options: &ImportOptions,
    ) -> ImportResult {
        let table = spec.target_name.as_str();

        match self.target.table_exists(table).await {
            Ok(true) => {}
            Ok(false) => {
                return ImportResult::unavailable(
                    table,
                    format!("Table {} does not exist in target database", table),
                )
            }
            Err(e) => return ImportResult::unavailable(table, e.to_string()),
        }

        let records = match load_exported_records(&options.source_dir, table, format) {
            Ok(records) => records,
            Err(message) => return ImportResult::unavailable(table, message),
        };

        let mut result = ImportResult::new(table);
        for (chunk_index, chunk) in records.chunks(options.chunk_size).enumerate() {
            let offset = chunk_index * options.chunk_size;
            let outcome = self
                .process_chunk(spec, chunk, offset, records.len(), options, &mut result)
                .await;
            debug!(
                "{}: chunk {} done ({} imported, {} errors so far)",
                table,
                chunk_index + 1,
                result.imported,
                result.errors
            );
            if outcome == TableOutcome::AbortedOnErrorBudget {
                warn!("{}: error budget exhausted, remaining records abandoned", table);
                result.outcome = outcome;
                break;
            }
        }

        result
    }

    /// Process one chunk record by record. Returns
    /// [`TableOutcome::AbortedOnErrorBudget`] as soon as the budget runs out
    /// with records of the table still left to process.
    async fn process_chunk(
        &self,
        spec: &TableSpec,
        chunk: &[Record],
        offset: usize,
        total: usize,
        options: &ImportOptions,
        result: &mut ImportResult,
    ) -> TableOutcome {
        let table = spec.target_name.as_str();
        let check_rules = options.validate && spec.has_validation_rules();

        for (i, raw) in chunk.iter().enumerate() {
            let label = record_label(raw, &spec.primary_key, offset + i);

            let failure = if check_rules {
                validate_record(spec, raw).err()
            } else {
                None
            };
            let failure = match failure {
                Some(message) => Some(format!("Record {}: validation failed: {}", label, message)),
                None => self.load_record(spec, raw, &label, options, result).await,
            };

            if let Some(message) = failure {
                result.record_error(message);
                let remaining = total - (offset + i + 1);
                if result.errors >= options.max_errors as u64 && remaining > 0 {
                    result.error_details.push(format!(
                        "Too many errors ({}), stopping import for table {}",
                        options.max_errors, table
                    ));
                    return TableOutcome::AbortedOnErrorBudget;
                }
            }
        }

        TableOutcome::Completed
    }

    /// Skip-existing check, transform and insert. Returns an error message
    /// when the record counts against the budget.
    async fn load_record(
        &self,
        spec: &TableSpec,
        raw: &Record,
        label: &str,
        options: &ImportOptions,
        result: &mut ImportResult,
    ) -> Option<String> {
        let table = spec.target_name.as_str();

        if options.skip_existing {
            if let Some(key) = raw.get(&spec.primary_key).filter(|v| !v.is_null()) {
                match self.target.record_exists(table, &spec.primary_key, key).await {
                    Ok(true) => {
                        result.skipped += 1;
                        return None;
                    }
                    Ok(false) => {}
                    Err(e) => return Some(format!("Record {}: existence check failed: {}", label, e)),
                }
            }
        }

        let transformed = self.transformer.transform(spec, raw);
        if transformed.skip {
            result.skipped += 1;
            return None;
        }

        if !options.dry_run {
            if let Err(e) = self.target.insert_record(table, &transformed.record).await {
                return Some(format!("Record {}: {}", label, e));
            }
        }
        result.imported += 1;
        None
    }
}

/// Tables to load: the requested ones (legacy names resolved to target
/// names) or every table the export produced, in catalog load order.
pub(crate) fn select_tables(
    catalog: &TableCatalog,
    manifest: &ExportManifest,
    requested: &[String],
) -> Vec<String> {
    let mut tables: Vec<String> = if requested.is_empty() {
        manifest.exported_tables()
    } else {
        requested
            .iter()
            .map(|name| {
                catalog
                    .resolve(name)
                    .map(|spec| spec.target_name.clone())
                    .unwrap_or_else(|| name.clone())
            })
            .collect()
    };
    catalog.sort_by_load_order(&mut tables);
    let mut seen = HashSet::new();
    tables.retain(|name| seen.insert(name.clone()));
    tables
}

/// Locate and read every chunk file of `table`. The error is the single
/// message recorded for an unavailable table.
pub(crate) fn load_exported_records(
    dir: &Path,
    table: &str,
    format: ExportFormat,
) -> std::result::Result<Vec<Record>, String> {
    let files = chunk_files(dir, table, format);
    if files.is_empty() {
        return Err(format!(
            "Export file not found: {}",
            dir.join(chunk_file_name(table, 1, format)).display()
        ));
    }
    if !format.is_loadable() {
        return Err(format!(
            "{} exports cannot be imported; execute {} directly",
            format.extension().to_uppercase(),
            files[0].display()
        ));
    }

    let mut records = Vec::new();
    for path in &files {
        let chunk = format
            .read_file(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        records.extend(chunk);
    }
    debug!("{}: loaded {} records from {} files", table, records.len(), files.len());
    Ok(records)
}
