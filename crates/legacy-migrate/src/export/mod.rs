//! Exporter: streams legacy tables into chunk files.
//!
//! Tables are processed one at a time in catalog load order. Each table is
//! read in primary-key order, `chunk_size` rows per read, and every chunk
//! lands in its own numbered file (see [`crate::codec`]). A failing table is
//! recorded as `ERROR: <message>` in the manifest and the export moves on;
//! only an unreachable legacy store stops the run.

mod manifest;

pub use manifest::{ExportManifest, TableExportStatus, MANIFEST_FILE, MANIFEST_TEXT_FILE};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use crate::catalog::{TableCatalog, TableSpec};
use crate::codec::{chunk_file_name, structure_file_name, write_atomic, ExportFormat};
use crate::core::traits::LegacySource;
use crate::error::{MigrateError, Result};
use crate::transform::{RecordTransformer, TransformMode};

/// Export parameters.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Directory receiving data files and summaries.
    pub output_dir: PathBuf,
    /// Legacy or target table names; empty means the whole catalog.
    pub tables: Vec<String>,
    pub format: ExportFormat,
    /// Rows per read and per file.
    pub chunk_size: usize,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("exports"),
            tables: Vec::new(),
            format: ExportFormat::Json,
            chunk_size: 1000,
        }
    }
}

/// Exports legacy tables to files.
pub struct Exporter {
    source: Arc<dyn LegacySource>,
    catalog: Arc<TableCatalog>,
    transformer: RecordTransformer,
}

impl Exporter {
    pub fn new(source: Arc<dyn LegacySource>, catalog: Arc<TableCatalog>) -> Self {
        Self {
            source,
            catalog,
            transformer: RecordTransformer::new(TransformMode::Export),
        }
    }

    /// Use a fixed "now" for timestamp coercion.
    pub fn with_now(mut self, now: NaiveDateTime) -> Self {
        self.transformer = self.transformer.with_now(now);
        self
    }

    /// Export the selected tables and write the export summary.
    pub async fn export(&self, options: &ExportOptions) -> Result<ExportManifest> {
        if options.chunk_size == 0 {
            return Err(MigrateError::Config("chunk size must be at least 1".into()));
        }

        self.source
            .ping()
            .await
            .map_err(|e| e.into_connection("legacy"))?;

        std::fs::create_dir_all(&options.output_dir)?;

        let mut manifest = ExportManifest::new(options.format, options.chunk_size);
        manifest.table_mapping = self.catalog.table_mapping();

        let mut specs: Vec<&TableSpec> = Vec::new();
        if options.tables.is_empty() {
            specs.extend(self.catalog.specs());
        } else {
            for name in &options.tables {
                match self.catalog.resolve(name) {
                    Some(spec) if !specs.contains(&spec) => specs.push(spec),
                    Some(_) => {}
                    None => {
                        warn!("Skipping unknown table {}", name);
                        manifest.record(name, TableExportStatus::failed("unknown table"));
                    }
                }
            }
            specs.sort_by_key(|spec| self.catalog.position(&spec.target_name));
        }

        info!(
            "Exporting {} tables to {} as {} (chunk size {})",
            specs.len(),
            options.output_dir.display(),
            options.format,
            options.chunk_size
        );

        for spec in specs {
            match self.export_table(spec, options).await {
                Ok(count) => {
                    info!("{} -> {}: {} records", spec.legacy_name, spec.target_name, count);
                    manifest.record(&spec.target_name, TableExportStatus::Records(count));
                }
                Err(e) => {
                    warn!("Export of {} failed: {}", spec.legacy_name, e);
                    manifest.record(&spec.target_name, TableExportStatus::failed(e));
                }
            }
        }

        manifest.save(&options.output_dir)?;

        info!(
            "Export finished: {} records, {} table errors",
            manifest.total_records,
            manifest.error_count()
        );

        Ok(manifest)
    }

    /// Export one table. Returns the number of records written.
    pub async fn export_table(&self, spec: &TableSpec, options: &ExportOptions) -> Result<u64> {
        let dir = options.output_dir.as_path();

        if let Err(e) = self.dump_structure(spec, dir).await {
            warn!("Could not dump structure of {}: {}", spec.legacy_name, e);
        }

        // Files of an earlier export must not survive a failed or shorter run
        remove_chunks(dir, &spec.target_name, options.format)?;

        let mut offset: u64 = 0;
        let mut index: usize = 1;
        loop {
            let rows = self
                .source
                .read_chunk(&spec.legacy_name, &spec.primary_key, offset, options.chunk_size)
                .await?;

            // The first file is always written, even for an empty table
            if rows.is_empty() && index > 1 {
                break;
            }

            let records: Vec<_> = rows
                .iter()
                .map(|row| self.transformer.transform(spec, row).record)
                .collect();

            let path = dir.join(chunk_file_name(&spec.target_name, index, options.format));
            options
                .format
                .write_file(&path, &spec.target_name, &records)?;
            debug!("{}: wrote {} records to {}", spec.target_name, records.len(), path.display());

            offset += rows.len() as u64;
            if rows.len() < options.chunk_size {
                break;
            }
            index += 1;
        }

        Ok(offset)
    }

    async fn dump_structure(&self, spec: &TableSpec, dir: &Path) -> Result<()> {
        let columns = self.source.describe_table(&spec.legacy_name).await?;
        let json = serde_json::to_string_pretty(&columns)?;
        write_atomic(&dir.join(structure_file_name(&spec.target_name)), json.as_bytes())
    }
}

/// Remove the chunk files of a previous export of `table`.
fn remove_chunks(dir: &Path, table: &str, format: ExportFormat) -> Result<()> {
    let mut index = 1;
    loop {
        let path = dir.join(chunk_file_name(table, index, format));
        if !path.is_file() {
            return Ok(());
        }
        debug!("Removing previous chunk file {}", path.display());
        std::fs::remove_file(&path)?;
        index += 1;
    }
}
