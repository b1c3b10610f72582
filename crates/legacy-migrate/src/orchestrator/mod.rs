//! Migration orchestrator - runs backup, export, import and validation as one
//! recorded migration.
//!
//! Every run is persisted as `migration_summary_<timestamp>.json` (plus a text
//! rendering) in the source directory, whether it succeeds or not.

mod run;
mod services;

pub use run::{MigrationRun, RunStatus, StepName, StepResult, StepStatus};
pub use services::{
    BackupService, CommandBackupService, RowCountValidator, ValidationReport, ValidationService,
};

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};

use crate::catalog::TableCatalog;
use crate::codec::ExportFormat;
use crate::core::traits::{LegacySource, TargetStore};
use crate::error::{MigrateError, Result};
use crate::export::{ExportOptions, Exporter};
use crate::import::{ImportOptions, Importer, DEFAULT_MAX_ERRORS};

/// Rows per read during an orchestrated export.
pub const MIGRATE_EXPORT_CHUNK_SIZE: usize = 1000;

/// Records per chunk during an orchestrated import.
pub const MIGRATE_IMPORT_CHUNK_SIZE: usize = 500;

/// Options of an orchestrated migration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrateOptions {
    /// Back up the target before writing to it.
    pub backup: bool,

    /// Compare row counts once the import is done.
    pub validate: bool,

    /// Import without writing; backup and validation are skipped.
    pub dry_run: bool,

    /// Directory the export is written to and imported from.
    pub source_dir: PathBuf,

    /// Name of the legacy connection used for the export.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection: Option<String>,

    pub skip_export: bool,
    pub skip_import: bool,

    /// Tables to migrate; empty means the whole catalog.
    pub tables: Vec<String>,
}

impl Default for MigrateOptions {
    fn default() -> Self {
        Self {
            backup: false,
            validate: false,
            dry_run: false,
            source_dir: PathBuf::from("exports"),
            connection: None,
            skip_export: false,
            skip_import: false,
            tables: Vec::new(),
        }
    }
}

/// Migration orchestrator.
pub struct Orchestrator {
    legacy: Arc<dyn LegacySource>,
    target: Arc<dyn TargetStore>,
    catalog: Arc<TableCatalog>,
    backup: Arc<dyn BackupService>,
    validator: Arc<dyn ValidationService>,
    config_hash: Option<String>,
    now: Option<NaiveDateTime>,
}

impl Orchestrator {
    /// Create an orchestrator that validates with [`RowCountValidator`].
    pub fn new(
        legacy: Arc<dyn LegacySource>,
        target: Arc<dyn TargetStore>,
        catalog: Arc<TableCatalog>,
        backup: Arc<dyn BackupService>,
    ) -> Self {
        let validator = Arc::new(RowCountValidator::new(
            legacy.clone(),
            target.clone(),
            catalog.clone(),
        ));
        Self {
            legacy,
            target,
            catalog,
            backup,
            validator,
            config_hash: None,
            now: None,
        }
    }

    pub fn with_validator(mut self, validator: Arc<dyn ValidationService>) -> Self {
        self.validator = validator;
        self
    }

    /// Record the hash of the configuration the run was started with.
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    /// Use a fixed "now" for timestamp coercion.
    pub fn with_now(mut self, now: NaiveDateTime) -> Self {
        self.now = Some(now);
        self
    }

    /// Run the migration and persist its summary.
    ///
    /// A failed step is reported in the returned run (status `failed`), not
    /// as an error. `Err` means the summary itself could not be written.
    pub async fn run(&self, options: MigrateOptions) -> Result<MigrationRun> {
        let mut run = MigrationRun::new(options.clone(), self.config_hash.clone());
        info!("Starting migration run: {}", run.run_id);

        let outcome = self.run_steps(&options, &mut run).await;
        let error = match outcome {
            Ok(()) => None,
            Err(e) => {
                error!("Migration run {} failed: {}", run.run_id, e);
                Some(e.to_string())
            }
        };
        run.finish(error);

        let path = run.save(&options.source_dir)?;
        info!(
            "Migration run {} {:?} in {:.2}s, summary written to {}",
            run.run_id,
            run.status,
            run.duration_seconds.unwrap_or(0.0),
            path.display()
        );

        Ok(run)
    }

    async fn run_steps(&self, options: &MigrateOptions, run: &mut MigrationRun) -> Result<()> {
        let steps = [
            StepName::Backup,
            StepName::Export,
            StepName::Import,
            StepName::Validate,
        ];
        for (i, step) in steps.iter().enumerate() {
            let result = match step {
                StepName::Backup => self.backup_step(options).await,
                StepName::Export => self.export_step(options).await,
                StepName::Import => self.import_step(options).await,
                StepName::Validate => self.validate_step(options).await,
            };
            match result {
                Ok(step_result) => {
                    if step_result.status == StepStatus::CompletedWithWarnings {
                        warn!("Step {}: {}", step, step_result.message);
                    }
                    run.steps.push(step_result);
                }
                Err(failed) => {
                    let message = failed.message.clone();
                    run.steps.push(failed);
                    for remaining in &steps[i + 1..] {
                        run.steps
                            .push(StepResult::skipped(*remaining, "previous step failed"));
                    }
                    return Err(MigrateError::step(step.to_string(), message));
                }
            }
        }
        Ok(())
    }

    /// `Err` carries the failed step result.
    async fn backup_step(&self, options: &MigrateOptions) -> std::result::Result<StepResult, StepResult> {
        if !options.backup {
            return Ok(StepResult::skipped(StepName::Backup, "not requested"));
        }
        if options.dry_run {
            return Ok(StepResult::skipped(StepName::Backup, "dry run"));
        }

        let started = Utc::now();
        info!("Creating backup");
        match self.backup.create_backup().await {
            Ok(location) => Ok(StepResult::finished(
                StepName::Backup,
                started,
                StepStatus::Completed,
                format!("backup created at {}", location),
            )
            .with_details(json!({ "location": location }))),
            Err(e) => Err(StepResult::finished(
                StepName::Backup,
                started,
                StepStatus::Failed,
                e.to_string(),
            )),
        }
    }

    async fn export_step(&self, options: &MigrateOptions) -> std::result::Result<StepResult, StepResult> {
        if options.skip_export {
            return Ok(StepResult::skipped(StepName::Export, "skipped by option"));
        }

        let started = Utc::now();
        let mut exporter = Exporter::new(self.legacy.clone(), self.catalog.clone());
        if let Some(now) = self.now {
            exporter = exporter.with_now(now);
        }
        let export_options = ExportOptions {
            output_dir: options.source_dir.clone(),
            tables: options.tables.clone(),
            format: ExportFormat::Json,
            chunk_size: MIGRATE_EXPORT_CHUNK_SIZE,
        };

        let fail = |message: String| {
            StepResult::finished(StepName::Export, started, StepStatus::Failed, message)
        };
        let manifest = exporter.export(&export_options).await.map_err(|e| fail(e.to_string()))?;
        let details = serde_json::to_value(&manifest.tables).unwrap_or_default();

        // An incomplete export (an unknown table name included) would make
        // the import load a partial data set
        if manifest.has_errors() {
            let failed: Vec<String> = manifest
                .tables
                .iter()
                .filter(|(_, status)| status.is_error())
                .map(|(table, status)| format!("{} ({})", table, status))
                .collect();
            return Err(fail(format!("table export errors: {}", failed.join(", ")))
                .with_details(details));
        }

        Ok(StepResult::finished(
            StepName::Export,
            started,
            StepStatus::Completed,
            format!(
                "{} records from {} tables",
                manifest.total_records,
                manifest.tables.len()
            ),
        )
        .with_details(details))
    }

    async fn import_step(&self, options: &MigrateOptions) -> std::result::Result<StepResult, StepResult> {
        if options.skip_import {
            return Ok(StepResult::skipped(StepName::Import, "skipped by option"));
        }

        let started = Utc::now();
        let mut importer = Importer::new(self.target.clone(), self.catalog.clone());
        if let Some(now) = self.now {
            importer = importer.with_now(now);
        }
        let import_options = ImportOptions {
            source_dir: options.source_dir.clone(),
            tables: options.tables.clone(),
            validate: true,
            dry_run: options.dry_run,
            chunk_size: MIGRATE_IMPORT_CHUNK_SIZE,
            skip_existing: false,
            max_errors: DEFAULT_MAX_ERRORS,
        };

        let summary = match importer.run(&import_options).await {
            Ok(summary) => summary,
            Err(e) => {
                return Ok(StepResult::finished(
                    StepName::Import,
                    started,
                    StepStatus::CompletedWithWarnings,
                    e.to_string(),
                ))
            }
        };

        let details: serde_json::Map<String, serde_json::Value> = summary
            .tables
            .iter()
            .map(|t| {
                (
                    t.table.clone(),
                    json!({
                        "imported": t.imported,
                        "skipped": t.skipped,
                        "errors": t.errors,
                        "outcome": t.outcome,
                    }),
                )
            })
            .collect();
        let status = if summary.has_errors() {
            StepStatus::CompletedWithWarnings
        } else {
            StepStatus::Completed
        };

        Ok(StepResult::finished(
            StepName::Import,
            started,
            status,
            format!(
                "{} imported, {} skipped, {} errors",
                summary.total_imported, summary.total_skipped, summary.total_errors
            ),
        )
        .with_details(serde_json::Value::Object(details)))
    }

    async fn validate_step(&self, options: &MigrateOptions) -> std::result::Result<StepResult, StepResult> {
        if !options.validate {
            return Ok(StepResult::skipped(StepName::Validate, "not requested"));
        }
        if options.dry_run {
            return Ok(StepResult::skipped(StepName::Validate, "dry run"));
        }

        let started = Utc::now();
        info!("Validating migrated data");
        let step = match self.validator.validate(&options.tables).await {
            Ok(report) if report.passed() => StepResult::finished(
                StepName::Validate,
                started,
                StepStatus::Completed,
                format!("{} tables checked", report.tables_checked),
            ),
            Ok(report) => StepResult::finished(
                StepName::Validate,
                started,
                StepStatus::CompletedWithWarnings,
                format!(
                    "{} of {} tables failed validation",
                    report.failures.len(),
                    report.tables_checked
                ),
            )
            .with_details(json!({ "failures": report.failures })),
            Err(e) => StepResult::finished(
                StepName::Validate,
                started,
                StepStatus::CompletedWithWarnings,
                e.to_string(),
            ),
        };
        Ok(step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Record;
    use crate::drivers::{MemoryLegacySource, MemoryTargetStore};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct StubBackup {
        calls: AtomicUsize,
        fail: bool,
    }

    impl StubBackup {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail,
            })
        }
    }

    #[async_trait]
    impl BackupService for StubBackup {
        async fn create_backup(&self) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(MigrateError::Backup("disk full".into()))
            } else {
                Ok("/backups/app.sql".into())
            }
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn organisations() -> Vec<Record> {
        vec![
            json!({"id": 1, "name": "Acme", "settings": "{\"public\":true}",
                   "created": "2020-01-02T03:04:05", "modified": null}),
            json!({"id": 2, "name": "Globex", "settings": null,
                   "created": "2021/06/30 10:00:00", "modified": "2022-01-01"}),
            json!({"id": 3, "name": "Initech", "settings": "[]",
                   "created": "garbage", "modified": 0}),
        ]
        .into_iter()
        .map(|v| v.as_object().cloned().unwrap())
        .collect()
    }

    fn orchestrator(
        legacy: MemoryLegacySource,
        target: Arc<MemoryTargetStore>,
        backup: Arc<StubBackup>,
    ) -> Orchestrator {
        Orchestrator::new(
            Arc::new(legacy),
            target,
            Arc::new(TableCatalog::standard()),
            backup,
        )
        .with_now(now())
    }

    fn options(dir: &TempDir) -> MigrateOptions {
        MigrateOptions {
            source_dir: dir.path().to_path_buf(),
            tables: vec!["organisations".into()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_organizations_round_trip() {
        let dir = TempDir::new().unwrap();
        let legacy = MemoryLegacySource::new().with_table("organisations", vec![], organisations());
        let target = Arc::new(MemoryTargetStore::new().with_tables(&["organizations"]));
        let orchestrator = orchestrator(legacy, target.clone(), StubBackup::new(false));

        let run = orchestrator
            .run(MigrateOptions {
                validate: true,
                ..options(&dir)
            })
            .await
            .unwrap();

        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.step(StepName::Import).unwrap().status, StepStatus::Completed);
        assert_eq!(run.step(StepName::Validate).unwrap().status, StepStatus::Completed);
        assert_eq!(run.step(StepName::Backup).unwrap().status, StepStatus::Skipped);

        let details = &run.step(StepName::Import).unwrap().details;
        assert_eq!(details["organizations"]["imported"], json!(3));
        assert_eq!(details["organizations"]["errors"], json!(0));

        let rows = target.rows("organizations").await;
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["created_at"], json!("2020-01-02 03:04:05"));
        assert_eq!(rows[0]["updated_at"], json!("2024-05-01 12:00:00"));
        assert_eq!(rows[0]["settings"], json!({"public": true}));
        assert_eq!(rows[1]["updated_at"], json!("2022-01-01 00:00:00"));
        assert_eq!(rows[2]["created_at"], json!("2024-05-01 12:00:00"));
        assert_eq!(rows[2]["updated_at"], json!("1970-01-01 00:00:00"));
        assert!(target.foreign_key_checks().await);
    }

    #[tokio::test]
    async fn test_chunked_export_is_fully_imported() {
        let dir = TempDir::new().unwrap();
        let legacy = MemoryLegacySource::new().with_table("organisations", vec![], organisations());
        let exporter = Exporter::new(Arc::new(legacy), Arc::new(TableCatalog::standard()))
            .with_now(now());
        exporter
            .export(&ExportOptions {
                output_dir: dir.path().to_path_buf(),
                tables: vec!["organisations".into()],
                format: ExportFormat::Json,
                chunk_size: 2,
            })
            .await
            .unwrap();
        assert!(dir.path().join("organizations_2.json").exists());

        let target = Arc::new(MemoryTargetStore::new().with_tables(&["organizations"]));
        let orchestrator = orchestrator(
            MemoryLegacySource::new(),
            target.clone(),
            StubBackup::new(false),
        );
        let run = orchestrator
            .run(MigrateOptions {
                skip_export: true,
                ..options(&dir)
            })
            .await
            .unwrap();

        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.step(StepName::Export).unwrap().status, StepStatus::Skipped);
        assert_eq!(target.rows("organizations").await.len(), 3);
    }

    #[tokio::test]
    async fn test_backup_failure_is_fatal_and_summary_persists() {
        let dir = TempDir::new().unwrap();
        let legacy = MemoryLegacySource::new().with_table("organisations", vec![], organisations());
        let target = Arc::new(MemoryTargetStore::new().with_tables(&["organizations"]));
        let orchestrator = orchestrator(legacy, target.clone(), StubBackup::new(true));

        let run = orchestrator
            .run(MigrateOptions {
                backup: true,
                ..options(&dir)
            })
            .await
            .unwrap();

        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.error.as_deref().unwrap().contains("disk full"));
        assert_eq!(run.step(StepName::Backup).unwrap().status, StepStatus::Failed);
        assert_eq!(run.step(StepName::Export).unwrap().status, StepStatus::Skipped);
        assert!(target.rows("organizations").await.is_empty());

        let summary = dir.path().join(format!("{}.json", run.summary_stem()));
        let saved: Value = serde_json::from_str(&std::fs::read_to_string(summary).unwrap()).unwrap();
        assert_eq!(saved["status"], json!("failed"));
        assert_eq!(saved["steps"][0]["status"], json!("failed"));
        assert!(dir.path().join(format!("{}.txt", run.summary_stem())).exists());
    }

    #[tokio::test]
    async fn test_export_table_error_is_fatal() {
        let dir = TempDir::new().unwrap();
        let legacy = MemoryLegacySource::new()
            .with_table("organisations", vec![], organisations())
            .with_failing_table("organisations");
        let target = Arc::new(MemoryTargetStore::new().with_tables(&["organizations"]));
        let run = orchestrator(legacy, target, StubBackup::new(false))
            .run(options(&dir))
            .await
            .unwrap();

        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.step(StepName::Export).unwrap().status, StepStatus::Failed);
        assert_eq!(run.step(StepName::Import).unwrap().status, StepStatus::Skipped);
    }

    #[tokio::test]
    async fn test_unknown_table_name_fails_export_step() {
        let dir = TempDir::new().unwrap();
        let legacy = MemoryLegacySource::new().with_table("organisations", vec![], organisations());
        let target = Arc::new(MemoryTargetStore::new().with_tables(&["organizations"]));
        let run = orchestrator(legacy, target.clone(), StubBackup::new(false))
            .run(MigrateOptions {
                tables: vec!["organisations".into(), "organisatons".into()],
                ..options(&dir)
            })
            .await
            .unwrap();

        assert_eq!(run.status, RunStatus::Failed);
        let export = run.step(StepName::Export).unwrap();
        assert!(export.message.contains("organisatons"));
        assert!(target.rows("organizations").await.is_empty());
    }

    #[tokio::test]
    async fn test_import_errors_are_warnings() {
        let dir = TempDir::new().unwrap();
        let legacy = MemoryLegacySource::new().with_table("organisations", vec![], organisations());
        let target = Arc::new(
            MemoryTargetStore::new()
                .with_tables(&["organizations"])
                .reject_when(|_, record| record["id"] == json!(2)),
        );
        let run = orchestrator(legacy, target, StubBackup::new(false))
            .run(options(&dir))
            .await
            .unwrap();

        assert_eq!(run.status, RunStatus::Completed);
        let import = run.step(StepName::Import).unwrap();
        assert_eq!(import.status, StepStatus::CompletedWithWarnings);
        assert_eq!(import.details["organizations"]["errors"], json!(1));
    }

    #[tokio::test]
    async fn test_dry_run_skips_backup_and_validation() {
        let dir = TempDir::new().unwrap();
        let legacy = MemoryLegacySource::new().with_table("organisations", vec![], organisations());
        let target = Arc::new(MemoryTargetStore::new().with_tables(&["organizations"]));
        let backup = StubBackup::new(false);
        let run = orchestrator(legacy, target.clone(), backup.clone())
            .run(MigrateOptions {
                backup: true,
                validate: true,
                dry_run: true,
                ..options(&dir)
            })
            .await
            .unwrap();

        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(backup.calls.load(Ordering::SeqCst), 0);
        assert_eq!(run.step(StepName::Backup).unwrap().message, "dry run");
        assert_eq!(run.step(StepName::Validate).unwrap().message, "dry run");
        assert_eq!(run.step(StepName::Import).unwrap().details["organizations"]["imported"], json!(3));
        assert!(target.rows("organizations").await.is_empty());
    }

    #[tokio::test]
    async fn test_validation_mismatch_is_a_warning() {
        let dir = TempDir::new().unwrap();
        let legacy = MemoryLegacySource::new().with_table("organisations", vec![], organisations());
        let target = Arc::new(MemoryTargetStore::new().with_rows(
            "organizations",
            vec![json!({"id": 9}).as_object().cloned().unwrap()],
        ));
        let run = orchestrator(legacy, target, StubBackup::new(false))
            .run(MigrateOptions {
                validate: true,
                skip_import: true,
                ..options(&dir)
            })
            .await
            .unwrap();

        assert_eq!(run.status, RunStatus::Completed);
        let validate = run.step(StepName::Validate).unwrap();
        assert_eq!(validate.status, StepStatus::CompletedWithWarnings);
        assert_eq!(validate.details["failures"].as_array().unwrap().len(), 1);
    }
}
