//! Backup and data-integrity validation services used by the orchestrator.
//!
//! Both are traits so the orchestrator can run against any implementation;
//! [`CommandBackupService`] and [`RowCountValidator`] are the ones the CLI
//! wires up.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{info, warn};

use crate::catalog::TableCatalog;
use crate::core::traits::{LegacySource, TargetStore};
use crate::error::{MigrateError, Result};

/// Creates a backup of the target database before it is written to.
#[async_trait]
pub trait BackupService: Send + Sync {
    /// Create a backup and return where it was stored.
    async fn create_backup(&self) -> Result<String>;
}

/// Checks migrated data after an import.
#[async_trait]
pub trait ValidationService: Send + Sync {
    /// Validate the given target tables (all catalog tables when empty).
    async fn validate(&self, tables: &[String]) -> Result<ValidationReport>;
}

/// Outcome of a validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub tables_checked: usize,
    pub failures: Vec<String>,
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Runs an external command (a `mysqldump` wrapper, typically) and records
/// the last line it prints as the backup location.
pub struct CommandBackupService {
    command: Vec<String>,
}

impl CommandBackupService {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

#[async_trait]
impl BackupService for CommandBackupService {
    async fn create_backup(&self) -> Result<String> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| MigrateError::Backup("no backup command configured".into()))?;

        info!("Running backup command: {}", program);
        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|e| MigrateError::Backup(format!("failed to start {}: {}", program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MigrateError::Backup(format!(
                "{} exited with {}: {}",
                program,
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let location = stdout
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("backup created")
            .to_string();
        Ok(location)
    }
}

/// Compares legacy and target row counts per table.
pub struct RowCountValidator {
    legacy: Arc<dyn LegacySource>,
    target: Arc<dyn TargetStore>,
    catalog: Arc<TableCatalog>,
}

impl RowCountValidator {
    pub fn new(
        legacy: Arc<dyn LegacySource>,
        target: Arc<dyn TargetStore>,
        catalog: Arc<TableCatalog>,
    ) -> Self {
        Self {
            legacy,
            target,
            catalog,
        }
    }
}

#[async_trait]
impl ValidationService for RowCountValidator {
    async fn validate(&self, tables: &[String]) -> Result<ValidationReport> {
        let mut report = ValidationReport::default();

        for spec in self.catalog.specs() {
            if !tables.is_empty()
                && !tables
                    .iter()
                    .any(|t| t == &spec.target_name || t == &spec.legacy_name)
            {
                continue;
            }
            report.tables_checked += 1;

            let legacy_count = match self.legacy.row_count(&spec.legacy_name).await {
                Ok(n) => n,
                Err(e) => {
                    report.failures.push(format!("{}: {}", spec.legacy_name, e));
                    continue;
                }
            };
            let target_count = match self.target.row_count(&spec.target_name).await {
                Ok(n) => n,
                Err(e) => {
                    report.failures.push(format!("{}: {}", spec.target_name, e));
                    continue;
                }
            };

            if legacy_count == target_count {
                info!("{}: {} rows (match)", spec.target_name, target_count);
            } else {
                warn!(
                    "{}: legacy={} target={} (MISMATCH)",
                    spec.target_name, legacy_count, target_count
                );
                report.failures.push(format!(
                    "{}: legacy has {} rows, target has {}",
                    spec.target_name, legacy_count, target_count
                ));
            }
        }

        if report.tables_checked == 0 {
            return Err(MigrateError::Validation(format!(
                "no catalog table matches {}",
                tables.join(", ")
            )));
        }

        Ok(report)
    }
}
