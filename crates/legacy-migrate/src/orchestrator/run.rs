//! The run report persisted by every orchestrated migration.

use std::fmt::{self, Write as _};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::codec::write_atomic;
use crate::error::Result;

use super::MigrateOptions;

/// Overall run status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Completed,
    Failed,
}

/// Orchestrated steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepName {
    Backup,
    Export,
    Import,
    Validate,
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StepName::Backup => "backup",
            StepName::Export => "export",
            StepName::Import => "import",
            StepName::Validate => "validate",
        };
        f.write_str(name)
    }
}

/// How a step ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Completed,
    CompletedWithWarnings,
    Failed,
    Skipped,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StepStatus::Completed => "completed",
            StepStatus::CompletedWithWarnings => "completed with warnings",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
        };
        f.write_str(name)
    }
}

/// Outcome of one step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step: StepName,
    pub status: StepStatus,
    pub message: String,
    pub started_at: DateTime<Utc>,
    pub duration_seconds: f64,
    /// Step-specific data (per-table counts, backup location, ...).
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub details: serde_json::Value,
}

impl StepResult {
    pub(crate) fn finished(
        step: StepName,
        started_at: DateTime<Utc>,
        status: StepStatus,
        message: impl Into<String>,
    ) -> Self {
        Self {
            step,
            status,
            message: message.into(),
            started_at,
            duration_seconds: seconds_since(started_at),
            details: serde_json::Value::Null,
        }
    }

    pub(crate) fn skipped(step: StepName, reason: impl Into<String>) -> Self {
        Self::finished(step, Utc::now(), StepStatus::Skipped, reason)
    }

    pub(crate) fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

/// One orchestrated migration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationRun {
    pub run_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_seconds: Option<f64>,
    pub options: MigrateOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_hash: Option<String>,
    pub steps: Vec<StepResult>,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MigrationRun {
    pub fn new(options: MigrateOptions, config_hash: Option<String>) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            start_time: Utc::now(),
            end_time: None,
            duration_seconds: None,
            options,
            config_hash,
            steps: Vec::new(),
            status: RunStatus::Pending,
            error: None,
        }
    }

    /// Result of a step, if it was recorded.
    pub fn step(&self, step: StepName) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.step == step)
    }

    pub(crate) fn finish(&mut self, error: Option<String>) {
        let end = Utc::now();
        self.end_time = Some(end);
        self.duration_seconds = Some(seconds_since(self.start_time));
        self.status = if error.is_some() {
            RunStatus::Failed
        } else {
            RunStatus::Completed
        };
        self.error = error;
    }

    /// Base file name of the persisted summary pair.
    pub fn summary_stem(&self) -> String {
        format!("migration_summary_{}", self.start_time.format("%Y%m%d_%H%M%S"))
    }

    /// Write the JSON and text summaries into `dir`. Returns the JSON path.
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let stem = self.summary_stem();
        let json_path = dir.join(format!("{}.json", stem));
        let json = serde_json::to_string_pretty(self)?;
        write_atomic(&json_path, json.as_bytes())?;
        write_atomic(&dir.join(format!("{}.txt", stem)), self.render_text().as_bytes())?;
        Ok(json_path)
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Migration Summary");
        let _ = writeln!(out, "=================");
        let _ = writeln!(out, "Run ID:   {}", self.run_id);
        let _ = writeln!(out, "Status:   {:?}", self.status);
        let _ = writeln!(out, "Started:  {}", self.start_time.format("%Y-%m-%d %H:%M:%S UTC"));
        if let Some(end) = self.end_time {
            let _ = writeln!(out, "Finished: {}", end.format("%Y-%m-%d %H:%M:%S UTC"));
        }
        if let Some(duration) = self.duration_seconds {
            let _ = writeln!(out, "Duration: {:.2}s", duration);
        }
        let _ = writeln!(out, "Dry run:  {}", self.options.dry_run);
        let _ = writeln!(out);
        let _ = writeln!(out, "Steps:");
        for step in &self.steps {
            let _ = writeln!(out, "  {:<9} {} - {}", step.step, step.status, step.message);
        }
        if let Some(error) = &self.error {
            let _ = writeln!(out);
            let _ = writeln!(out, "Error: {}", error);
        }
        out
    }
}

fn seconds_since(start: DateTime<Utc>) -> f64 {
    (Utc::now() - start).num_milliseconds().max(0) as f64 / 1000.0
}
