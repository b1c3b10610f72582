//! Per-table import results and the run summary.

use std::fmt::Write as _;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::codec::{write_atomic, ExportFormat};
use crate::error::Result;

pub const IMPORT_SUMMARY_FILE: &str = "import_summary.json";
pub const IMPORT_SUMMARY_TEXT_FILE: &str = "import_summary.txt";
pub const IMPORT_ERROR_LOG: &str = "import_errors.log";

/// Terminal state of one table's import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableOutcome {
    /// Every record was processed.
    Completed,
    /// The error budget ran out; remaining records were abandoned.
    AbortedOnErrorBudget,
    /// The table could not be loaded at all (missing table, file or format).
    Unavailable,
}

impl TableOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableOutcome::Completed => "completed",
            TableOutcome::AbortedOnErrorBudget => "aborted (error budget)",
            TableOutcome::Unavailable => "unavailable",
        }
    }
}

/// Counters and error messages of one table's import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportResult {
    pub table: String,
    pub imported: u64,
    /// Records screened out by the transformer or already present.
    pub skipped: u64,
    pub errors: u64,
    pub error_details: Vec<String>,
    pub outcome: TableOutcome,
}

impl ImportResult {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            imported: 0,
            skipped: 0,
            errors: 0,
            error_details: Vec::new(),
            outcome: TableOutcome::Completed,
        }
    }

    /// A table that could not be loaded, carrying a single error.
    pub fn unavailable(table: impl Into<String>, message: impl Into<String>) -> Self {
        let mut result = Self::new(table);
        result.record_error(message);
        result.outcome = TableOutcome::Unavailable;
        result
    }

    pub(crate) fn record_error(&mut self, message: impl Into<String>) {
        self.errors += 1;
        self.error_details.push(message.into());
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }
}

/// Everything one import run did.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub dry_run: bool,
    pub format: ExportFormat,
    pub tables: Vec<ImportResult>,
    pub total_imported: u64,
    pub total_skipped: u64,
    pub total_errors: u64,
}

impl ImportSummary {
    pub fn new(
        started_at: DateTime<Utc>,
        dry_run: bool,
        format: ExportFormat,
        tables: Vec<ImportResult>,
    ) -> Self {
        let finished_at = Utc::now();
        let duration_seconds =
            (finished_at - started_at).num_milliseconds().max(0) as f64 / 1000.0;
        Self {
            started_at,
            finished_at,
            duration_seconds,
            dry_run,
            format,
            total_imported: tables.iter().map(|t| t.imported).sum(),
            total_skipped: tables.iter().map(|t| t.skipped).sum(),
            total_errors: tables.iter().map(|t| t.errors).sum(),
            tables,
        }
    }

    pub fn has_errors(&self) -> bool {
        self.total_errors > 0
    }

    /// Result for one table, if it was part of the run.
    pub fn table(&self, name: &str) -> Option<&ImportResult> {
        self.tables.iter().find(|t| t.table == name)
    }

    /// Write the summary pair and the error log into `dir`.
    pub fn save(&self, dir: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        write_atomic(&dir.join(IMPORT_SUMMARY_FILE), json.as_bytes())?;
        write_atomic(&dir.join(IMPORT_SUMMARY_TEXT_FILE), self.render_text().as_bytes())?;
        write_atomic(&dir.join(IMPORT_ERROR_LOG), self.render_error_log().as_bytes())?;
        Ok(())
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Legacy Import Summary");
        let _ = writeln!(out, "=====================");
        let _ = writeln!(out, "Started:  {}", self.started_at.format("%Y-%m-%d %H:%M:%S UTC"));
        let _ = writeln!(out, "Finished: {}", self.finished_at.format("%Y-%m-%d %H:%M:%S UTC"));
        let _ = writeln!(out, "Duration: {:.2}s", self.duration_seconds);
        let _ = writeln!(out, "Mode:     {}", if self.dry_run { "dry run" } else { "live" });
        let _ = writeln!(out, "Format:   {}", self.format);
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{:<28} {:>10} {:>10} {:>8}  Outcome",
            "Table", "Imported", "Skipped", "Errors"
        );
        for t in &self.tables {
            let _ = writeln!(
                out,
                "{:<28} {:>10} {:>10} {:>8}  {}",
                t.table,
                t.imported,
                t.skipped,
                t.errors,
                t.outcome.as_str()
            );
        }
        let _ = writeln!(
            out,
            "{:<28} {:>10} {:>10} {:>8}",
            "TOTAL", self.total_imported, self.total_skipped, self.total_errors
        );
        out
    }

    /// One line per recorded error, prefixed by its table.
    pub fn render_error_log(&self) -> String {
        let mut out = String::new();
        for t in &self.tables {
            for detail in &t.error_details {
                let _ = writeln!(out, "[{}] {}", t.table, detail);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_totals_and_files() {
        let mut users = ImportResult::new("users");
        users.imported = 4;
        users.skipped = 1;
        let missing = ImportResult::unavailable("posts", "Export file not found");

        let summary = ImportSummary::new(Utc::now(), false, ExportFormat::Json, vec![users, missing]);
        assert_eq!(summary.total_imported, 4);
        assert_eq!(summary.total_skipped, 1);
        assert_eq!(summary.total_errors, 1);
        assert!(summary.has_errors());
        assert_eq!(summary.table("posts").unwrap().outcome, TableOutcome::Unavailable);

        let dir = TempDir::new().unwrap();
        summary.save(dir.path()).unwrap();
        let log = std::fs::read_to_string(dir.path().join(IMPORT_ERROR_LOG)).unwrap();
        assert_eq!(log, "[posts] Export file not found\n");
        let text = std::fs::read_to_string(dir.path().join(IMPORT_SUMMARY_TEXT_FILE)).unwrap();
        assert!(text.contains("unavailable"));
        let json: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join(IMPORT_SUMMARY_FILE)).unwrap(),
        )
        .unwrap();
        assert_eq!(json["tables"][1]["outcome"], "unavailable");
    }
}
