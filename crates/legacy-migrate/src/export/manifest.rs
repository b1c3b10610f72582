//! The export summary consumed by the importer and seeder.

use std::collections::BTreeMap;
use std::fmt::{self, Write as _};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::codec::{write_atomic, ExportFormat};
use crate::error::{MigrateError, Result};

/// Machine-readable summary file name.
pub const MANIFEST_FILE: &str = "export_summary.json";

/// Human-readable summary file name.
pub const MANIFEST_TEXT_FILE: &str = "export_summary.txt";

const ERROR_PREFIX: &str = "ERROR: ";

/// Per-table export outcome: a record count or `"ERROR: <message>"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TableExportStatus {
    Records(u64),
    Failed(String),
}

impl TableExportStatus {
    pub fn failed(message: impl fmt::Display) -> Self {
        TableExportStatus::Failed(format!("{}{}", ERROR_PREFIX, message))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, TableExportStatus::Failed(_))
    }
}

impl fmt::Display for TableExportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableExportStatus::Records(n) => write!(f, "{} records", n),
            TableExportStatus::Failed(msg) if msg.starts_with(ERROR_PREFIX) => f.write_str(msg),
            TableExportStatus::Failed(msg) => write!(f, "{}{}", ERROR_PREFIX, msg),
        }
    }
}

/// What an export run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportManifest {
    pub exported_at: DateTime<Utc>,
    pub format: ExportFormat,
    pub chunk_size: usize,
    pub total_records: u64,
    /// Target table name → outcome.
    pub tables: BTreeMap<String, TableExportStatus>,
    /// Legacy table name → target table name.
    pub table_mapping: BTreeMap<String, String>,
}

impl ExportManifest {
    pub fn new(format: ExportFormat, chunk_size: usize) -> Self {
        Self {
            exported_at: Utc::now(),
            format,
            chunk_size,
            total_records: 0,
            tables: BTreeMap::new(),
            table_mapping: BTreeMap::new(),
        }
    }

    /// Path of the machine-readable summary inside `dir`.
    pub fn path_in(dir: &Path) -> PathBuf {
        dir.join(MANIFEST_FILE)
    }

    /// Load the manifest from an export directory.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = Self::path_in(dir);
        if !path.is_file() {
            return Err(MigrateError::ManifestMissing(path));
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write both summary files into `dir`.
    pub fn save(&self, dir: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        write_atomic(&Self::path_in(dir), json.as_bytes())?;
        write_atomic(&dir.join(MANIFEST_TEXT_FILE), self.render_text().as_bytes())?;
        Ok(())
    }

    /// Record a table outcome.
    pub fn record(&mut self, table: &str, status: TableExportStatus) {
        if let TableExportStatus::Records(n) = status {
            self.total_records += n;
        }
        self.tables.insert(table.to_string(), status);
    }

    /// Tables exported without error.
    pub fn exported_tables(&self) -> Vec<String> {
        self.tables
            .iter()
            .filter(|(_, status)| !status.is_error())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Number of tables that failed.
    pub fn error_count(&self) -> usize {
        self.tables.values().filter(|s| s.is_error()).count()
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    /// Human-readable rendering.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Legacy Export Summary");
        let _ = writeln!(out, "=====================");
        let _ = writeln!(out, "Exported at:   {}", self.exported_at.format("%Y-%m-%d %H:%M:%S UTC"));
        let _ = writeln!(out, "Format:        {}", self.format);
        let _ = writeln!(out, "Chunk size:    {}", self.chunk_size);
        let _ = writeln!(out, "Total records: {}", self.total_records);
        let _ = writeln!(out);
        let _ = writeln!(out, "Tables:");
        for (table, status) in &self.tables {
            let _ = writeln!(out, "  {}: {}", table, status);
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "Table mapping:");
        for (legacy, target) in &self.table_mapping {
            let _ = writeln!(out, "  {} -> {}", legacy, target);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manifest() -> ExportManifest {
        let mut m = ExportManifest::new(ExportFormat::Json, 2);
        m.record("organizations", TableExportStatus::Records(3));
        m.record("posts", TableExportStatus::failed("Table news: connection reset"));
        m.table_mapping
            .insert("organisations".into(), "organizations".into());
        m
    }

    #[test]
    fn test_status_serialization() {
        let m = manifest();
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["tables"]["organizations"], 3);
        assert_eq!(
            json["tables"]["posts"],
            "ERROR: Table news: connection reset"
        );
        assert_eq!(json["format"], "json");
        assert_eq!(m.total_records, 3);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let m = manifest();
        m.save(dir.path()).unwrap();

        let loaded = ExportManifest::load(dir.path()).unwrap();
        assert_eq!(loaded, m);
        assert_eq!(loaded.exported_tables(), vec!["organizations"]);
        assert_eq!(loaded.error_count(), 1);

        let text = std::fs::read_to_string(dir.path().join(MANIFEST_TEXT_FILE)).unwrap();
        assert!(text.contains("organizations: 3 records"));
        assert!(text.contains("posts: ERROR: Table news: connection reset"));
        assert!(text.contains("organisations -> organizations"));
    }

    #[test]
    fn test_missing_manifest() {
        let dir = TempDir::new().unwrap();
        let err = ExportManifest::load(dir.path()).unwrap_err();
        assert!(matches!(err, MigrateError::ManifestMissing(_)));
    }
}
