//! Wire formats for exported table data.
//!
//! A table's export is split into chunk files in its target name:
//! chunk 1 goes to `<table>.<ext>`, chunk `n >= 2` to `<table>_<n>.<ext>`.
//! Chunk files are never merged; readers walk the numbered sequence until
//! the first gap.
//!
//! JSON and CSV files load back into records. SQL files are meant to be
//! executed directly and cannot be read back.

mod csv_file;
mod json_file;
mod sql_file;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::Record;
use crate::error::{MigrateError, Result};

pub use sql_file::{insert_statement, quote_literal};

/// Serialization format of exported data files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Pretty-printed array of objects.
    #[default]
    Json,
    /// Header row of column names followed by data rows.
    Csv,
    /// One `INSERT` statement per record.
    Sql,
}

impl ExportFormat {
    /// File extension, which is also the format's name.
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Sql => "sql",
        }
    }

    /// Whether files in this format can be read back into records.
    pub fn is_loadable(&self) -> bool {
        !matches!(self, ExportFormat::Sql)
    }

    /// Encode records destined for `table`.
    pub fn encode(&self, table: &str, records: &[Record]) -> Result<Vec<u8>> {
        match self {
            ExportFormat::Json => json_file::encode(records),
            ExportFormat::Csv => csv_file::encode(records),
            ExportFormat::Sql => Ok(sql_file::encode(table, records).into_bytes()),
        }
    }

    /// Decode records from file content.
    pub fn decode(&self, bytes: &[u8]) -> Result<Vec<Record>> {
        match self {
            ExportFormat::Json => json_file::decode(bytes),
            ExportFormat::Csv => csv_file::decode(bytes),
            ExportFormat::Sql => Err(MigrateError::UnsupportedFormat(self.to_string())),
        }
    }

    /// Write records for `table` to `path`, replacing any existing file.
    pub fn write_file(&self, path: &Path, table: &str, records: &[Record]) -> Result<()> {
        let content = self.encode(table, records)?;
        write_atomic(path, &content)
    }

    /// Read every record from `path`.
    pub fn read_file(&self, path: &Path) -> Result<Vec<Record>> {
        if !self.is_loadable() {
            return Err(MigrateError::UnsupportedFormat(self.to_string()));
        }
        let content = std::fs::read(path)?;
        self.decode(&content)
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            "sql" => Ok(ExportFormat::Sql),
            other => Err(MigrateError::Config(format!(
                "Unknown export format '{}' (expected json, csv or sql)",
                other
            ))),
        }
    }
}

/// File name of chunk `index` (1-based) of `table`.
pub fn chunk_file_name(table: &str, index: usize, format: ExportFormat) -> String {
    if index <= 1 {
        format!("{}.{}", table, format.extension())
    } else {
        format!("{}_{}.{}", table, index, format.extension())
    }
}

/// Existing chunk files of `table` in `dir`, in chunk order.
pub fn chunk_files(dir: &Path, table: &str, format: ExportFormat) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for index in 1.. {
        let path = dir.join(chunk_file_name(table, index, format));
        if !path.is_file() {
            break;
        }
        files.push(path);
    }
    files
}

/// File name of a table's column metadata dump.
pub fn structure_file_name(table: &str) -> String {
    format!("{}_structure.json", table)
}

/// Write through a temporary file so readers never see a partial file.
pub(crate) fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);
    std::fs::write(&temp_path, content)?;
    std::fs::rename(&temp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    fn organizations() -> Vec<Record> {
        vec![
            json!({"id": 1, "name": "Acme", "settings": {"public": true}, "deleted_at": null}),
            json!({"id": 2, "name": "O'Brien & Co", "settings": null, "deleted_at": null}),
        ]
        .into_iter()
        .map(|v| v.as_object().cloned().unwrap())
        .collect()
    }

    #[test]
    fn test_format_names() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert!("xml".parse::<ExportFormat>().is_err());
        assert_eq!(ExportFormat::default(), ExportFormat::Json);
        assert_eq!(
            serde_json::to_value(ExportFormat::Sql).unwrap(),
            json!("sql")
        );
    }

    #[test]
    fn test_chunk_file_names() {
        assert_eq!(chunk_file_name("users", 1, ExportFormat::Json), "users.json");
        assert_eq!(chunk_file_name("users", 2, ExportFormat::Csv), "users_2.csv");
        assert_eq!(structure_file_name("users"), "users_structure.json");
    }

    #[test]
    fn test_chunk_files_stop_at_gap() {
        let dir = TempDir::new().unwrap();
        for name in ["posts.json", "posts_2.json", "posts_4.json", "posts_structure.json"] {
            std::fs::write(dir.path().join(name), "[]").unwrap();
        }
        let files = chunk_files(dir.path(), "posts", ExportFormat::Json);
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["posts.json", "posts_2.json"]);
        assert!(chunk_files(dir.path(), "users", ExportFormat::Json).is_empty());
    }

    #[test]
    fn test_json_file_keeps_structure() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("organizations.json");
        ExportFormat::Json
            .write_file(&path, "organizations", &organizations())
            .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("[\n"));

        let back = ExportFormat::Json.read_file(&path).unwrap();
        assert_eq!(back, organizations());
        assert!(!dir.path().join("organizations.json.tmp").exists());
    }

    #[test]
    fn test_csv_file_reads_back_as_text() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("organizations.csv");
        ExportFormat::Csv
            .write_file(&path, "organizations", &organizations())
            .unwrap();

        let back = ExportFormat::Csv.read_file(&path).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back[0]["id"], json!("1"));
        assert_eq!(back[0]["settings"], json!(r#"{"public":true}"#));
        assert_eq!(back[1]["name"], json!("O'Brien & Co"));
        assert_eq!(back[1]["settings"], Value::Null);
    }

    #[test]
    fn test_sql_files_are_write_only() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("organizations.sql");
        ExportFormat::Sql
            .write_file(&path, "organizations", &organizations())
            .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);

        let err = ExportFormat::Sql.read_file(&path).unwrap_err();
        assert!(matches!(err, MigrateError::UnsupportedFormat(_)));
    }
}
