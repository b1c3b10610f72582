//! Error types for the migration pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Exit code for configuration errors and failed runs.
pub const EXIT_FAILURE: u8 = 1;

/// Exit code when the legacy or target database cannot be reached.
pub const EXIT_CONNECTION_ERROR: u8 = 2;

/// Exit code for file system errors.
pub const EXIT_IO_ERROR: u8 = 7;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Table catalog is inconsistent (unknown table, broken load order).
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Legacy or target store cannot be reached. Fatal for the whole run.
    #[error("Cannot connect to {target} database: {message}")]
    Connection { target: String, message: String },

    /// A single table could not be exported or imported.
    #[error("Table {table}: {message}")]
    Table { table: String, message: String },

    /// A single record failed validation, transformation or insertion.
    #[error("Record in {table}: {message}")]
    Record { table: String, message: String },

    /// The export summary is required before import or seeding can run.
    #[error("Export manifest not found at {0:?} - run an export first")]
    ManifestMissing(PathBuf),

    /// Export format cannot be loaded back as structured records.
    #[error("Format '{0}' cannot be re-imported; execute the file directly instead")]
    UnsupportedFormat(String),

    /// A required orchestration step failed.
    #[error("Step '{step}' failed: {message}")]
    StepFailed { step: String, message: String },

    /// Backup service error
    #[error("Backup failed: {0}")]
    Backup(String),

    /// Validation service error
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Legacy database query error
    #[error("Legacy database error: {0}")]
    Source(#[from] sqlx::Error),

    /// Target database query error
    #[error("Target database error: {0}")]
    Target(#[from] mysql_async::Error),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV reading/writing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl MigrateError {
    /// Create a Connection error.
    pub fn connection(target: impl Into<String>, message: impl std::fmt::Display) -> Self {
        MigrateError::Connection {
            target: target.into(),
            message: message.to_string(),
        }
    }

    /// Create a Table error
    pub fn table(table: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Table {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a Record error
    pub fn record(table: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Record {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a StepFailed error
    pub fn step(step: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::StepFailed {
            step: step.into(),
            message: message.into(),
        }
    }

    /// Report a failed reachability check as a connection error.
    pub fn into_connection(self, target: &str) -> Self {
        match self {
            MigrateError::Connection { .. } => self,
            other => MigrateError::connection(target, other),
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Connection { .. } => EXIT_CONNECTION_ERROR,
            MigrateError::Io(_) | MigrateError::ManifestMissing(_) => EXIT_IO_ERROR,
            _ => EXIT_FAILURE,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(MigrateError::Config("x".into()).exit_code(), EXIT_FAILURE);
        assert_eq!(
            MigrateError::connection("legacy", "refused").exit_code(),
            EXIT_CONNECTION_ERROR
        );
        assert_eq!(
            MigrateError::ManifestMissing(PathBuf::from("exports")).exit_code(),
            EXIT_IO_ERROR
        );
    }

    #[test]
    fn test_format_detailed_includes_message() {
        let err = MigrateError::table("users", "export file not found");
        let detailed = err.format_detailed();
        assert!(detailed.starts_with("Error: Table users: export file not found"));
    }

    #[test]
    fn test_into_connection() {
        let err = MigrateError::table("users", "timeout").into_connection("target");
        assert!(matches!(err, MigrateError::Connection { ref target, .. } if target == "target"));
        let err = MigrateError::connection("legacy", "refused").into_connection("target");
        assert!(err.to_string().contains("legacy"));
    }
}
