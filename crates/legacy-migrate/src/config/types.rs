//! Configuration type definitions.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::codec::ExportFormat;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Named database connections.
    pub connections: BTreeMap<String, ConnectionConfig>,

    /// Connection holding the legacy schema (default: "legacy").
    #[serde(default = "default_legacy_connection")]
    pub legacy_connection: String,

    /// Connection receiving migrated data (default: "mysql").
    #[serde(default = "default_target_connection")]
    pub target_connection: String,

    /// Export defaults.
    #[serde(default)]
    pub export: ExportConfig,

    /// Import defaults.
    #[serde(default)]
    pub import: ImportConfig,

    /// Seeder defaults.
    #[serde(default)]
    pub seed: SeedConfig,

    /// Backup step configuration.
    #[serde(default)]
    pub backup: BackupConfig,
}

impl Config {
    /// Connection settings for the legacy store, honouring an override name.
    pub fn legacy(&self, name: Option<&str>) -> Option<&ConnectionConfig> {
        self.connections
            .get(name.unwrap_or(self.legacy_connection.as_str()))
    }

    /// Connection settings for the target store.
    pub fn target(&self) -> Option<&ConnectionConfig> {
        self.connections.get(&self.target_connection)
    }
}

/// A single database connection.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Database driver (only "mysql" is supported).
    #[serde(default = "default_mysql")]
    pub driver: String,

    /// Database host.
    pub host: String,

    /// Database port (default: 3306).
    #[serde(default = "default_mysql_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// SSL mode: disable, prefer, require (default: prefer).
    #[serde(default = "default_prefer")]
    pub ssl_mode: String,
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("driver", &self.driver)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// Export behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Output directory (default: "exports").
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Wire format (default: json).
    #[serde(default)]
    pub format: ExportFormat,

    /// Rows per chunk (default: 1000).
    #[serde(default = "default_export_chunk")]
    pub chunk_size: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            format: ExportFormat::default(),
            chunk_size: default_export_chunk(),
        }
    }
}

/// Import behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Records per processing chunk (default: 500).
    #[serde(default = "default_load_chunk")]
    pub chunk_size: usize,

    /// Record-level errors tolerated per table before it is abandoned (default: 100).
    #[serde(default = "default_max_errors")]
    pub max_errors: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_load_chunk(),
            max_errors: default_max_errors(),
        }
    }
}

/// Seeder behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedConfig {
    /// Records per bulk insert (default: 500).
    #[serde(default = "default_load_chunk")]
    pub chunk_size: usize,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_load_chunk(),
        }
    }
}

/// Backup step configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Command and arguments run to create a backup. The last line it prints
    /// is recorded as the backup location.
    #[serde(default)]
    pub command: Vec<String>,
}

fn default_legacy_connection() -> String {
    "legacy".to_string()
}

fn default_target_connection() -> String {
    "mysql".to_string()
}

fn default_mysql() -> String {
    "mysql".to_string()
}

fn default_mysql_port() -> u16 {
    3306
}

fn default_prefer() -> String {
    "prefer".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("exports")
}

fn default_export_chunk() -> usize {
    1000
}

fn default_load_chunk() -> usize {
    500
}

fn default_max_errors() -> usize {
    100
}
