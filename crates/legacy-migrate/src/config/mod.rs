//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::Result;
use sha2::{Digest, Sha256};
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Compute a SHA256 hash of the configuration, recorded in run summaries.
    pub fn hash(&self) -> String {
        let yaml = serde_yaml::to_string(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(yaml.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

impl ConnectionConfig {
    /// Build a `mysql://` URL (used for log lines, password omitted).
    pub fn display_url(&self) -> String {
        format!(
            "mysql://{}@{}:{}/{}",
            self.user, self.host, self.port, self.database
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ExportFormat;

    const YAML: &str = r#"
connections:
  legacy:
    host: old-db.internal
    database: legacy_app
    user: reader
    password: secret
  mysql:
    host: new-db.internal
    database: app
    user: writer
export:
  format: csv
"#;

    #[test]
    fn test_from_yaml_applies_defaults() {
        let config = Config::from_yaml(YAML).unwrap();
        assert_eq!(config.legacy_connection, "legacy");
        assert_eq!(config.target_connection, "mysql");
        assert_eq!(config.export.format, ExportFormat::Csv);
        assert_eq!(config.export.chunk_size, 1000);
        assert_eq!(config.import.chunk_size, 500);
        assert_eq!(config.import.max_errors, 100);
        assert_eq!(config.legacy(None).unwrap().port, 3306);
        assert!(config.backup.command.is_empty());
    }

    #[test]
    fn test_legacy_override_name() {
        let config = Config::from_yaml(YAML).unwrap();
        assert!(config.legacy(Some("mysql")).is_some());
        assert!(config.legacy(Some("missing")).is_none());
    }

    #[test]
    fn test_hash_is_stable() {
        let config = Config::from_yaml(YAML).unwrap();
        assert_eq!(config.hash(), config.clone().hash());
        assert_eq!(config.hash().len(), 64);
    }

    #[test]
    fn test_display_url_omits_password() {
        let config = Config::from_yaml(YAML).unwrap();
        let url = config.legacy(None).unwrap().display_url();
        assert_eq!(url, "mysql://reader@old-db.internal:3306/legacy_app");
    }

    #[test]
    fn test_missing_connections_is_error() {
        assert!(Config::from_yaml("export:\n  chunk_size: 10\n").is_err());
    }
}
