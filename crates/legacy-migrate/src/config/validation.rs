//! Configuration validation.

use super::{Config, ConnectionConfig};
use crate::error::{MigrateError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    for (name, conn) in &config.connections {
        validate_connection(name, conn)?;
    }

    let legacy = config.legacy(None).ok_or_else(|| {
        MigrateError::Config(format!(
            "legacy_connection '{}' is not defined under connections",
            config.legacy_connection
        ))
    })?;
    let target = config.target().ok_or_else(|| {
        MigrateError::Config(format!(
            "target_connection '{}' is not defined under connections",
            config.target_connection
        ))
    })?;

    // Cannot migrate into the database being read
    if legacy.host == target.host
        && legacy.port == target.port
        && legacy.database == target.database
    {
        return Err(MigrateError::Config(
            "legacy and target connections cannot point at the same database".into(),
        ));
    }

    if config.export.chunk_size == 0 {
        return Err(MigrateError::Config(
            "export.chunk_size must be at least 1".into(),
        ));
    }
    if config.import.chunk_size == 0 {
        return Err(MigrateError::Config(
            "import.chunk_size must be at least 1".into(),
        ));
    }
    if config.import.max_errors == 0 {
        return Err(MigrateError::Config(
            "import.max_errors must be at least 1".into(),
        ));
    }
    if config.seed.chunk_size == 0 {
        return Err(MigrateError::Config(
            "seed.chunk_size must be at least 1".into(),
        ));
    }

    Ok(())
}

fn validate_connection(name: &str, conn: &ConnectionConfig) -> Result<()> {
    if conn.driver != "mysql" {
        return Err(MigrateError::Config(format!(
            "connections.{}.driver must be 'mysql', got '{}'",
            name, conn.driver
        )));
    }
    if conn.host.is_empty() {
        return Err(MigrateError::Config(format!(
            "connections.{}.host is required",
            name
        )));
    }
    if conn.database.is_empty() {
        return Err(MigrateError::Config(format!(
            "connections.{}.database is required",
            name
        )));
    }
    if conn.user.is_empty() {
        return Err(MigrateError::Config(format!(
            "connections.{}.user is required",
            name
        )));
    }
    Ok(())
}
