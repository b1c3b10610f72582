//! Database driver implementations.
//!
//! - [`mysql`]: MySQL/MariaDB legacy reader and target writer
//! - [`memory`]: in-memory stores for rehearsals and tests
//!
//! [`connect_legacy`] and [`connect_target`] pick the driver named in a
//! connection's configuration.

pub mod memory;
pub mod mysql;

use std::sync::Arc;

pub use memory::{MemoryLegacySource, MemoryTargetStore};
pub use mysql::{MysqlLegacyReader, MysqlTargetWriter};

use crate::config::ConnectionConfig;
use crate::core::traits::{LegacySource, TargetStore};
use crate::error::{MigrateError, Result};

/// Open the legacy store described by `config`.
pub async fn connect_legacy(config: &ConnectionConfig) -> Result<Arc<dyn LegacySource>> {
    match config.driver.as_str() {
        "mysql" => Ok(Arc::new(MysqlLegacyReader::connect(config).await?)),
        other => Err(MigrateError::Config(format!(
            "Unsupported legacy driver '{}'",
            other
        ))),
    }
}

/// Open the target store described by `config`.
pub async fn connect_target(config: &ConnectionConfig) -> Result<Arc<dyn TargetStore>> {
    match config.driver.as_str() {
        "mysql" => Ok(Arc::new(MysqlTargetWriter::connect(config).await?)),
        other => Err(MigrateError::Config(format!(
            "Unsupported target driver '{}'",
            other
        ))),
    }
}
