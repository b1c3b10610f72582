//! # legacy-migrate
//!
//! Moves application data from a legacy MySQL schema into a restructured
//! target schema.
//!
//! The pipeline has three stages that can be run separately or together:
//!
//! - **Export** reads legacy tables in primary-key order and writes chunked
//!   JSON, CSV or SQL files plus an export summary
//! - **Import** loads exported files with validation, an error budget per
//!   table, dry-run and skip-existing support
//! - **Seed** bulk-loads exported files with a per-record fallback when a
//!   batch insert fails
//!
//! The [`Orchestrator`] chains backup, export, import and row-count
//! validation into one recorded run. Table rules (names, load order,
//! required/boolean/JSON/numeric fields) live in an immutable
//! [`TableCatalog`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use legacy_migrate::{drivers, CommandBackupService, Config, MigrateOptions, Orchestrator, TableCatalog};
//!
//! #[tokio::main]
//! async fn main() -> legacy_migrate::Result<()> {
//!     let config = Config::load("migration.yaml")?;
//!     let legacy = drivers::connect_legacy(&config.connections["legacy"]).await?;
//!     let target = drivers::connect_target(&config.connections["mysql"]).await?;
//!     let backup = Arc::new(CommandBackupService::new(config.backup.command.clone()));
//!     let catalog = Arc::new(TableCatalog::standard());
//!     let orchestrator = Orchestrator::new(legacy, target, catalog, backup);
//!     let run = orchestrator.run(MigrateOptions::default()).await?;
//!     println!("Run {} finished: {:?}", run.run_id, run.status);
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod codec;
pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod export;
pub mod import;
pub mod orchestrator;
pub mod seed;
pub mod transform;

// Re-exports for convenient access
pub use catalog::{TableCatalog, TableSpec};
pub use codec::ExportFormat;
pub use config::{Config, ConnectionConfig};
pub use crate::core::{ColumnInfo, LegacySource, Record, TargetStore};
pub use error::{MigrateError, Result};
pub use export::{ExportManifest, ExportOptions, Exporter};
pub use import::{ImportOptions, ImportResult, ImportSummary, Importer, TableOutcome};
pub use orchestrator::{
    BackupService, CommandBackupService, MigrateOptions, MigrationRun, Orchestrator, RunStatus,
    StepStatus,
};
pub use seed::{SeedOptions, SeedResult, SeedSummary, Seeder};
pub use transform::{RecordTransformer, TransformMode};
