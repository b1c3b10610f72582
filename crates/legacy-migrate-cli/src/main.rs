//! legacy-migrate CLI - export, import, seed and migrate legacy application data.

use clap::{Parser, Subcommand};
use legacy_migrate::drivers::{connect_legacy, connect_target};
use legacy_migrate::error::EXIT_FAILURE;
use legacy_migrate::{
    CommandBackupService, Config, ExportFormat, ExportOptions, Exporter, ImportOptions, Importer,
    LegacySource, MigrateError, MigrateOptions, Orchestrator, RunStatus, SeedOptions, Seeder,
    TableCatalog, TargetStore,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "legacy-migrate")]
#[command(about = "Migrate legacy application data into the restructured schema")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "migration.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export legacy tables to chunked files
    Export {
        /// Legacy connection name [default: legacy_connection from config]
        #[arg(long)]
        connection: Option<String>,

        /// Tables to export (legacy or target names) [default: all]
        #[arg(long, num_args = 1..)]
        tables: Vec<String>,

        /// Output directory [default: export.output_dir from config]
        #[arg(long)]
        output: Option<PathBuf>,

        /// Export format: json, csv or sql
        #[arg(long)]
        format: Option<ExportFormat>,

        /// Rows per chunk file
        #[arg(long)]
        chunk: Option<usize>,
    },

    /// Import exported files into the target schema
    Import {
        /// Directory holding the export [default: export.output_dir from config]
        #[arg(long)]
        source: Option<PathBuf>,

        /// Tables to import [default: every exported table]
        #[arg(long, num_args = 1..)]
        tables: Vec<String>,

        /// Validate records against table rules before inserting
        #[arg(long)]
        validate: bool,

        /// Process everything without writing to the target
        #[arg(long)]
        dry_run: bool,

        /// Records per processing chunk
        #[arg(long)]
        chunk: Option<usize>,

        /// Leave records whose primary key already exists alone
        #[arg(long)]
        skip_existing: bool,
    },

    /// Bulk-load exported files into the target schema
    Seed {
        /// Directory holding the export [default: export.output_dir from config]
        #[arg(long)]
        source: Option<PathBuf>,

        /// Tables to seed [default: every exported table]
        #[arg(long, num_args = 1..)]
        tables: Vec<String>,

        /// Records per bulk insert
        #[arg(long)]
        chunk: Option<usize>,
    },

    /// Run backup, export, import and validation as one migration
    Migrate {
        /// Back up the target before importing
        #[arg(long)]
        backup: bool,

        /// Compare row counts after the import
        #[arg(long)]
        validate: bool,

        /// Import without writing; backup and validation are skipped
        #[arg(long)]
        dry_run: bool,

        /// Export directory [default: export.output_dir from config]
        #[arg(long)]
        source: Option<PathBuf>,

        /// Legacy connection name [default: legacy_connection from config]
        #[arg(long)]
        connection: Option<String>,

        /// Reuse an existing export
        #[arg(long)]
        skip_export: bool,

        /// Stop after the export
        #[arg(long)]
        skip_import: bool,

        /// Tables to migrate [default: all]
        #[arg(long, num_args = 1..)]
        tables: Vec<String>,
    },

    /// Print the table load order and legacy-to-target mapping
    Catalog,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

/// Returns the process exit code for runs that finished with errors.
async fn run() -> Result<u8, MigrateError> {
    let cli = Cli::parse();

    let catalog = Arc::new(TableCatalog::standard());

    // The catalog is static and needs neither logging nor configuration
    if let Commands::Catalog = cli.command {
        print_catalog(&catalog, cli.output_json)?;
        return Ok(0);
    }

    setup_logging(&cli.verbosity, &cli.log_format);

    let config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Catalog => unreachable!(), // Handled above

        Commands::Export {
            connection,
            tables,
            output,
            format,
            chunk,
        } => {
            let legacy = open_legacy(&config, connection.as_deref()).await?;
            let options = ExportOptions {
                output_dir: output.unwrap_or_else(|| config.export.output_dir.clone()),
                tables,
                format: format.unwrap_or(config.export.format),
                chunk_size: chunk.unwrap_or(config.export.chunk_size),
            };
            let manifest = Exporter::new(legacy, catalog).export(&options).await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&manifest)?);
            } else {
                println!("\nExport completed!");
                print!("{}", manifest.render_text());
            }
            // Table errors, unknown table names included, fail the command the
            // same way they fail the export step of `migrate`
            Ok(if manifest.has_errors() { EXIT_FAILURE } else { 0 })
        }

        Commands::Import {
            source,
            tables,
            validate,
            dry_run,
            chunk,
            skip_existing,
        } => {
            let target = open_target(&config).await?;
            let options = ImportOptions {
                source_dir: source.unwrap_or_else(|| config.export.output_dir.clone()),
                tables,
                validate,
                dry_run,
                chunk_size: chunk.unwrap_or(config.import.chunk_size),
                skip_existing,
                max_errors: config.import.max_errors,
            };
            let summary = Importer::new(target, catalog).run(&options).await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                let status_msg = if dry_run { "Dry run completed!" } else { "Import completed!" };
                println!("\n{}", status_msg);
                print!("{}", summary.render_text());
            }
            Ok(if summary.has_errors() { EXIT_FAILURE } else { 0 })
        }

        Commands::Seed {
            source,
            tables,
            chunk,
        } => {
            let target = open_target(&config).await?;
            let options = SeedOptions {
                source_dir: source.unwrap_or_else(|| config.export.output_dir.clone()),
                tables,
                chunk_size: chunk.unwrap_or(config.seed.chunk_size),
            };
            let summary = Seeder::new(target, catalog).run(&options).await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("\nSeeding completed!");
                print!("{}", summary.render_text());
            }
            Ok(if summary.has_failures() { EXIT_FAILURE } else { 0 })
        }

        Commands::Migrate {
            backup,
            validate,
            dry_run,
            source,
            connection,
            skip_export,
            skip_import,
            tables,
        } => {
            let legacy = open_legacy(&config, connection.as_deref()).await?;
            let target = open_target(&config).await?;
            let backup_service = Arc::new(CommandBackupService::new(config.backup.command.clone()));

            let orchestrator = Orchestrator::new(legacy, target, catalog, backup_service)
                .with_config_hash(config.hash());
            let options = MigrateOptions {
                backup,
                validate,
                dry_run,
                source_dir: source.unwrap_or_else(|| config.export.output_dir.clone()),
                connection,
                skip_export,
                skip_import,
                tables,
            };
            let result = orchestrator.run(options).await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                let status_msg = match result.status {
                    RunStatus::Failed => "Migration failed!",
                    _ if dry_run => "Dry run completed!",
                    _ => "Migration completed!",
                };
                println!("\n{}", status_msg);
                print!("{}", result.render_text());
            }
            Ok(if result.status == RunStatus::Failed { EXIT_FAILURE } else { 0 })
        }
    }
}

async fn open_legacy(
    config: &Config,
    name: Option<&str>,
) -> Result<Arc<dyn LegacySource>, MigrateError> {
    let connection = config.legacy(name).ok_or_else(|| {
        MigrateError::Config(format!(
            "Unknown legacy connection '{}'",
            name.unwrap_or(&config.legacy_connection)
        ))
    })?;
    info!("Connecting to legacy database {}", connection.display_url());
    connect_legacy(connection).await
}

async fn open_target(config: &Config) -> Result<Arc<dyn TargetStore>, MigrateError> {
    let connection = config.target().ok_or_else(|| {
        MigrateError::Config(format!(
            "Unknown target connection '{}'",
            config.target_connection
        ))
    })?;
    info!("Connecting to target database {}", connection.display_url());
    connect_target(connection).await
}

fn print_catalog(catalog: &TableCatalog, as_json: bool) -> Result<(), MigrateError> {
    if as_json {
        let value = serde_json::json!({
            "load_order": catalog.load_order(),
            "table_mapping": catalog.table_mapping(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("Load order:");
    for (i, spec) in catalog.specs().iter().enumerate() {
        println!("  {:>2}. {} <- {}", i + 1, spec.target_name, spec.legacy_name);
    }
    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
