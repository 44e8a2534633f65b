//! Backup Snapshot CLI
//!
//! Creates, lists, prunes and inspects backup snapshots.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use adkar_backup::{
    extract_metadata, format_bytes, validate_metadata, verify_checksum, BackupConfig, RestorePlanner,
};
use anyhow::Context;
use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "backup-snapshot")]
#[command(about = "Create and manage adkar bot backup snapshots")]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Snapshot directory (overrides the configured one)
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Snapshot a data file and prune old snapshots
    Create {
        /// JSON file holding categories, adkar and groups
        data: PathBuf,

        /// Free-text description stored in the metadata
        #[arg(short = 'm', long, default_value = "")]
        description: String,
    },

    /// List snapshots, newest first
    List,

    /// Delete all but the newest snapshots
    Prune,

    /// Show a snapshot's metadata
    Info {
        file: PathBuf,
    },

    /// Verify a snapshot's checksum
    Verify {
        file: PathBuf,
    },

    /// Check that a backup can be restored, without restoring it
    RestoreCheck {
        file: PathBuf,
    },

    /// Show the current backup version and the supported ones
    Versions,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp
                | ErrorKind::DisplayVersion
                | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("❌ Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("{} is not valid JSON", path.display()))
}

fn run(cli: Cli) -> anyhow::Result<bool> {
    let mut config = BackupConfig::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(dir) = cli.dir {
        config.store.dir = dir;
    }
    let store = config.snapshot_store();

    match cli.command {
        Commands::Create { data, description } => {
            let doc = read_json(&data)?;
            // accept a bare data block or a whole envelope
            let data_block = doc.get("data").filter(|d| d.is_object()).unwrap_or(&doc);

            let path = store.create_snapshot(data_block, &description)?;
            println!("✅ Snapshot created: {}", path.display());

            for deleted in store.prune()? {
                println!("🗑️  Removed old snapshot: {}", deleted.display());
            }
            println!("💾 Snapshots kept: {}", store.list()?.len());
            Ok(true)
        }

        Commands::List => {
            let snapshots = store.list()?;
            if snapshots.is_empty() {
                println!("No snapshots in {}", store.dir().display());
                return Ok(true);
            }

            println!("📋 {} snapshot(s) in {}", snapshots.len(), store.dir().display());
            for snapshot in snapshots {
                println!(
                    "  {}  {}  {}",
                    snapshot.created_at.format("%Y-%m-%d %H:%M:%S"),
                    format_bytes(snapshot.size_bytes),
                    snapshot.filename
                );
            }
            Ok(true)
        }

        Commands::Prune => {
            let deleted = store.prune()?;
            if deleted.is_empty() {
                println!("✅ Nothing to prune (keeping {})", store.keep());
            } else {
                for path in &deleted {
                    println!("🗑️  Removed {}", path.display());
                }
                println!("✅ Pruned {} snapshot(s)", deleted.len());
            }
            Ok(true)
        }

        Commands::Info { file } => {
            let doc = store.load(&file)?;
            let Some(summary) = extract_metadata(&doc) else {
                println!("❌ Backup is empty");
                return Ok(false);
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);

            match doc.get("metadata") {
                Some(metadata) => {
                    let validation = validate_metadata(metadata);
                    for error in &validation.errors {
                        println!("  ❌ {}", error);
                    }
                    Ok(validation.valid)
                }
                None => {
                    println!("⚠️  Backup carries no metadata");
                    Ok(true)
                }
            }
        }

        Commands::Verify { file } => {
            let doc = store.load(&file)?;
            if verify_checksum(&doc) {
                println!("✅ Checksum valid");
                Ok(true)
            } else {
                println!("❌ Checksum missing or does not match");
                Ok(false)
            }
        }

        Commands::RestoreCheck { file } => {
            let bytes = fs::read(&file).with_context(|| format!("failed to read {}", file.display()))?;
            let planner = RestorePlanner::new(config.version_manager()?);
            let plan = planner.prepare(&bytes)?;

            println!("✅ Backup can be restored");
            println!("  Source version: {}", plan.source_version);
            println!("  Checksum: {:?}", plan.checksum);
            for line in &plan.migration_log {
                println!("  • {}", line);
            }
            for warning in &plan.validation.warnings {
                println!("  ⚠️  {}", warning.message);
            }
            Ok(true)
        }

        Commands::Versions => {
            let info = config.version_manager()?.version_info();
            println!("📦 {}", info.description);
            println!("  Current: {}", info.current);
            println!("  Supported: {}", info.supported.join(", "));
            Ok(true)
        }
    }
}
