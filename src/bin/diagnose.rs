//! Backup Diagnostic CLI
//!
//! Diagnoses a backup file and optionally repairs it.
//!
//! Exit code is 0 when the backup is healthy and 1 otherwise, including
//! when the file cannot be read or parsed or the arguments are wrong.
//! Running it without arguments prints the help and exits 0.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use adkar_backup::{BackupConfig, TracingSink, Verdict};
use anyhow::Context;
use clap::error::ErrorKind;
use clap::Parser;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "diagnose")]
#[command(about = "Diagnose and repair adkar bot backup files")]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Backup file to diagnose
    file: PathBuf,

    /// Attempt to repair the backup automatically
    #[arg(long)]
    repair: bool,

    /// Save the repaired backup to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Show detailed diagnostic information and trace the migration steps
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file
    #[arg(short, long)]
    config: Option<String>,
}

/// Help and version requests are not failures
fn is_informational(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::DisplayHelp
            | ErrorKind::DisplayVersion
            | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
    )
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if is_informational(e.kind()) {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            };
        }
    };

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("❌ Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<bool> {
    let config = BackupConfig::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    let diagnostician = config.diagnostician()?;
    let rule = "=".repeat(60);

    let path = fs::canonicalize(&cli.file)
        .with_context(|| format!("File not found: {}", cli.file.display()))?;

    println!("🔍 Backup Diagnostic Tool");
    println!("{}", rule);
    println!("📁 File: {}", path.display());
    println!("{}", rule);

    let content = fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let doc: Value = match serde_json::from_str(&content) {
        Ok(doc) => doc,
        Err(e) => {
            eprintln!("❌ Error loading backup file: {}", e);
            eprintln!("\n💡 Suggestion: The file contains invalid JSON.");
            eprintln!("   Please check that the file is not corrupted or truncated.");
            return Ok(false);
        }
    };
    println!("✅ Backup file loaded successfully");
    println!("📊 File size: {:.2} KB", content.len() as f64 / 1024.0);

    println!("\n🔬 Running diagnostic checks...");
    let report = diagnostician.diagnose(&doc);
    print!("{}", report.render());
    if cli.verbose {
        println!("{}", serde_json::to_string_pretty(&report)?);
        if let Err(e) = config.version_manager()?.migrate(&doc, &mut TracingSink) {
            tracing::debug!(error = %e, "backup cannot be migrated");
        }
    }

    if cli.repair {
        println!("\n🔧 Attempting to repair backup...\n");
        let outcome = config.repairer()?.repair(&doc);

        if !outcome.success {
            eprintln!("❌ Repair failed");
            eprintln!("\n📝 Repair log:");
            for (index, line) in outcome.repair_log.iter().enumerate() {
                eprintln!("  {}. {}", index + 1, line);
            }
            return Ok(false);
        }

        println!("✅ Repair completed successfully");
        println!("\n📝 Repair log:");
        for (index, line) in outcome.repair_log.iter().enumerate() {
            println!("  {}. {}", index + 1, line);
        }

        match &cli.output {
            Some(output) => {
                let json = serde_json::to_string_pretty(&outcome.repaired_data)?;
                fs::write(output, json)
                    .with_context(|| format!("Error saving repaired backup to {}", output.display()))?;
                println!("\n💾 Repaired backup saved to: {}", output.display());

                println!("\n🔬 Running diagnostics on repaired backup...");
                let repaired = diagnostician.diagnose(&outcome.repaired_data);
                print!("{}", repaired.render());
                if repaired.is_healthy {
                    println!("🎉 Repaired backup is healthy and ready to use!");
                } else {
                    println!("⚠️  Repaired backup still has some issues. Manual intervention may be required.");
                }
            }
            None => {
                println!("\n💡 To save the repaired backup, use --output <filename>");
                println!(
                    "   Example: diagnose {} --repair --output repaired.json",
                    cli.file.display()
                );
            }
        }
    }

    match report.verdict() {
        Verdict::Healthy => {
            println!("\n🎉 Backup file is healthy!");
            Ok(true)
        }
        Verdict::UnhealthyFixable => {
            println!("\n💡 Backup has issues but they appear fixable.");
            println!("   Run with --repair flag to attempt automatic repair:");
            println!("   diagnose {} --repair --output repaired.json", cli.file.display());
            Ok(false)
        }
        Verdict::UnhealthyUnfixable => {
            println!("\n🚨 Backup has critical issues that cannot be automatically repaired.");
            println!("   Manual intervention is required.");
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_arguments_shows_help() {
        let err = Cli::try_parse_from(["diagnose"]).err().unwrap();
        assert!(is_informational(err.kind()));
    }

    #[test]
    fn test_usage_errors_fail() {
        let err = Cli::try_parse_from(["diagnose", "backup.json", "--bogus"]).err().unwrap();
        assert!(!is_informational(err.kind()));
    }

    #[test]
    fn test_repair_flags() {
        let cli = Cli::try_parse_from(["diagnose", "backup.json", "--repair", "-o", "fixed.json"]).unwrap();
        assert!(cli.repair);
        assert_eq!(cli.output, Some(PathBuf::from("fixed.json")));
        assert!(!cli.verbose);
    }
}
