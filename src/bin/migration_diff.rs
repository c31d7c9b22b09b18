//! Migration diff tool
//!
//! Compares the migration files in a directory with the ledger of migrations
//! that have run. Exits 0 when they match, 1 on a mismatch and 2 when an
//! input cannot be read.

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use common_cache::migrations::{read_ledger, read_migration_dir, MigrationDiff};

#[derive(Parser)]
#[command(name = "migration-diff")]
#[command(about = "Check migration files against the ran-migrations ledger", long_about = None)]
#[command(version)]
struct Cli {
    /// Directory holding migration files
    #[arg(short, long, default_value = "./migrations")]
    path: PathBuf,

    /// File listing ran migrations, one per line
    #[arg(short, long)]
    ledger: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn load(cli: &Cli) -> Result<MigrationDiff> {
    let on_disk = read_migration_dir(&cli.path)
        .with_context(|| format!("cannot read migration directory {}", cli.path.display()))?;
    let ran = read_ledger(&cli.ledger)
        .with_context(|| format!("cannot read ledger {}", cli.ledger.display()))?;

    info!(on_disk = on_disk.len(), ran = ran.len(), "loaded migrations");
    Ok(MigrationDiff::compute(&on_disk, &ran))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("common_cache={level},migration_diff={level}").into()),
        )
        .with_writer(io::stderr)
        .init();

    let diff = match load(&cli) {
        Ok(diff) => diff,
        Err(err) => {
            eprintln!("error: {:#}", err);
            return ExitCode::from(2);
        }
    };

    if diff.is_clean() {
        println!("migrations are in sync");
        return ExitCode::SUCCESS;
    }

    if let Err(err) = diff.report(&mut io::stderr().lock()) {
        error!(error = %err, "failed to write report");
    }
    ExitCode::from(1)
}
