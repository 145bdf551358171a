//! Sightline CLI
//!
//! Command-line interface for inspecting and pruning a durable Sightline store
//! without running the server.
//!
//! # Usage
//!
//! ```bash
//! sightline --help
//! sightline logs --db sightline.db --level error
//! sightline metrics --db sightline.db --since 1700000000
//! sightline prune --db sightline.db --max-age 3600
//! sightline count --db sightline.db
//! ```

#![deny(unsafe_code)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use sightline_core::models::LogLevel;
use sightline_core::query::{parse_since, ReadParams};
use sightline_core::storage::{
    BlockingLogStore, BlockingMetricStore, BlockingSqliteLogStore, BlockingSqliteMetricStore,
    SqliteLocation,
};
use std::io::Write;
use tracing_subscriber::EnvFilter;

/// Sightline CLI - inspect and prune a durable Sightline store
#[derive(Parser)]
#[command(name = "sightline")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print stored log entries, oldest first
    Logs {
        /// SQLite database file
        #[arg(long, env = "SIGHTLINE_DB_PATH")]
        db: String,
        /// Only entries strictly newer than this Unix timestamp
        #[arg(long)]
        since: Option<String>,
        /// Only entries at this level
        #[arg(long)]
        level: Option<String>,
    },
    /// Print stored metric samples, oldest first
    Metrics {
        /// SQLite database file
        #[arg(long, env = "SIGHTLINE_DB_PATH")]
        db: String,
        /// Only samples strictly newer than this Unix timestamp
        #[arg(long)]
        since: Option<String>,
    },
    /// Delete records older than a maximum age
    Prune {
        /// SQLite database file
        #[arg(long, env = "SIGHTLINE_DB_PATH")]
        db: String,
        /// Maximum age in seconds
        #[arg(long)]
        max_age: f64,
        /// Only prune logs at this level; metrics are left alone
        #[arg(long, value_parser = parse_level_arg)]
        level: Option<LogLevel>,
    },
    /// Print the number of stored logs and metrics
    Count {
        /// SQLite database file
        #[arg(long, env = "SIGHTLINE_DB_PATH")]
        db: String,
    },
}

fn parse_level_arg(raw: &str) -> Result<LogLevel, String> {
    raw.parse::<LogLevel>().map_err(|e| e.to_string())
}

#[derive(Debug, Serialize)]
struct PruneReport {
    logs_deleted: u64,
    metrics_deleted: u64,
}

#[derive(Debug, Serialize)]
struct CountReport {
    logs: u64,
    metrics: u64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let stdout = std::io::stdout();
    execute(cli.command, &mut stdout.lock())
}

fn execute(command: Commands, out: &mut impl Write) -> Result<()> {
    match command {
        Commands::Logs { db, since, level } => {
            let store = open_logs(&db)?;
            let query = ReadParams { since, level }.log_query();
            for entry in store.read(query)? {
                write_line(out, &entry)?;
            }
        }
        Commands::Metrics { db, since } => {
            let store = open_metrics(&db)?;
            let since = since.as_deref().map_or(0.0, parse_since);
            for sample in store.read(since)? {
                write_line(out, &sample)?;
            }
        }
        Commands::Prune { db, max_age, level } => {
            anyhow::ensure!(
                max_age.is_finite() && max_age >= 0.0,
                "--max-age must be a non-negative number of seconds"
            );
            let cutoff = sightline_core::now() - max_age;
            let logs = open_logs(&db)?;

            let report = match level {
                Some(level) => PruneReport {
                    logs_deleted: logs.delete_by_level_before(level, cutoff)?,
                    metrics_deleted: 0,
                },
                None => PruneReport {
                    logs_deleted: BlockingLogStore::delete_before(&logs, cutoff)?,
                    metrics_deleted: BlockingMetricStore::delete_before(
                        &open_metrics(&db)?,
                        cutoff,
                    )?,
                },
            };
            tracing::info!(
                db = %db,
                cutoff,
                logs = report.logs_deleted,
                metrics = report.metrics_deleted,
                "Pruned store"
            );
            write_line(out, &report)?;
        }
        Commands::Count { db } => {
            let report = CountReport {
                logs: BlockingLogStore::count(&open_logs(&db)?)?,
                metrics: BlockingMetricStore::count(&open_metrics(&db)?)?,
            };
            write_line(out, &report)?;
        }
    }
    Ok(())
}

fn open_logs(db: &str) -> Result<BlockingSqliteLogStore> {
    BlockingSqliteLogStore::new(SqliteLocation::parse(db))
        .with_context(|| format!("failed to open log store at {db}"))
}

fn open_metrics(db: &str) -> Result<BlockingSqliteMetricStore> {
    BlockingSqliteMetricStore::new(SqliteLocation::parse(db))
        .with_context(|| format!("failed to open metric store at {db}"))
}

fn write_line(out: &mut impl Write, value: &impl Serialize) -> Result<()> {
    serde_json::to_writer(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}
