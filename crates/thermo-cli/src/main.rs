//! Thermo CLI - offline inspection for the fan control daemon
//!
//! Reads the persisted value table and cycle history directly from disk and
//! queries the daemon's status endpoint. Nothing here writes daemon state.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::unused_async)]
#![allow(clippy::cast_precision_loss)]

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{config, history, status, table};

#[derive(Parser)]
#[command(name = "thermo")]
#[command(author, version, about = "Thermo - fan control inspection CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file used to locate the table and history
    #[arg(short, long, global = true, env = "THERMO_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect the learned value table
    #[command(subcommand)]
    Table(table::TableCommands),

    /// Summarize recent cycles from the CSV history
    History(history::HistoryArgs),

    /// Configuration inspection
    #[command(subcommand)]
    Config(config::ConfigCommands),

    /// Show live daemon status
    Status(status::StatusArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = if cli.verbose { "debug" } else { "warn" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("thermo={log_level},thermo_core={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Table(cmd) => table::run(cmd, config_path).await,
        Commands::History(args) => history::run(args, config_path).await,
        Commands::Config(cmd) => config::run(cmd, config_path).await,
        Commands::Status(args) => status::run(args).await,
    }
}
