//! Thermo Daemon - host fan control loop
//!
//! Reads the coolant and NVMe temperatures every cycle, drives the radiator
//! and chassis fans, learns a value table of its own decisions, and forces
//! maximum cooling when a critical threshold is crossed.

// Pedantic clippy allows - intentional design decisions for this crate:
// - doc_markdown: device and command names are not code identifiers
// - too_many_lines: main keeps logging setup in one place
// - cast_possible_truncation: bounded counts converted for metrics
// - cast_possible_wrap: usize to i64 gauge values are small
// - cast_lossless: u8/bool to i64 gauge conversions are intentional
// - manual_let_else: match with Ok/Some patterns is often clearer than let-else
// - unused_async: Async handlers maintain consistency in axum
#![allow(clippy::doc_markdown)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::manual_let_else)]
#![allow(clippy::unused_async)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod actuator;
mod command;
mod daemon;
mod event_log;
mod metrics;
mod notifier;
mod sensors;
mod store;

use thermo_core::Config;

use crate::daemon::ThermoDaemon;

#[derive(Parser, Debug)]
#[command(name = "thermod")]
#[command(about = "Thermal fan control daemon", long_about = None)]
#[command(version)]
struct Args {
    /// Config file (defaults to the standard search path)
    #[arg(short, long, env = "THERMO_CONFIG")]
    config: Option<PathBuf>,

    /// Log at debug level regardless of configuration
    #[arg(long)]
    debug: bool,

    /// Discard the persisted value table and start learning from scratch
    #[arg(long)]
    reset_table: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Invalid configuration is fatal before any cycle runs
    let config = Config::load_from(args.config.as_deref())?;

    let level = if args.debug {
        "debug"
    } else {
        config.daemon.log_level.as_str()
    };

    // Initialize tracing with optional file logging
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("thermod={level},thermo_rl={level},thermo_core={level},tower_http=info").into()
    });

    let file_logging_enabled = if !config.daemon.log_file.is_empty() {
        let log_path = std::path::Path::new(&config.daemon.log_file);
        let log_dir = log_path.parent().unwrap_or(std::path::Path::new("."));
        let log_filename = log_path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("thermod.log");

        // Try to create log directory and test write permissions
        let can_write = (|| -> std::io::Result<()> {
            if !log_dir.exists() {
                std::fs::create_dir_all(log_dir)?;
            }
            let test_path = log_dir.join(".write_test");
            std::fs::write(&test_path, "test")?;
            std::fs::remove_file(&test_path)?;
            Ok(())
        })();

        match can_write {
            Ok(()) => {
                let file_appender = tracing_appender::rolling::never(log_dir, log_filename);
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .with_ansi(false)
                            .with_writer(non_blocking),
                    )
                    .with(tracing_subscriber::fmt::layer().with_writer(std::io::stdout))
                    .init();

                // Keep guard alive for entire program
                Box::leak(Box::new(guard));
                true
            }
            Err(e) => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(tracing_subscriber::fmt::layer())
                    .init();
                eprintln!(
                    "Warning: Could not set up file logging to '{}': {}. Using stdout only.",
                    config.daemon.log_file, e
                );
                false
            }
        }
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
        false
    };

    info!("Starting thermod v{}", env!("CARGO_PKG_VERSION"));
    if file_logging_enabled {
        info!("Logging to file: {}", config.daemon.log_file);
    } else if !config.daemon.log_file.is_empty() {
        warn!("File logging was configured but could not be enabled");
    }
    info!(
        radiator_target = config.control.radiator.target,
        storage_target = config.control.storage.target,
        interval_seconds = config.control.schedule.interval_seconds,
        "Configuration loaded"
    );
    if args.reset_table {
        warn!("--reset-table given: the persisted value table will be overwritten");
    }

    let daemon = Arc::new(ThermoDaemon::new(config, args.reset_table).await?);
    let daemon_handle = daemon.clone();

    let mut daemon_task = tokio::spawn(async move { daemon.run().await });

    tokio::select! {
        () = shutdown_signal() => {
            info!("Initiating graceful shutdown...");
            daemon_handle.shutdown();
            match daemon_task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Daemon error during shutdown: {:#}", e),
                Err(e) => error!("Daemon task failed: {}", e),
            }
        }
        result = &mut daemon_task => {
            let reason = match result {
                Ok(Ok(())) => "control loop exited unexpectedly".to_string(),
                Ok(Err(e)) => format!("{e:#}"),
                Err(e) => e.to_string(),
            };
            error!("Daemon error: {}", reason);
            daemon_handle.report_failure(&reason).await;
            anyhow::bail!(reason);
        }
    }

    info!("thermod stopped");
    Ok(())
}

/// Wait for shutdown signal (SIGINT, SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {}. Using fallback.", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}. Using Ctrl+C only.", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        () = terminate => {
            info!("Received SIGTERM");
        }
    }
}
