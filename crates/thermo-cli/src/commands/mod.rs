//! CLI command modules

use std::path::{Path, PathBuf};

use anyhow::Result;
use thermo_core::Config;

pub mod config;
pub mod history;
pub mod status;
pub mod table;

/// Use the path given on the command line, or the one the daemon is
/// configured with
pub fn resolve_path(
    explicit: Option<PathBuf>,
    config_path: Option<&Path>,
    configured: impl FnOnce(Config) -> String,
) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path);
    }
    let config = Config::load_from(config_path)?;
    let path = PathBuf::from(configured(config));
    tracing::debug!("Using configured path {}", path.display());
    Ok(path)
}

/// Arithmetic mean, 0.0 for no values
pub fn mean(values: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
