//! Configuration inspection commands

use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;

use thermo_core::{AxisConfig, Config};

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration (file, environment and defaults merged)
    Show,
    /// Load and validate the configuration
    Validate,
}

pub async fn run(cmd: ConfigCommands, config_path: Option<&Path>) -> Result<()> {
    match cmd {
        ConfigCommands::Show => show(config_path),
        ConfigCommands::Validate => validate(config_path),
    }
}

fn source_description(config_path: Option<&Path>) -> String {
    config_path
        .map(Path::to_path_buf)
        .or_else(Config::find_config_file)
        .map_or_else(|| "defaults only".to_string(), |p| p.display().to_string())
}

fn show(config_path: Option<&Path>) -> Result<()> {
    let config = Config::load_from(config_path)?;
    println!("# Source: {}", source_description(config_path));
    let rendered = toml::to_string_pretty(&config).context("Failed to render configuration")?;
    println!("{rendered}");
    Ok(())
}

/// One line per axis: speed grid and temperature band
pub fn describe_axis(name: &str, axis: &AxisConfig) -> String {
    let speeds = (axis.max_speed - axis.min_speed) / axis.step + 1;
    format!(
        "{name:<9} speeds {}-{}% step {} ({speeds} settings), band {:.1}-{:.1}°C, critical {:.1}°C",
        axis.min_speed,
        axis.max_speed,
        axis.step,
        axis.band_low(),
        axis.band_high(),
        axis.critical
    )
}

fn validate(config_path: Option<&Path>) -> Result<()> {
    let source = source_description(config_path);
    let config = Config::load_from(config_path)
        .with_context(|| format!("Configuration from {source} is invalid"))?;

    println!("Configuration valid ({source})");
    println!("  {}", describe_axis("radiator", &config.control.radiator));
    println!("  {}", describe_axis("storage", &config.control.storage));
    let schedule = &config.control.schedule;
    println!(
        "  cycle every {}s, table saved every {} cycles, sensors critical after {} silent cycles",
        schedule.interval_seconds, schedule.save_interval_cycles, schedule.max_stale_cycles
    );
    Ok(())
}
