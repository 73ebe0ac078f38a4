//! Live daemon status

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use serde::Deserialize;

#[derive(Args)]
pub struct StatusArgs {
    /// Base URL of the daemon status endpoint
    #[arg(
        short,
        long,
        env = "THERMO_STATUS_URL",
        default_value = "http://127.0.0.1:9310"
    )]
    url: String,

    /// Print the raw JSON snapshot
    #[arg(long)]
    json: bool,
}

/// Fields of the daemon snapshot this command prints
#[derive(Debug, Deserialize, Default)]
pub struct StatusView {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub version: String,
    pub started_at: Option<String>,
    pub last_cycle_at: Option<String>,
    #[serde(default)]
    pub emergency: bool,
    #[serde(default)]
    pub table_entries: usize,
    #[serde(default)]
    pub table_states: usize,
    #[serde(default)]
    pub average_reward: f64,
    pub fan_radiator: Option<u8>,
    pub fan_chassis: Option<u8>,
    pub last_decision: Option<DecisionView>,
    #[serde(default)]
    pub stats: StatsView,
}

#[derive(Debug, Deserialize)]
pub struct DecisionView {
    pub cycle: u64,
    pub smoothed: TemperaturesView,
    pub reward: f64,
    #[serde(default)]
    pub stale: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct TemperaturesView {
    pub radiator: f64,
    pub storage: f64,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct StatsView {
    pub cycles: u64,
    pub skipped_cycles: u64,
    pub actuator_failures: u64,
    pub emergency_entries: u64,
    pub table_save_failures: u64,
}

pub async fn run(args: StatusArgs) -> Result<()> {
    let url = format!("{}/api/v1/status", args.url.trim_end_matches('/'));
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .context("Failed to build HTTP client")?;

    let response = match client.get(&url).send().await {
        Ok(resp) if resp.status().is_success() => resp,
        Ok(resp) => anyhow::bail!("Daemon returned {} for {}", resp.status(), url),
        Err(e) => {
            println!("Daemon: not running ({e})");
            return Ok(());
        }
    };

    let body: serde_json::Value = response.json().await.context("Invalid status response")?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    let view: StatusView = serde_json::from_value(body).context("Unexpected status format")?;
    for line in render(&view) {
        println!("{line}");
    }
    Ok(())
}

fn fan(speed: Option<u8>) -> String {
    speed.map_or_else(|| "-".to_string(), |s| format!("{s}%"))
}

pub fn render(view: &StatusView) -> Vec<String> {
    let mut lines = vec![
        "Thermo Status".to_string(),
        "=============".to_string(),
        format!("Daemon:      {} (v{})", view.status, view.version),
    ];
    if let Some(started) = &view.started_at {
        lines.push(format!("Started:     {started}"));
    }
    lines.push(format!(
        "Mode:        {}",
        if view.emergency { "EMERGENCY" } else { "normal" }
    ));
    lines.push(format!(
        "Fans:        radiator {}, chassis {}",
        fan(view.fan_radiator),
        fan(view.fan_chassis)
    ));
    if let Some(decision) = &view.last_decision {
        lines.push(format!(
            "Last cycle:  #{} radiator {:.1}°C, storage {:.1}°C, reward {:.3}",
            decision.cycle, decision.smoothed.radiator, decision.smoothed.storage, decision.reward
        ));
        if !decision.stale.is_empty() {
            lines.push(format!("Stale:       {}", decision.stale.join(", ")));
        }
    }
    if let Some(at) = &view.last_cycle_at {
        lines.push(format!("Updated:     {at}"));
    }
    lines.push(format!(
        "Table:       {} entries over {} states, average reward {:.3}",
        view.table_entries, view.table_states, view.average_reward
    ));
    lines.push(format!(
        "Cycles:      {} run, {} skipped, {} emergencies",
        view.stats.cycles, view.stats.skipped_cycles, view.stats.emergency_entries
    ));
    if view.stats.actuator_failures > 0 || view.stats.table_save_failures > 0 {
        lines.push(format!(
            "Failures:    {} fan writes, {} table saves",
            view.stats.actuator_failures, view.stats.table_save_failures
        ));
    }
    lines
}
