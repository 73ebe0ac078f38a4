//! Cycle history summary

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;

use thermo_rl::CycleRecord;

use super::{mean, resolve_path};

#[derive(Args)]
pub struct HistoryArgs {
    /// History CSV (defaults to persistence.history_csv_path)
    #[arg(short, long)]
    path: Option<PathBuf>,

    /// Number of most recent cycles to summarize (0 for all)
    #[arg(short = 'n', long, default_value = "120")]
    tail: usize,
}

pub async fn run(args: HistoryArgs, config_path: Option<&Path>) -> Result<()> {
    let path = resolve_path(args.path, config_path, |c| c.persistence.history_csv_path)?;
    let rows = read_tail(&path, args.tail)?;

    println!("Cycle History: {}", path.display());
    println!("=============\n");

    let Some(summary) = summarize(&rows) else {
        println!("No cycles recorded yet.");
        return Ok(());
    };

    println!("Cycles:        {} ({} to {})", summary.cycles, summary.first_at, summary.last_at);
    println!(
        "Temperatures:  radiator {:.1}°C, storage {:.1}°C",
        summary.mean_temp_rad, summary.mean_temp_storage
    );
    println!(
        "Fan speeds:    radiator {:.0}%, chassis {:.0}%",
        summary.mean_fan_rad, summary.mean_fan_chs
    );
    println!("Noise est.:    {:.1}", summary.mean_noise);
    println!("Reward:        {:.3}", summary.mean_reward);
    println!("Emergencies:   {} cycles", summary.emergency_cycles);

    let latest = &summary.latest;
    println!("\nLatest cycle ({})", latest.timestamp);
    println!(
        "  radiator {:.1}°C (avg {:.1}), storage {:.1}°C (avg {:.1})",
        latest.temp_rad, latest.avg_rad, latest.temp_storage, latest.avg_storage
    );
    println!(
        "  state {}_{}, fans {}/{}, reward {:.3}, table {} entries{}",
        latest.state_rad,
        latest.state_storage,
        latest.fan_rad,
        latest.fan_chs,
        latest.reward,
        latest.table_entries,
        if latest.emergency { ", EMERGENCY" } else { "" }
    );
    Ok(())
}

/// Last `tail` rows of the history file, all rows when `tail` is 0
pub fn read_tail(path: &Path, tail: usize) -> Result<Vec<CycleRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open history {}", path.display()))?;

    let mut rows = VecDeque::new();
    for row in reader.deserialize() {
        let row: CycleRecord =
            row.with_context(|| format!("Malformed row in {}", path.display()))?;
        if tail > 0 && rows.len() == tail {
            rows.pop_front();
        }
        rows.push_back(row);
    }
    Ok(rows.into())
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistorySummary {
    pub cycles: usize,
    pub first_at: DateTime<Utc>,
    pub last_at: DateTime<Utc>,
    pub mean_temp_rad: f64,
    pub mean_temp_storage: f64,
    pub mean_fan_rad: f64,
    pub mean_fan_chs: f64,
    pub mean_noise: f64,
    pub mean_reward: f64,
    pub emergency_cycles: usize,
    pub latest: CycleRecord,
}

pub fn summarize(rows: &[CycleRecord]) -> Option<HistorySummary> {
    let first = rows.first()?;
    let latest = rows.last()?;
    Some(HistorySummary {
        cycles: rows.len(),
        first_at: first.timestamp,
        last_at: latest.timestamp,
        mean_temp_rad: mean(rows.iter().map(|r| r.temp_rad)),
        mean_temp_storage: mean(rows.iter().map(|r| r.temp_storage)),
        mean_fan_rad: mean(rows.iter().map(|r| f64::from(r.fan_rad))),
        mean_fan_chs: mean(rows.iter().map(|r| f64::from(r.fan_chs))),
        mean_noise: mean(rows.iter().map(|r| r.noise_est)),
        mean_reward: mean(rows.iter().map(|r| r.reward)),
        emergency_cycles: rows.iter().filter(|r| r.emergency).count(),
        latest: latest.clone(),
    })
}
