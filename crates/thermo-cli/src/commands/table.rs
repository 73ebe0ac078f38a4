//! Value table inspection

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;

use thermo_rl::{Action, StateKey, ValueTable};

use super::{mean, resolve_path};

#[derive(Subcommand)]
pub enum TableCommands {
    /// List entries by value and the best known action per state
    Show {
        /// Table file (defaults to persistence.table_path)
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Number of entries to list
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Entry counts and value range
    Stats {
        /// Table file (defaults to persistence.table_path)
        #[arg(short, long)]
        path: Option<PathBuf>,
    },
}

pub async fn run(cmd: TableCommands, config_path: Option<&Path>) -> Result<()> {
    match cmd {
        TableCommands::Show { path, limit } => {
            let path = resolve_path(path, config_path, |c| c.persistence.table_path)?;
            show(&path, limit)
        }
        TableCommands::Stats { path } => {
            let path = resolve_path(path, config_path, |c| c.persistence.table_path)?;
            stats(&path)
        }
    }
}

fn load_table(path: &Path) -> Result<ValueTable> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read value table {}", path.display()))?;
    ValueTable::from_json(&json).with_context(|| format!("Invalid value table {}", path.display()))
}

/// Entries ordered best first; equal values fall back to key order
pub fn sorted_entries(table: &ValueTable) -> Vec<(StateKey, Action, f64)> {
    let mut entries: Vec<_> = table.iter().collect();
    entries.sort_by(|(s1, a1, v1), (s2, a2, v2)| {
        v2.total_cmp(v1).then_with(|| s1.cmp(s2)).then_with(|| a1.cmp(a2))
    });
    entries
}

/// Best known action for every visited state, in state order
pub fn best_per_state(table: &ValueTable) -> Vec<(StateKey, Action, f64)> {
    let states: BTreeSet<StateKey> = table.iter().map(|(s, _, _)| s).collect();
    states
        .into_iter()
        .filter_map(|s| table.best_action(s).map(|(a, v)| (s, a, v)))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableStats {
    pub entries: usize,
    pub states: usize,
    pub actions: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: f64,
}

pub fn summarize(table: &ValueTable) -> TableStats {
    let actions: BTreeSet<Action> = table.iter().map(|(_, a, _)| a).collect();
    let values: Vec<f64> = table.iter().map(|(_, _, v)| v).collect();
    TableStats {
        entries: table.len(),
        states: table.state_count(),
        actions: actions.len(),
        min: values.iter().copied().reduce(f64::min),
        max: values.iter().copied().reduce(f64::max),
        mean: mean(values),
    }
}

fn show(path: &Path, limit: usize) -> Result<()> {
    let table = load_table(path)?;
    println!("Value Table: {}", path.display());
    println!("============\n");

    if table.is_empty() {
        println!("No entries yet.");
        return Ok(());
    }

    println!("{:<12} {:<10} {:>10}", "STATE", "ACTION", "VALUE");
    for (state, action, value) in sorted_entries(&table).into_iter().take(limit) {
        println!("{:<12} {:<10} {:>10.4}", state.to_string(), action.to_string(), value);
    }
    if table.len() > limit {
        println!("... {} more", table.len() - limit);
    }

    println!("\nBest action per state");
    println!("---------------------");
    for (state, action, value) in best_per_state(&table) {
        println!("{:<12} {:<10} {:>10.4}", state.to_string(), action.to_string(), value);
    }
    Ok(())
}

fn stats(path: &Path) -> Result<()> {
    let stats = summarize(&load_table(path)?);
    println!("Value Table: {}", path.display());
    println!("  Entries:  {}", stats.entries);
    println!("  States:   {}", stats.states);
    println!("  Actions:  {}", stats.actions);
    match (stats.min, stats.max) {
        (Some(min), Some(max)) => {
            println!("  Min:      {min:.4}");
            println!("  Max:      {max:.4}");
            println!("  Mean:     {:.4}", stats.mean);
        }
        _ => println!("  No values recorded"),
    }
    Ok(())
}
