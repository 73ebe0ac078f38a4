//! Thermal Engine - one decision per control cycle
//!
//! Pure in-memory computation: no I/O, no clocks. The orchestrator feeds it
//! sensor samples and carries out the returned [`Decision`].

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, warn};

use thermo_core::{ControlConfig, SensorGroup, SensorReading};

use crate::emergency::{EmergencyOverride, EmergencyState, Transition};
use crate::history::TemperatureHistory;
use crate::policy::{ActionPolicy, HysteresisPolicy};
use crate::reward::{self, RewardBreakdown};
use crate::state::{Action, Reward, StateKey, Temperatures};
use crate::table::ValueTable;

/// Everything decided during one cycle
#[derive(Debug, Clone, Serialize)]
pub struct Decision {
    /// 1-based index of this decision
    pub cycle: u64,
    /// Latest per-group readings, stale groups filled from the last cycle
    pub raw: Temperatures,
    pub smoothed: Temperatures,
    pub state: StateKey,
    pub previous_action: Action,
    pub action: Action,
    pub breakdown: RewardBreakdown,
    pub reward: Reward,
    /// Value-table entry for (state, action) after the update
    pub value: f64,
    pub emergency: bool,
    pub transition: Transition,
    /// Groups that produced no reading this cycle
    pub stale: Vec<SensorGroup>,
    /// Groups strictly above their critical threshold
    pub breaches: Vec<SensorGroup>,
}

/// A cycle that could not be decided because some group has never
/// reported
#[derive(Debug, Clone, Serialize)]
pub struct SkippedCycle {
    pub transition: Transition,
    /// Action held after the check; maximum while in EMERGENCY
    pub action: Action,
    /// Fresh or last-known raw value of every group seen so far
    pub known: BTreeMap<SensorGroup, f64>,
    pub missing: Vec<SensorGroup>,
    pub breaches: Vec<SensorGroup>,
}

/// Decision engine state owned by the control loop
pub struct ThermalEngine {
    config: ControlConfig,
    policy: Box<dyn ActionPolicy>,
    history: TemperatureHistory,
    table: ValueTable,
    emergency: EmergencyOverride,
    current: Action,
    last_raw: BTreeMap<SensorGroup, f64>,
    stale_cycles: BTreeMap<SensorGroup, u32>,
    last_skip: Option<SkippedCycle>,
    cycles: u64,
    total_reward: f64,
}

impl ThermalEngine {
    /// Create an engine with the hysteresis policy, starting from the
    /// configured initial speeds
    pub fn new(config: ControlConfig, table: ValueTable) -> Self {
        Self {
            history: TemperatureHistory::new(config.learning.history_length),
            current: Action::initial(&config),
            policy: Box::new(HysteresisPolicy::new()),
            emergency: EmergencyOverride::new(),
            last_raw: BTreeMap::new(),
            stale_cycles: BTreeMap::new(),
            last_skip: None,
            cycles: 0,
            total_reward: 0.0,
            config,
            table,
        }
    }

    /// Replace the action policy
    pub fn with_policy(mut self, policy: Box<dyn ActionPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Run one cycle. Returns `None` when some group has never produced a
    /// reading: the emergency check still runs on the groups that have, and
    /// its outcome is kept in [`ThermalEngine::last_skip`], but nothing is
    /// smoothed, scored or learned.
    pub fn step(&mut self, readings: &[SensorReading]) -> Option<Decision> {
        let fresh = aggregate(readings);

        let mut stale = Vec::new();
        let mut missing = Vec::new();
        for group in SensorGroup::ALL {
            if let Some(&value) = fresh.get(&group) {
                self.last_raw.insert(group, value);
                self.stale_cycles.remove(&group);
            } else if self.last_raw.contains_key(&group) {
                *self.stale_cycles.entry(group).or_default() += 1;
                stale.push(group);
            } else {
                missing.push(group);
            }
        }

        let transition = self.emergency.evaluate(&self.emergency_inputs(), &self.config);
        if !missing.is_empty() {
            return self.skip(transition, missing);
        }
        self.last_skip = None;

        let mut raw = Temperatures::new(0.0, 0.0);
        let mut smoothed = Temperatures::new(0.0, 0.0);
        for group in SensorGroup::ALL {
            let value = self.last_raw.get(&group).copied().unwrap_or_default();
            let smoothed_value = if fresh.contains_key(&group) {
                self.history.record(group, value)
            } else {
                // Seen only on skipped cycles: no history yet
                self.history.smoothed(group).unwrap_or(value)
            };
            raw.set(group, value);
            smoothed.set(group, smoothed_value);
        }

        let state = StateKey::discretize(&smoothed, self.config.learning.bucket_step);

        let previous_action = self.current;
        let action = if self.emergency.is_active() {
            EmergencyOverride::forced_action(&self.config)
        } else {
            self.policy.next_action(previous_action, &smoothed, &self.config)
        };

        let breakdown = reward::evaluate(&smoothed, &action, &self.config);
        let reward = breakdown.total();
        let value = self
            .table
            .update(state, action, reward, self.config.learning.alpha);

        self.current = action;
        self.cycles += 1;
        self.total_reward += reward;
        self.log_transition(transition);

        Some(Decision {
            cycle: self.cycles,
            raw,
            smoothed,
            state,
            previous_action,
            action,
            breakdown,
            reward,
            value,
            emergency: transition.is_emergency(),
            transition,
            stale,
            breaches: self.emergency.last_breaches().to_vec(),
        })
    }

    /// Raw values the override judges. Groups never seen cannot breach;
    /// groups stale for longer than `max_stale_cycles` always do.
    fn emergency_inputs(&self) -> Temperatures {
        let limit = self.config.schedule.max_stale_cycles;
        let mut temps = Temperatures::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
        for group in SensorGroup::ALL {
            let value = match self.last_raw.get(&group) {
                None => f64::NEG_INFINITY,
                Some(_) if self.stale_cycles(group) > limit => f64::INFINITY,
                Some(&value) => value,
            };
            temps.set(group, value);
        }
        temps
    }

    fn skip(&mut self, transition: Transition, missing: Vec<SensorGroup>) -> Option<Decision> {
        if self.emergency.is_active() {
            self.current = EmergencyOverride::forced_action(&self.config);
        }
        self.log_transition(transition);
        debug!(missing = ?missing, "No reading yet for every group, skipping cycle");

        self.last_skip = Some(SkippedCycle {
            transition,
            action: self.current,
            known: self.last_raw.clone(),
            missing,
            breaches: self.emergency.last_breaches().to_vec(),
        });
        None
    }

    fn log_transition(&self, transition: Transition) {
        match transition {
            Transition::Entered => warn!(
                breaches = ?self.emergency.last_breaches(),
                "Critical temperature, forcing fans to {}", self.current
            ),
            Transition::Recovered => debug!("Temperatures back below critical"),
            _ => {}
        }
    }

    /// Emergency outcome of the last step, if that step was skipped
    pub fn last_skip(&self) -> Option<&SkippedCycle> {
        self.last_skip.as_ref()
    }

    /// Consecutive cycles `group` has gone without a fresh reading
    pub fn stale_cycles(&self, group: SensorGroup) -> u32 {
        self.stale_cycles.get(&group).copied().unwrap_or(0)
    }

    pub fn config(&self) -> &ControlConfig {
        &self.config
    }

    pub fn table(&self) -> &ValueTable {
        &self.table
    }

    /// Swap in an empty table, returning the old one
    pub fn take_table(&mut self) -> ValueTable {
        std::mem::take(&mut self.table)
    }

    pub fn current_action(&self) -> Action {
        self.current
    }

    pub fn is_emergency(&self) -> bool {
        self.emergency.is_active()
    }

    pub fn emergency_state(&self) -> EmergencyState {
        self.emergency.state()
    }

    /// Number of completed (non-skipped) cycles
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn average_reward(&self) -> f64 {
        if self.cycles > 0 {
            self.total_reward / self.cycles as f64
        } else {
            0.0
        }
    }

    pub fn policy_name(&self) -> &str {
        self.policy.name()
    }

    pub fn history(&self) -> &TemperatureHistory {
        &self.history
    }
}

/// Hottest finite reading per group
fn aggregate(readings: &[SensorReading]) -> BTreeMap<SensorGroup, f64> {
    let mut groups: BTreeMap<SensorGroup, f64> = BTreeMap::new();
    for reading in readings.iter().filter(|r| r.value.is_finite()) {
        groups
            .entry(reading.group)
            .and_modify(|v| *v = v.max(reading.value))
            .or_insert(reading.value);
    }
    groups
}
