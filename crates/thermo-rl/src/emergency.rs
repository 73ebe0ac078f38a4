//! Emergency override state machine
//!
//! NORMAL -> EMERGENCY when any group strictly exceeds its critical
//! threshold; EMERGENCY -> NORMAL once every group is at or below it.
//! The state always starts NORMAL and is never persisted.

use serde::{Deserialize, Serialize};

use thermo_core::{ControlConfig, SensorGroup};

use crate::state::{Action, Temperatures};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmergencyState {
    #[default]
    Normal,
    Emergency,
}

/// Outcome of one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// Stayed NORMAL
    Clear,
    /// NORMAL -> EMERGENCY; the only transition that raises a critical alert
    Entered,
    /// Stayed in EMERGENCY
    Sustained,
    /// EMERGENCY -> NORMAL
    Recovered,
}

impl Transition {
    pub fn is_emergency(self) -> bool {
        matches!(self, Transition::Entered | Transition::Sustained)
    }
}

#[derive(Debug, Clone, Default)]
pub struct EmergencyOverride {
    state: EmergencyState,
    breaches: Vec<SensorGroup>,
    entered_count: u64,
}

impl EmergencyOverride {
    pub fn new() -> Self {
        Self::default()
    }

    /// Groups strictly above their critical threshold
    pub fn breaches(temps: &Temperatures, config: &ControlConfig) -> Vec<SensorGroup> {
        SensorGroup::ALL
            .into_iter()
            .filter(|&group| temps.get(group) > config.axis(group).critical)
            .collect()
    }

    /// Re-evaluate against the latest temperatures
    pub fn evaluate(&mut self, temps: &Temperatures, config: &ControlConfig) -> Transition {
        self.breaches = Self::breaches(temps, config);
        let critical = !self.breaches.is_empty();

        let transition = match (self.state, critical) {
            (EmergencyState::Normal, false) => Transition::Clear,
            (EmergencyState::Normal, true) => Transition::Entered,
            (EmergencyState::Emergency, true) => Transition::Sustained,
            (EmergencyState::Emergency, false) => Transition::Recovered,
        };

        self.state = if critical {
            EmergencyState::Emergency
        } else {
            EmergencyState::Normal
        };
        if transition == Transition::Entered {
            self.entered_count += 1;
        }
        transition
    }

    /// Action forced while in EMERGENCY
    pub fn forced_action(config: &ControlConfig) -> Action {
        Action::maximum(config)
    }

    pub fn state(&self) -> EmergencyState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == EmergencyState::Emergency
    }

    /// Groups that breached on the last evaluation
    pub fn last_breaches(&self) -> &[SensorGroup] {
        &self.breaches
    }

    /// How many times EMERGENCY has been entered since start
    pub fn entered_count(&self) -> u64 {
        self.entered_count
    }
}
