//! Penalty-only reward function
//!
//! Reward = -(radiator deviation + storage deviation + noise). Deviation is
//! zero inside an axis' hysteresis band and grows linearly with the distance
//! beyond it; noise grows linearly with the summed fan speed.

use serde::{Deserialize, Serialize};

use thermo_core::{AxisConfig, ControlConfig};

use crate::state::{Action, Reward, Temperatures};

/// Individual penalty terms, all >= 0
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RewardBreakdown {
    pub radiator_penalty: f64,
    pub storage_penalty: f64,
    pub noise_penalty: f64,
}

impl RewardBreakdown {
    /// Negative sum of all penalties
    pub fn total(&self) -> Reward {
        -(self.radiator_penalty + self.storage_penalty + self.noise_penalty)
    }
}

/// Weighted distance beyond the hysteresis band; zero inside it
pub fn deviation_penalty(temp: f64, axis: &AxisConfig) -> f64 {
    let beyond = (temp - axis.target).abs() - axis.hysteresis;
    if beyond > 0.0 {
        axis.deviation_weight * beyond
    } else {
        0.0
    }
}

/// `coefficient` at full speed on both fan groups, scaled linearly below that
pub fn noise_penalty(action: &Action, coefficient: f64) -> f64 {
    coefficient * f64::from(action.total()) / 200.0
}

/// Score the temperatures that resulted while `action` was applied
pub fn evaluate(resulting: &Temperatures, action: &Action, config: &ControlConfig) -> RewardBreakdown {
    RewardBreakdown {
        radiator_penalty: deviation_penalty(resulting.radiator, &config.radiator),
        storage_penalty: deviation_penalty(resulting.storage, &config.storage),
        noise_penalty: noise_penalty(action, config.learning.noise_penalty),
    }
}

/// Scalar reward; shorthand for `evaluate(..).total()`
pub fn reward(resulting: &Temperatures, action: &Action, config: &ControlConfig) -> Reward {
    evaluate(resulting, action, config).total()
}
