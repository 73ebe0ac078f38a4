//! Action policies
//!
//! Selection is rule-based: the value table only evaluates what the policy
//! chose and never feeds back into the choice. [`ActionPolicy`] is the seam
//! where a table-driven policy would plug in.

use thermo_core::{AxisConfig, ControlConfig, SensorGroup};

use crate::state::{Action, Temperatures};

/// Trait for fan-speed policies
pub trait ActionPolicy: Send + Sync {
    /// Policy name
    fn name(&self) -> &str;

    /// Compute the next action from the current one and smoothed temperatures
    fn next_action(
        &self,
        current: Action,
        smoothed: &Temperatures,
        config: &ControlConfig,
    ) -> Action;
}

/// One step up above `target + hysteresis`, one step down below
/// `target - hysteresis`, hold inside the band
#[derive(Debug, Clone, Copy, Default)]
pub struct HysteresisPolicy;

impl HysteresisPolicy {
    pub fn new() -> Self {
        Self
    }

    /// Next speed for a single axis
    pub fn step_axis(current: u8, temp: f64, axis: &AxisConfig) -> u8 {
        let current = snap_to_grid(current, axis);

        if temp > axis.band_high() {
            current.saturating_add(axis.step).min(axis.max_speed)
        } else if temp < axis.band_low() {
            current.saturating_sub(axis.step).max(axis.min_speed)
        } else {
            current
        }
    }
}

impl ActionPolicy for HysteresisPolicy {
    fn name(&self) -> &str {
        "hysteresis"
    }

    fn next_action(
        &self,
        current: Action,
        smoothed: &Temperatures,
        config: &ControlConfig,
    ) -> Action {
        Action {
            radiator: Self::step_axis(
                current.radiator,
                smoothed.get(SensorGroup::Radiator),
                &config.radiator,
            ),
            chassis: Self::step_axis(
                current.chassis,
                smoothed.get(SensorGroup::Storage),
                &config.storage,
            ),
        }
    }
}

/// Clamp into [min, max] and round down onto the step grid anchored at min
fn snap_to_grid(speed: u8, axis: &AxisConfig) -> u8 {
    let step = axis.step.max(1);
    let clamped = speed.clamp(axis.min_speed, axis.max_speed);
    axis.min_speed + (clamped - axis.min_speed) / step * step
}
