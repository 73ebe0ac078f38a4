//! State, Action, and Reward types for the value table

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use thermo_core::{ControlConfig, FanGroup, SensorGroup};

/// Reward value from the environment; always <= 0
pub type Reward = f64;

/// One temperature per monitored group, °C
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Temperatures {
    pub radiator: f64,
    pub storage: f64,
}

impl Temperatures {
    pub fn new(radiator: f64, storage: f64) -> Self {
        Self { radiator, storage }
    }

    pub fn get(&self, group: SensorGroup) -> f64 {
        match group {
            SensorGroup::Radiator => self.radiator,
            SensorGroup::Storage => self.storage,
        }
    }

    pub fn set(&mut self, group: SensorGroup, value: f64) {
        match group {
            SensorGroup::Radiator => self.radiator = value,
            SensorGroup::Storage => self.storage = value,
        }
    }
}

/// Round a temperature to the nearest multiple of `bucket_step`
pub fn bucket(temp: f64, bucket_step: f64) -> i64 {
    ((temp / bucket_step).round() * bucket_step).round() as i64
}

/// Discretized temperatures, in fixed group order (radiator, storage)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateKey {
    pub radiator: i64,
    pub storage: i64,
}

impl StateKey {
    pub fn new(radiator: i64, storage: i64) -> Self {
        Self { radiator, storage }
    }

    /// Bucket each smoothed temperature independently
    pub fn discretize(smoothed: &Temperatures, bucket_step: f64) -> Self {
        Self {
            radiator: bucket(smoothed.radiator, bucket_step),
            storage: bucket(smoothed.storage, bucket_step),
        }
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.radiator, self.storage)
    }
}

impl FromStr for StateKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (radiator, storage) = split_pair(s)?;
        Ok(Self {
            radiator: radiator
                .parse()
                .map_err(|e| format!("bad radiator bucket in {s:?}: {e}"))?,
            storage: storage
                .parse()
                .map_err(|e| format!("bad storage bucket in {s:?}: {e}"))?,
        })
    }
}

/// Fan-speed pair, percent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Action {
    pub radiator: u8,
    pub chassis: u8,
}

impl Action {
    pub fn new(radiator: u8, chassis: u8) -> Self {
        Self { radiator, chassis }
    }

    /// Starting speeds from configuration
    pub fn initial(config: &ControlConfig) -> Self {
        Self {
            radiator: config.radiator.initial_speed,
            chassis: config.storage.initial_speed,
        }
    }

    /// Every fan at its configured maximum
    pub fn maximum(config: &ControlConfig) -> Self {
        Self {
            radiator: config.radiator.max_speed,
            chassis: config.storage.max_speed,
        }
    }

    pub fn speed(&self, fan: FanGroup) -> u8 {
        match fan {
            FanGroup::Radiator => self.radiator,
            FanGroup::Chassis => self.chassis,
        }
    }

    /// Sum of both fan speeds
    pub fn total(&self) -> u32 {
        u32::from(self.radiator) + u32::from(self.chassis)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.radiator, self.chassis)
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (radiator, chassis) = split_pair(s)?;
        let parse = |v: &str| -> Result<u8, String> {
            let speed: u8 = v
                .parse()
                .map_err(|e| format!("bad fan speed in {s:?}: {e}"))?;
            if speed > 100 {
                return Err(format!("fan speed above 100% in {s:?}"));
            }
            Ok(speed)
        };
        Ok(Self {
            radiator: parse(radiator)?,
            chassis: parse(chassis)?,
        })
    }
}

fn split_pair(s: &str) -> Result<(&str, &str), String> {
    // rsplit keeps negative radiator buckets ("-2_40") intact
    s.rsplit_once('_')
        .filter(|(a, b)| !a.is_empty() && !b.is_empty())
        .ok_or_else(|| format!("expected `<a>_<b>`, got {s:?}"))
}
