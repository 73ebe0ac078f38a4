//! Shared domain types: sensor groups, fan groups, readings, and severities

use std::fmt;

use serde::{Deserialize, Serialize};

/// Logical group of temperature sensors monitored by the control loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorGroup {
    /// Coolant temperature reported by the liquid-cooling controller
    Radiator,
    /// Aggregate (maximum) of the NVMe storage devices
    Storage,
}

impl SensorGroup {
    /// Fixed group order used for state keys and reports
    pub const ALL: [SensorGroup; 2] = [SensorGroup::Radiator, SensorGroup::Storage];

    /// Fan group that cools this sensor group
    pub fn fan(self) -> FanGroup {
        match self {
            SensorGroup::Radiator => FanGroup::Radiator,
            SensorGroup::Storage => FanGroup::Chassis,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SensorGroup::Radiator => "radiator",
            SensorGroup::Storage => "storage",
        }
    }
}

impl fmt::Display for SensorGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Group of fans driven with a single speed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FanGroup {
    Radiator,
    Chassis,
}

impl FanGroup {
    pub const ALL: [FanGroup; 2] = [FanGroup::Radiator, FanGroup::Chassis];

    pub fn as_str(self) -> &'static str {
        match self {
            FanGroup::Radiator => "radiator",
            FanGroup::Chassis => "chassis",
        }
    }
}

impl fmt::Display for FanGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// A single temperature sample produced by a sensor source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Device-level identifier (e.g. `nvme0n1`, `Temperature 1`)
    pub sensor_id: String,
    pub group: SensorGroup,
    /// Degrees Celsius
    pub value: f64,
}

impl SensorReading {
    pub fn new(sensor_id: impl Into<String>, group: SensorGroup, value: f64) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            group,
            value,
        }
    }
}
