//! Host temperature sensors
//!
//! The coolant probe is read through `liquidctl status --json`; every NVMe
//! namespace matching the configured glob is read through `nvme smart-log`.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use tracing::{debug, warn};

use thermo_core::config::DevicesConfig;
use thermo_core::{Result, SensorGroup, SensorReading, ThermoError};
use thermo_rl::SensorSource;

use crate::command;

const LIQUIDCTL: &str = "liquidctl";
const NVME: &str = "nvme";

#[derive(Debug, Deserialize)]
struct LiquidctlDevice {
    #[serde(default)]
    description: String,
    #[serde(default)]
    status: Vec<LiquidctlStatusItem>,
}

#[derive(Debug, Deserialize)]
struct LiquidctlStatusItem {
    key: String,
    value: serde_json::Value,
}

/// Extract `key` from the JSON printed by `liquidctl status --json` for the
/// first device whose description contains `controller_match`
pub fn parse_liquidctl_status(json: &str, controller_match: &str, key: &str) -> Result<f64> {
    let devices: Vec<LiquidctlDevice> = serde_json::from_str(json)?;
    let needle = controller_match.to_lowercase();

    let device = devices
        .iter()
        .find(|d| d.description.to_lowercase().contains(&needle))
        .ok_or_else(|| ThermoError::command(LIQUIDCTL, format!("no device matching {controller_match:?}")))?;

    device
        .status
        .iter()
        .find(|item| item.key == key)
        .and_then(|item| item.value.as_f64())
        .filter(|value| value.is_finite())
        .ok_or(ThermoError::SensorUnavailable(SensorGroup::Radiator))
}

/// Composite temperature from `nvme smart-log` text output. The per-sensor
/// `Temperature Sensor N` lines are ignored, as are non-positive values.
pub fn parse_nvme_smart_log(text: &str) -> Option<f64> {
    text.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        let key = key.trim().to_ascii_lowercase();
        if key != "temperature" && key != "composite temperature" {
            return None;
        }
        let number: String = value
            .trim()
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        number.parse::<f64>().ok().filter(|t| *t > 0.0)
    })
}

/// Coolant temperature probe on the fan controller
#[derive(Debug, Clone)]
pub struct LiquidctlSensor {
    controller_match: String,
    sensor_key: String,
    timeout: Duration,
}

impl LiquidctlSensor {
    pub fn new(devices: &DevicesConfig) -> Self {
        Self {
            controller_match: devices.controller_match.clone(),
            sensor_key: devices.radiator_sensor_key.clone(),
            timeout: Duration::from_secs(devices.command_timeout_seconds),
        }
    }

    pub async fn read(&self) -> Result<SensorReading> {
        let json = command::run(
            LIQUIDCTL,
            &["--match", &self.controller_match, "status", "--json"],
            None,
            self.timeout,
        )
        .await?;
        let value = parse_liquidctl_status(&json, &self.controller_match, &self.sensor_key)?;
        Ok(SensorReading::new(
            self.sensor_key.clone(),
            SensorGroup::Radiator,
            value,
        ))
    }
}

/// All NVMe namespaces matching a glob
#[derive(Debug, Clone)]
pub struct NvmeSensor {
    pattern: String,
    timeout: Duration,
}

impl NvmeSensor {
    pub fn new(devices: &DevicesConfig) -> Self {
        Self {
            pattern: devices.nvme_glob.clone(),
            timeout: Duration::from_secs(devices.command_timeout_seconds),
        }
    }

    /// Device paths currently matching the glob
    pub fn devices(&self) -> Vec<PathBuf> {
        match glob::glob(&self.pattern) {
            Ok(paths) => paths.filter_map(std::result::Result::ok).collect(),
            Err(e) => {
                warn!("Invalid NVMe glob {:?}: {}", self.pattern, e);
                Vec::new()
            }
        }
    }

    async fn read_device(&self, device: PathBuf) -> Result<SensorReading> {
        let path = device.to_string_lossy().into_owned();
        let output = command::run(NVME, &["smart-log", &path], None, self.timeout).await?;
        let value = parse_nvme_smart_log(&output)
            .ok_or_else(|| ThermoError::command(NVME, format!("no temperature for {path}")))?;

        let sensor_id = device
            .file_name()
            .map_or(path.clone(), |name| name.to_string_lossy().into_owned());
        Ok(SensorReading::new(sensor_id, SensorGroup::Storage, value))
    }

    /// One reading per device that answered
    pub async fn read_all(&self) -> Vec<SensorReading> {
        let devices = self.devices();
        if devices.is_empty() {
            debug!("No NVMe devices match {:?}", self.pattern);
        }

        join_all(devices.into_iter().map(|device| self.read_device(device)))
            .await
            .into_iter()
            .filter_map(|result| match result {
                Ok(reading) => Some(reading),
                Err(e) => {
                    warn!("NVMe read failed: {}", e);
                    None
                }
            })
            .collect()
    }
}

/// Both sensor groups, queried concurrently and joined before returning
pub struct HostSensors {
    radiator: LiquidctlSensor,
    storage: NvmeSensor,
}

impl HostSensors {
    pub fn new(devices: &DevicesConfig) -> Self {
        Self {
            radiator: LiquidctlSensor::new(devices),
            storage: NvmeSensor::new(devices),
        }
    }
}

#[async_trait]
impl SensorSource for HostSensors {
    async fn read(&self) -> Vec<SensorReading> {
        let (radiator, storage) = tokio::join!(self.radiator.read(), self.storage.read_all());

        let mut readings = storage;
        match radiator {
            Ok(reading) => readings.push(reading),
            Err(e) => warn!("Radiator read failed: {}", e),
        }
        debug!(count = readings.len(), "Sensor readings collected");
        readings
    }
}
