//! Configuration loading and validation
//!
//! A single [`Config`] is built once at startup from an optional TOML file
//! layered under `THERMO__*` environment variables, validated, and then
//! handed to each component by reference.

use std::borrow::Cow;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::error::ThermoError;
use crate::types::SensorGroup;

/// Environment variable pointing at an explicit config file
pub const CONFIG_ENV_VAR: &str = "THERMO_CONFIG";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Config {
    #[validate(nested)]
    pub daemon: DaemonConfig,
    #[validate(nested)]
    pub devices: DevicesConfig,
    #[validate(nested)]
    pub control: ControlConfig,
    #[validate(nested)]
    pub notifications: NotificationConfig,
    #[validate(nested)]
    pub persistence: PersistenceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DaemonConfig {
    #[validate(length(min = 1))]
    pub log_level: String,
    /// Empty disables file logging
    pub log_file: String,
    pub status_enabled: bool,
    /// `host:port` for the status endpoint
    #[validate(custom(function = "validate_socket_addr"))]
    pub status_bind_address: String,
}

impl DaemonConfig {
    /// Parsed status address; only fails on configs that skipped validation
    pub fn status_addr(&self) -> crate::Result<SocketAddr> {
        self.status_bind_address.parse().map_err(|e| {
            ThermoError::Config(format!(
                "invalid status_bind_address {:?}: {}",
                self.status_bind_address, e
            ))
        })
    }
}

fn validate_socket_addr(address: &str) -> std::result::Result<(), ValidationError> {
    address
        .parse::<SocketAddr>()
        .map(|_| ())
        .map_err(|_| axis_error("socket_addr", "expected an ip:port address"))
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_file: String::new(),
            status_enabled: true,
            status_bind_address: "127.0.0.1:9310".to_string(),
        }
    }
}

/// Hardware identifiers and sensor-group membership
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DevicesConfig {
    /// Substring of the liquidctl device description
    #[validate(length(min = 1))]
    pub controller_match: String,
    /// Status key of the coolant temperature probe
    #[validate(length(min = 1))]
    pub radiator_sensor_key: String,
    #[validate(length(min = 1))]
    pub radiator_fan_channels: Vec<u8>,
    #[validate(length(min = 1))]
    pub chassis_fan_channels: Vec<u8>,
    #[validate(length(min = 1))]
    pub nvme_glob: String,
    #[validate(range(min = 1))]
    pub command_timeout_seconds: u64,
}

impl Default for DevicesConfig {
    fn default() -> Self {
        Self {
            controller_match: "Commander Core XT".to_string(),
            radiator_sensor_key: "Temperature 1".to_string(),
            radiator_fan_channels: vec![1, 2, 3],
            chassis_fan_channels: vec![4, 5, 6],
            nvme_glob: "/dev/nvme*n1".to_string(),
            command_timeout_seconds: 10,
        }
    }
}

/// Everything the decision engine needs
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ControlConfig {
    #[validate(nested)]
    pub radiator: AxisConfig,
    #[validate(nested)]
    pub storage: AxisConfig,
    #[validate(nested)]
    pub learning: LearningConfig,
    #[validate(nested)]
    pub schedule: ScheduleConfig,
}

impl ControlConfig {
    /// Axis settings for a sensor group
    pub fn axis(&self, group: SensorGroup) -> &AxisConfig {
        match group {
            SensorGroup::Radiator => &self.radiator,
            SensorGroup::Storage => &self.storage,
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            radiator: AxisConfig::radiator(),
            storage: AxisConfig::storage(),
            learning: LearningConfig::default(),
            schedule: ScheduleConfig::default(),
        }
    }
}

/// One controlled axis: a sensor group and the fans that cool it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_axis"))]
pub struct AxisConfig {
    pub min_speed: u8,
    pub max_speed: u8,
    pub step: u8,
    pub initial_speed: u8,
    /// Target temperature, °C
    pub target: f64,
    /// Half-width of the dead zone around `target`
    pub hysteresis: f64,
    /// Temperatures strictly above this force maximum cooling
    pub critical: f64,
    /// Reward penalty per °C outside the dead zone
    pub deviation_weight: f64,
}

impl AxisConfig {
    pub fn radiator() -> Self {
        Self {
            min_speed: 30,
            max_speed: 100,
            step: 5,
            initial_speed: 50,
            target: 40.0,
            hysteresis: 3.0,
            critical: 60.0,
            deviation_weight: 1.0,
        }
    }

    pub fn storage() -> Self {
        Self {
            min_speed: 30,
            max_speed: 100,
            step: 5,
            initial_speed: 50,
            target: 60.0,
            hysteresis: 3.0,
            critical: 75.0,
            deviation_weight: 1.0,
        }
    }

    /// Lower edge of the dead zone
    pub fn band_low(&self) -> f64 {
        self.target - self.hysteresis
    }

    /// Upper edge of the dead zone
    pub fn band_high(&self) -> f64 {
        self.target + self.hysteresis
    }

    /// Whether `speed` lies in range and on the step grid
    pub fn is_valid_speed(&self, speed: u8) -> bool {
        speed >= self.min_speed
            && speed <= self.max_speed
            && (speed - self.min_speed) % self.step == 0
    }
}

fn axis_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err
}

fn validate_axis(axis: &AxisConfig) -> std::result::Result<(), ValidationError> {
    if axis.max_speed > 100 {
        return Err(axis_error("max_speed", "max_speed must be at most 100"));
    }
    if axis.min_speed >= axis.max_speed {
        return Err(axis_error("speed_range", "min_speed must be below max_speed"));
    }
    if axis.step == 0 {
        return Err(axis_error("step", "step must be positive"));
    }
    if (axis.max_speed - axis.min_speed) % axis.step != 0 {
        return Err(axis_error(
            "step",
            "max_speed - min_speed must be a multiple of step",
        ));
    }
    if !axis.is_valid_speed(axis.initial_speed) {
        return Err(axis_error(
            "initial_speed",
            "initial_speed must be within range and on the step grid",
        ));
    }
    let finite = [axis.target, axis.hysteresis, axis.critical, axis.deviation_weight]
        .iter()
        .all(|v| v.is_finite());
    if !finite {
        return Err(axis_error("finite", "temperatures and weights must be finite"));
    }
    if axis.hysteresis < 0.0 {
        return Err(axis_error("hysteresis", "hysteresis must not be negative"));
    }
    if axis.critical <= axis.band_high() {
        return Err(axis_error(
            "critical",
            "critical must be above target + hysteresis",
        ));
    }
    if axis.deviation_weight <= 0.0 {
        return Err(axis_error(
            "deviation_weight",
            "deviation_weight must be positive",
        ));
    }
    Ok(())
}

/// Value-table learning and state discretization parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_learning"))]
pub struct LearningConfig {
    /// Learning rate of the value update, in (0, 1]
    pub alpha: f64,
    /// Accepted for compatibility; the value update does not bootstrap
    #[validate(range(min = 0.0, max = 1.0))]
    pub gamma: f64,
    /// Reward cost of running both fan groups at 100%
    pub noise_penalty: f64,
    /// Width of a temperature bucket, °C
    #[validate(range(min = 1.0))]
    pub bucket_step: f64,
    /// Readings kept per group for the moving average
    #[validate(range(min = 1))]
    pub history_length: usize,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            alpha: 0.05,
            gamma: 0.9,
            noise_penalty: 0.3,
            bucket_step: 2.0,
            history_length: 6,
        }
    }
}

fn validate_learning(learning: &LearningConfig) -> std::result::Result<(), ValidationError> {
    if !(learning.alpha > 0.0 && learning.alpha <= 1.0) {
        return Err(axis_error("alpha", "alpha must be in (0, 1]"));
    }
    if !(learning.noise_penalty.is_finite() && learning.noise_penalty > 0.0) {
        return Err(axis_error("noise_penalty", "noise_penalty must be positive"));
    }
    if !learning.bucket_step.is_finite() {
        return Err(axis_error("bucket_step", "bucket_step must be finite"));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ScheduleConfig {
    #[validate(range(min = 1))]
    pub interval_seconds: u64,
    /// Persist the value table every N cycles
    #[validate(range(min = 1))]
    pub save_interval_cycles: u64,
    /// Consecutive cycles a group may reuse its last reading before it is
    /// treated as critical
    #[validate(range(min = 1))]
    pub max_stale_cycles: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 10,
            save_interval_cycles: 30,
            max_stale_cycles: 6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct NotificationConfig {
    pub enabled: bool,
    #[validate(length(min = 1))]
    pub recipient: String,
    /// Send "started" / "stopped" notices
    pub notify_lifecycle: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            recipient: "root".to_string(),
            notify_lifecycle: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PersistenceConfig {
    #[validate(length(min = 1))]
    pub table_path: String,
    #[validate(length(min = 1))]
    pub history_csv_path: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            table_path: "/var/lib/thermo/value_table.json".to_string(),
            history_csv_path: "/var/log/thermo/history.csv".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the first config file found and the environment
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration from an explicit file (or the default search path)
    /// and the environment, then validate it
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let explicit = path.is_some();
        let config_path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => Self::find_config_file(),
        };

        // Defaults first so partial files and single env overrides still deserialize
        let defaults = config::Config::try_from(&Config::default())
            .context("Failed to build default configuration")?;
        let mut builder =
            ConfigBuilder::<config::builder::DefaultState>::default().add_source(defaults);

        if let Some(path) = &config_path {
            tracing::info!("Loading config from: {:?}", path);
            builder = builder.add_source(File::from(path.clone()).required(explicit));
        } else {
            tracing::info!("No config file found, using defaults");
        }

        // Environment variables with THERMO_ prefix, e.g. THERMO__CONTROL__RADIATOR__TARGET
        builder = builder.add_source(
            Environment::with_prefix("THERMO")
                .separator("__")
                .try_parsing(true),
        );

        let config: Config = builder
            .build()?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.ensure_valid()?;
        Ok(config)
    }

    /// Validate every section, reporting all violations at once
    pub fn ensure_valid(&self) -> crate::Result<()> {
        self.validate()
            .map_err(|e| ThermoError::Config(e.to_string()))
    }

    /// Find the configuration file
    pub fn find_config_file() -> Option<PathBuf> {
        // Check in order: THERMO_CONFIG, ./thermo.toml, /etc/thermo/thermo.toml, ~/.config/thermo/thermo.toml
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let local = PathBuf::from("thermo.toml");
        if local.exists() {
            return Some(local);
        }

        let system = PathBuf::from("/etc/thermo/thermo.toml");
        if system.exists() {
            return Some(system);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("thermo").join("thermo.toml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        None
    }
}
