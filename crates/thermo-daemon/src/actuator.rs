//! Fan speed control through `liquidctl set`

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use thermo_core::config::DevicesConfig;
use thermo_core::{FanGroup, Result, ThermoError};
use thermo_rl::Actuator;

use crate::{command, metrics};

#[derive(Debug, Clone)]
pub struct LiquidctlActuator {
    controller_match: String,
    radiator_channels: Vec<u8>,
    chassis_channels: Vec<u8>,
    timeout: Duration,
}

impl LiquidctlActuator {
    pub fn new(devices: &DevicesConfig) -> Self {
        Self {
            controller_match: devices.controller_match.clone(),
            radiator_channels: devices.radiator_fan_channels.clone(),
            chassis_channels: devices.chassis_fan_channels.clone(),
            timeout: Duration::from_secs(devices.command_timeout_seconds),
        }
    }

    /// Controller channels wired to a fan group
    pub fn channels(&self, group: FanGroup) -> &[u8] {
        match group {
            FanGroup::Radiator => &self.radiator_channels,
            FanGroup::Chassis => &self.chassis_channels,
        }
    }

    /// `liquidctl` arguments that set one channel
    pub fn set_speed_args(&self, channel: u8, speed: u8) -> Vec<String> {
        vec![
            "--match".to_string(),
            self.controller_match.clone(),
            "set".to_string(),
            format!("fan{channel}"),
            "speed".to_string(),
            speed.to_string(),
        ]
    }
}

#[async_trait]
impl Actuator for LiquidctlActuator {
    /// Every channel of the group is attempted; any failure fails the apply
    async fn apply(&self, group: FanGroup, speed: u8) -> Result<()> {
        let mut failures = Vec::new();

        for &channel in self.channels(group) {
            let args = self.set_speed_args(channel, speed);
            let args: Vec<&str> = args.iter().map(String::as_str).collect();
            if let Err(e) = command::run("liquidctl", &args, None, self.timeout).await {
                failures.push(format!("fan{channel}: {e}"));
            }
        }

        let ok = failures.is_empty();
        metrics::record_actuator_write(group, ok);
        if ok {
            debug!("{} fans set to {}%", group, speed);
            Ok(())
        } else {
            Err(ThermoError::Actuator {
                group,
                reason: failures.join("; "),
            })
        }
    }
}
