//! Fault-injecting collaborators
//!
//! Each collaborator owns a [`FaultSwitch`]; a [`ChaosRig`] hands boxed
//! clones to a `CycleRunner` while the test keeps its own handles to flip
//! faults and inspect what reached the outside world.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use thermo_core::{
    ControlConfig, FanGroup, Result, SensorGroup, SensorReading, Severity, ThermoError,
};
use thermo_rl::{
    Actuator, Collaborators, CycleRecord, CycleReport, CycleRunner, EventSink, Notifier,
    SensorSource, TableStore, ValueTable,
};

use crate::{CallOutcome, ChaosConfig, ChaosError, ChaosMetrics, ChaosResult, FaultSwitch};

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Coolant probe plus two NVMe drives
#[derive(Clone, Default)]
pub struct ChaosSensors {
    pub switch: Arc<FaultSwitch>,
    temps: Arc<Mutex<(f64, Option<f64>)>>,
}

impl ChaosSensors {
    pub fn set(&self, radiator: f64, storage: f64) {
        *lock(&self.temps) = (radiator, Some(storage));
    }

    /// Host where no NVMe drive can be read
    pub fn set_radiator_only(&self, radiator: f64) {
        *lock(&self.temps) = (radiator, None);
    }
}

#[async_trait]
impl SensorSource for ChaosSensors {
    async fn read(&self) -> Vec<SensorReading> {
        let (radiator, storage) = *lock(&self.temps);
        match self.switch.call().await {
            CallOutcome::Normal => {
                let mut readings = vec![SensorReading::new(
                    "Temperature 1",
                    SensorGroup::Radiator,
                    radiator,
                )];
                if let Some(storage) = storage {
                    readings.push(SensorReading::new("nvme0n1", SensorGroup::Storage, storage));
                    readings.push(SensorReading::new(
                        "nvme1n1",
                        SensorGroup::Storage,
                        storage - 2.0,
                    ));
                }
                readings
            }
            CallOutcome::Fail => Vec::new(),
            CallOutcome::Garbage => vec![
                SensorReading::new("Temperature 1", SensorGroup::Radiator, f64::NAN),
                SensorReading::new("nvme0n1", SensorGroup::Storage, f64::INFINITY),
            ],
        }
    }
}

#[derive(Clone, Default)]
pub struct ChaosActuator {
    pub switch: Arc<FaultSwitch>,
    writes: Arc<Mutex<Vec<(FanGroup, u8)>>>,
}

impl ChaosActuator {
    /// Writes that reached the fans
    pub fn writes(&self) -> Vec<(FanGroup, u8)> {
        lock(&self.writes).clone()
    }
}

#[async_trait]
impl Actuator for ChaosActuator {
    async fn apply(&self, group: FanGroup, speed: u8) -> Result<()> {
        match self.switch.call().await {
            CallOutcome::Normal => {
                lock(&self.writes).push((group, speed));
                Ok(())
            }
            CallOutcome::Fail | CallOutcome::Garbage => Err(ThermoError::Actuator {
                group,
                reason: "controller not responding".to_string(),
            }),
        }
    }
}

#[derive(Clone, Default)]
pub struct ChaosNotifier {
    pub switch: Arc<FaultSwitch>,
    delivered: Arc<Mutex<Vec<(Severity, String)>>>,
}

impl ChaosNotifier {
    pub fn delivered(&self, severity: Severity) -> usize {
        lock(&self.delivered)
            .iter()
            .filter(|(s, _)| *s == severity)
            .count()
    }
}

#[async_trait]
impl Notifier for ChaosNotifier {
    async fn notify(&self, severity: Severity, subject: &str, _body: &str) -> Result<()> {
        match self.switch.call().await {
            CallOutcome::Normal => {
                lock(&self.delivered).push((severity, subject.to_string()));
                Ok(())
            }
            CallOutcome::Fail | CallOutcome::Garbage => {
                Err(ThermoError::Notification("mail exited with status 75".to_string()))
            }
        }
    }
}

/// In-memory JSON table file
#[derive(Clone, Default)]
pub struct ChaosStore {
    pub switch: Arc<FaultSwitch>,
    contents: Arc<Mutex<Option<String>>>,
}

impl ChaosStore {
    /// Table currently persisted, if any and if it parses
    pub fn persisted(&self) -> Option<ValueTable> {
        lock(&self.contents)
            .as_deref()
            .and_then(|json| ValueTable::from_json(json).ok())
    }
}

#[async_trait]
impl TableStore for ChaosStore {
    async fn load(&self) -> Result<Option<ValueTable>> {
        match self.switch.call().await {
            CallOutcome::Normal => match lock(&self.contents).as_deref() {
                Some(json) => ValueTable::from_json(json).map(Some),
                None => Ok(None),
            },
            CallOutcome::Fail => Err(ThermoError::Io(std::io::Error::other("disk unavailable"))),
            CallOutcome::Garbage => ValueTable::from_json("{\"40_60|50\": oops").map(Some),
        }
    }

    async fn save(&self, table: &ValueTable) -> Result<()> {
        match self.switch.call().await {
            CallOutcome::Normal => {
                *lock(&self.contents) = Some(table.to_json()?);
                Ok(())
            }
            CallOutcome::Fail | CallOutcome::Garbage => Err(ThermoError::PersistenceWrite(
                "no space left on device".to_string(),
            )),
        }
    }
}

#[derive(Clone, Default)]
pub struct ChaosEvents {
    pub switch: Arc<FaultSwitch>,
    records: Arc<Mutex<Vec<CycleRecord>>>,
}

impl ChaosEvents {
    pub fn recorded(&self) -> usize {
        lock(&self.records).len()
    }
}

#[async_trait]
impl EventSink for ChaosEvents {
    async fn record(&self, record: &CycleRecord) -> Result<()> {
        match self.switch.call().await {
            CallOutcome::Normal => {
                lock(&self.records).push(record.clone());
                Ok(())
            }
            CallOutcome::Fail | CallOutcome::Garbage => {
                Err(ThermoError::Io(std::io::Error::other("history file locked")))
            }
        }
    }
}

/// Full set of chaos collaborators plus the runner driving them
#[derive(Clone, Default)]
pub struct ChaosRig {
    pub sensors: ChaosSensors,
    pub actuator: ChaosActuator,
    pub notifier: ChaosNotifier,
    pub store: ChaosStore,
    pub events: ChaosEvents,
    pub config: ChaosConfig,
}

impl ChaosRig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: ChaosConfig) -> Self {
        self.config = config;
        self
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            sensors: Box::new(self.sensors.clone()),
            actuator: Box::new(self.actuator.clone()),
            notifier: Box::new(self.notifier.clone()),
            store: Box::new(self.store.clone()),
            events: Box::new(self.events.clone()),
        }
    }

    /// Bootstrap a runner from whatever the store holds
    pub async fn runner(&self, control: ControlConfig) -> CycleRunner {
        CycleRunner::bootstrap(control, self.collaborators(), false)
            .await
            .with_lifecycle_notices(true)
    }

    /// Drive `cycles` cycles under the scenario timeout, tallying metrics
    pub async fn drive(
        &self,
        runner: &mut CycleRunner,
        cycles: u32,
        metrics: &mut ChaosMetrics,
    ) -> ChaosResult<Vec<CycleReport>> {
        let run = async {
            let mut reports = Vec::with_capacity(cycles as usize);
            for _ in 0..cycles {
                let report = runner.run_cycle().await;
                metrics.cycles += 1;
                if let Some(decision) = &report.decision {
                    metrics.decisions += 1;
                    if !decision.stale.is_empty() {
                        metrics.stale_decisions += 1;
                    }
                }
                if !report.apply_failures.is_empty() {
                    metrics.degraded_cycles += 1;
                }
                reports.push(report);
            }
            reports
        };

        tokio::time::timeout(self.config.test_timeout, run)
            .await
            .map_err(|_| ChaosError::Timeout {
                operation: format!("{cycles} cycles"),
            })
    }

    /// Run cycles until the fans match the held action, returning how many
    /// cycles that took
    pub async fn until_fans_match(
        &self,
        runner: &mut CycleRunner,
        max_cycles: u32,
    ) -> ChaosResult<u32> {
        for cycle in 1..=max_cycles {
            runner.run_cycle().await;
            let action = runner.engine().current_action();
            let matched = FanGroup::ALL
                .iter()
                .all(|g| runner.applied_speed(*g) == Some(action.speed(*g)));
            if matched {
                return Ok(cycle);
            }
        }
        Err(ChaosError::UnexpectedState {
            expected: format!("fans at {}", runner.engine().current_action()),
            actual: format!(
                "radiator {:?}, chassis {:?}",
                runner.applied_speed(FanGroup::Radiator),
                runner.applied_speed(FanGroup::Chassis)
            ),
        })
    }
}
