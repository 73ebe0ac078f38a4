//! Cycle Runner - drives one sense/decide/act/learn cycle at a time
//!
//! Every collaborator failure is contained here: a cycle degrades but never
//! returns an error, so one bad cycle cannot suppress the next.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use thermo_core::{ControlConfig, FanGroup, SensorGroup, Severity};

use crate::collaborators::Collaborators;
use crate::emergency::Transition;
use crate::engine::{Decision, SkippedCycle, ThermalEngine};
use crate::state::Action;
use crate::table::ValueTable;

/// One row of the per-cycle event log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleRecord {
    pub timestamp: DateTime<Utc>,
    pub temp_rad: f64,
    pub temp_storage: f64,
    pub avg_rad: f64,
    pub avg_storage: f64,
    pub state_rad: i64,
    pub state_storage: i64,
    pub fan_rad: u8,
    pub fan_chs: u8,
    /// Mean fan speed, a rough loudness proxy
    pub noise_est: f64,
    pub reward: f64,
    pub emergency: bool,
    pub table_entries: usize,
}

impl CycleRecord {
    pub fn from_decision(decision: &Decision, table_entries: usize, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            temp_rad: decision.raw.radiator,
            temp_storage: decision.raw.storage,
            avg_rad: decision.smoothed.radiator,
            avg_storage: decision.smoothed.storage,
            state_rad: decision.state.radiator,
            state_storage: decision.state.storage,
            fan_rad: decision.action.radiator,
            fan_chs: decision.action.chassis,
            noise_est: f64::from(decision.action.total()) / 2.0,
            reward: decision.reward,
            emergency: decision.emergency,
            table_entries,
        }
    }
}

/// Outcome of one [`CycleRunner::run_cycle`]
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    /// `None` when the cycle was skipped for lack of readings
    pub decision: Option<Decision>,
    /// Emergency check made on a skipped cycle
    pub skip: Option<SkippedCycle>,
    /// Fan groups written this cycle, with the speed written
    pub applied: Vec<(FanGroup, u8)>,
    pub apply_failures: Vec<FanGroup>,
    /// Severity of the notification attempted this cycle, if any
    pub notification: Option<Severity>,
    /// `Some(ok)` when a table save was due this cycle
    pub saved: Option<bool>,
}

impl CycleReport {
    pub fn is_skipped(&self) -> bool {
        self.decision.is_none()
    }
}

/// Running counters
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunnerStats {
    pub cycles: u64,
    pub skipped_cycles: u64,
    pub actuator_writes: u64,
    pub actuator_failures: u64,
    pub emergency_entries: u64,
    pub notifications_sent: u64,
    pub notification_failures: u64,
    pub table_saves: u64,
    pub table_save_failures: u64,
    pub event_failures: u64,
}

/// Owns the engine and its collaborators for the lifetime of the loop
pub struct CycleRunner {
    engine: ThermalEngine,
    collaborators: Collaborators,
    save_interval: u64,
    notify_lifecycle: bool,
    applied: HashMap<FanGroup, u8>,
    stats: RunnerStats,
    last_decision: Option<Decision>,
}

impl CycleRunner {
    pub fn new(engine: ThermalEngine, collaborators: Collaborators, save_interval_cycles: u64) -> Self {
        Self {
            engine,
            collaborators,
            save_interval: save_interval_cycles.max(1),
            notify_lifecycle: false,
            applied: HashMap::new(),
            stats: RunnerStats::default(),
            last_decision: None,
        }
    }

    /// Load the persisted table (unless `reset`) and build a runner around it.
    /// A missing or unreadable table starts learning from scratch.
    pub async fn bootstrap(config: ControlConfig, collaborators: Collaborators, reset: bool) -> Self {
        let table = if reset {
            info!("Value table reset requested, starting empty");
            ValueTable::new()
        } else {
            match collaborators.store.load().await {
                Ok(Some(table)) => {
                    info!(
                        entries = table.len(),
                        states = table.state_count(),
                        "Loaded value table"
                    );
                    table
                }
                Ok(None) => {
                    info!("No persisted value table, starting empty");
                    ValueTable::new()
                }
                Err(e) => {
                    warn!("Could not load value table, starting empty: {}", e);
                    ValueTable::new()
                }
            }
        };

        let save_interval = config.schedule.save_interval_cycles;
        Self::new(ThermalEngine::new(config, table), collaborators, save_interval)
    }

    /// Send "started"/"stopped" notices
    pub fn with_lifecycle_notices(mut self, enabled: bool) -> Self {
        self.notify_lifecycle = enabled;
        self
    }

    /// Startup notice
    pub async fn announce(&mut self) {
        if !self.notify_lifecycle {
            return;
        }
        let body = format!(
            "Fan control loop is active ({} policy, {} learned entries).",
            self.engine.policy_name(),
            self.engine.table().len()
        );
        self.notify(Severity::Info, "thermo: fan control started", &body)
            .await;
    }

    /// Execute one full cycle
    pub async fn run_cycle(&mut self) -> CycleReport {
        self.stats.cycles += 1;
        let mut report = CycleReport::default();

        let readings = self.collaborators.sensors.read().await;
        let decision = self.engine.step(&readings);

        // Skipped cycles still push the held action, so an earlier failed
        // write gets retried
        let target = self.engine.current_action();
        self.reconcile(target, &mut report).await;

        // The emergency check also runs on partial data
        let Some(decision) = decision else {
            self.stats.skipped_cycles += 1;
            if let Some(skip) = self.engine.last_skip().cloned() {
                let temperatures =
                    self.temperature_summary(|group| skip.known.get(&group).copied());
                report.notification = self
                    .notify_transition(skip.transition, &skip.breaches, &temperatures, skip.action)
                    .await;
                report.skip = Some(skip);
            }
            warn!(
                readings = readings.len(),
                "Incomplete sensor data, holding fans at {}", target
            );
            return report;
        };

        for group in &decision.stale {
            warn!("No reading from {} sensors, reusing last value", group);
        }

        let temperatures = self.temperature_summary(|group| Some(decision.raw.get(group)));
        report.notification = self
            .notify_transition(
                decision.transition,
                &decision.breaches,
                &temperatures,
                decision.action,
            )
            .await;

        let record = CycleRecord::from_decision(&decision, self.engine.table().len(), Utc::now());
        if let Err(e) = self.collaborators.events.record(&record).await {
            self.stats.event_failures += 1;
            warn!("Failed to record cycle event: {}", e);
        }

        if decision.cycle % self.save_interval == 0 {
            report.saved = Some(self.persist().await);
        }

        info!(
            cycle = decision.cycle,
            state = %decision.state,
            action = %decision.action,
            emergency = decision.emergency,
            table_entries = self.engine.table().len(),
            "Radiator {:.1}°C (avg {:.1}) | Storage {:.1}°C (avg {:.1}) | Reward {:.3}",
            decision.raw.radiator,
            decision.smoothed.radiator,
            decision.raw.storage,
            decision.smoothed.storage,
            decision.reward,
        );

        self.last_decision = Some(decision.clone());
        report.decision = Some(decision);
        report
    }

    /// Write the table to the store; failures are logged and retried at
    /// the next scheduled save
    pub async fn persist(&mut self) -> bool {
        match self.collaborators.store.save(self.engine.table()).await {
            Ok(()) => {
                self.stats.table_saves += 1;
                debug!(entries = self.engine.table().len(), "Value table saved");
                true
            }
            Err(e) => {
                self.stats.table_save_failures += 1;
                error!("Failed to save value table: {}", e);
                false
            }
        }
    }

    /// Final save and "stopped" notice
    pub async fn shutdown(&mut self) -> RunnerStats {
        info!(cycles = self.stats.cycles, "Shutting down control loop");
        self.persist().await;

        if self.notify_lifecycle {
            let body = format!(
                "Fan control loop stopped after {} cycles ({} learned entries).",
                self.stats.cycles,
                self.engine.table().len()
            );
            self.notify(Severity::Info, "thermo: fan control stopped", &body)
                .await;
        }
        self.stats.clone()
    }

    /// Crash notice for fatal errors outside the cycle
    pub async fn report_failure(&mut self, reason: &str) {
        let body = format!("Fan control loop failed: {reason}");
        self.notify(Severity::Critical, "thermo: fan control crashed", &body)
            .await;
    }

    pub fn engine(&self) -> &ThermalEngine {
        &self.engine
    }

    pub fn stats(&self) -> &RunnerStats {
        &self.stats
    }

    pub fn last_decision(&self) -> Option<&Decision> {
        self.last_decision.as_ref()
    }

    /// Last speed successfully written to a fan group
    pub fn applied_speed(&self, group: FanGroup) -> Option<u8> {
        self.applied.get(&group).copied()
    }

    async fn reconcile(&mut self, target: Action, report: &mut CycleReport) {
        for group in FanGroup::ALL {
            let speed = target.speed(group);
            if self.applied.get(&group) == Some(&speed) {
                continue;
            }
            match self.collaborators.actuator.apply(group, speed).await {
                Ok(()) => {
                    self.applied.insert(group, speed);
                    self.stats.actuator_writes += 1;
                    report.applied.push((group, speed));
                    debug!("Set {} fans to {}%", group, speed);
                }
                Err(e) => {
                    self.stats.actuator_failures += 1;
                    report.apply_failures.push(group);
                    warn!("Failed to set {} fans to {}%: {}", group, speed, e);
                }
            }
        }
    }

    /// One "group: value" entry per sensor group, flagging stale and
    /// missing groups
    fn temperature_summary(&self, value_of: impl Fn(SensorGroup) -> Option<f64>) -> String {
        SensorGroup::ALL
            .into_iter()
            .map(|group| {
                let stale = self.engine.stale_cycles(group);
                match value_of(group) {
                    None => format!("{group}: no reading"),
                    Some(value) if stale > 0 => {
                        format!("{group}: {value:.1}°C (no reading for {stale} cycles)")
                    }
                    Some(value) => format!("{group}: {value:.1}°C"),
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    async fn notify_transition(
        &mut self,
        transition: Transition,
        breaches: &[SensorGroup],
        temperatures: &str,
        action: Action,
    ) -> Option<Severity> {
        match transition {
            Transition::Entered => {
                self.stats.emergency_entries += 1;
                let groups: Vec<&str> = breaches.iter().map(|g| g.as_str()).collect();
                let body = format!(
                    "Critical temperature on {} after {} cycles. {}. All fans forced to {}.",
                    groups.join(", "),
                    self.stats.cycles,
                    temperatures,
                    action,
                );
                self.notify(Severity::Critical, "thermo: CRITICAL temperature", &body)
                    .await;
                Some(Severity::Critical)
            }
            Transition::Recovered => {
                let body = format!("Temperatures back below critical. {temperatures}.");
                self.notify(Severity::Info, "thermo: temperatures recovered", &body)
                    .await;
                Some(Severity::Info)
            }
            Transition::Clear | Transition::Sustained => None,
        }
    }

    async fn notify(&mut self, severity: Severity, subject: &str, body: &str) {
        match self
            .collaborators
            .notifier
            .notify(severity, subject, body)
            .await
        {
            Ok(()) => self.stats.notifications_sent += 1,
            Err(e) => {
                self.stats.notification_failures += 1;
                warn!("Failed to send {} notification: {}", severity, e);
            }
        }
    }
}
