//! Thermo Chaos Testing Infrastructure
//!
//! Fault-injecting collaborators for the cycle runner, used to verify that
//! the control loop keeps running when its surroundings misbehave:
//! - Sensor outages, flapping and garbage readings
//! - Actuator write failures
//! - Notifier and table store outages
//! - Slow collaborators

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::unused_async)]
#![allow(clippy::float_cmp)]

pub mod faults;
pub mod sensor_chaos_tests;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

/// Configuration for chaos tests
#[derive(Debug, Clone)]
pub struct ChaosConfig {
    /// Timeout for a whole scenario
    pub test_timeout: Duration,
    /// Cycles driven by the long-running scenarios
    pub cycles: u32,
    /// Every n-th call fails under intermittent faults
    pub failure_every: u32,
    /// Delay added to every call under latency faults
    pub injection_delay: Duration,
}

impl Default for ChaosConfig {
    fn default() -> Self {
        Self {
            test_timeout: Duration::from_secs(
                std::env::var("CHAOS_TEST_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            cycles: std::env::var("CHAOS_CYCLES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(60),
            failure_every: std::env::var("CHAOS_FAILURE_EVERY")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(3),
            injection_delay: Duration::from_millis(
                std::env::var("CHAOS_INJECTION_DELAY_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
        }
    }
}

/// Result type for chaos test operations
pub type ChaosResult<T> = Result<T, ChaosError>;

/// Error type for chaos test failures
#[derive(Debug, thiserror::Error)]
pub enum ChaosError {
    #[error("Timeout waiting for {operation}")]
    Timeout { operation: String },

    #[error("Unexpected state: expected {expected}, got {actual}")]
    UnexpectedState { expected: String, actual: String },
}

/// Trait for collaborators that can be chaos-tested
#[async_trait]
pub trait ChaosTestable: Send + Sync {
    /// Whether the collaborator currently behaves normally
    async fn health_check(&self) -> ChaosResult<bool>;

    /// Inject a fault
    async fn inject_fault(&self, fault: FaultType) -> ChaosResult<()>;

    /// Remove injected faults and restore normal operation
    async fn restore(&self) -> ChaosResult<()>;
}

/// Types of faults that can be injected
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FaultType {
    /// Every call fails
    Outage,
    /// Every n-th call fails, counting from the injection
    Intermittent { every: u32 },
    /// Calls succeed after a delay
    Latency { delay_ms: u64 },
    /// Calls succeed but return unusable data
    Garbage,
}

/// Fault state shared between a test and the collaborator it controls
#[derive(Debug, Default)]
pub struct FaultSwitch {
    fault: Mutex<Option<FaultType>>,
    calls: AtomicU32,
    failures: AtomicU32,
}

/// What a single call should do under the active fault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    Normal,
    Fail,
    Garbage,
}

impl FaultSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, fault: Option<FaultType>) {
        if let Ok(mut current) = self.fault.lock() {
            *current = fault;
        }
        self.calls.store(0, Ordering::SeqCst);
    }

    pub fn active(&self) -> Option<FaultType> {
        self.fault.lock().ok().and_then(|f| *f)
    }

    /// Register a call and decide its outcome, sleeping first under latency faults
    pub async fn call(&self) -> CallOutcome {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let outcome = match self.active() {
            None => CallOutcome::Normal,
            Some(FaultType::Outage) => CallOutcome::Fail,
            Some(FaultType::Intermittent { every }) if every > 0 && call % every == 0 => {
                CallOutcome::Fail
            }
            Some(FaultType::Intermittent { .. }) => CallOutcome::Normal,
            Some(FaultType::Latency { delay_ms }) => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                CallOutcome::Normal
            }
            Some(FaultType::Garbage) => CallOutcome::Garbage,
        };
        if outcome != CallOutcome::Normal {
            self.failures.fetch_add(1, Ordering::SeqCst);
        }
        outcome
    }

    /// Calls that failed or returned garbage since creation
    pub fn failures(&self) -> u32 {
        self.failures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChaosTestable for FaultSwitch {
    async fn health_check(&self) -> ChaosResult<bool> {
        Ok(self.active().is_none())
    }

    async fn inject_fault(&self, fault: FaultType) -> ChaosResult<()> {
        self.set(Some(fault));
        Ok(())
    }

    async fn restore(&self) -> ChaosResult<()> {
        self.set(None);
        Ok(())
    }
}

/// Metrics collected during chaos tests
#[derive(Debug, Default)]
pub struct ChaosMetrics {
    /// Cycles driven
    pub cycles: u32,
    /// Cycles that produced a decision
    pub decisions: u32,
    /// Decisions made with at least one stale sensor group
    pub stale_decisions: u32,
    /// Cycles where at least one fan write failed
    pub degraded_cycles: u32,
    /// Cycles between a fault being lifted and the fans matching the
    /// decided action again
    pub recovery_cycles: Vec<u32>,
}

impl ChaosMetrics {
    /// Average recovery length in cycles
    pub fn avg_recovery_cycles(&self) -> Option<f64> {
        if self.recovery_cycles.is_empty() {
            None
        } else {
            let sum: u32 = self.recovery_cycles.iter().sum();
            Some(f64::from(sum) / self.recovery_cycles.len() as f64)
        }
    }

    /// Share of cycles that produced a decision
    pub fn availability(&self) -> f64 {
        if self.cycles == 0 {
            1.0
        } else {
            f64::from(self.decisions) / f64::from(self.cycles)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chaos_config_defaults() {
        let config = ChaosConfig::default();
        assert_eq!(config.test_timeout, Duration::from_secs(60));
        assert!(config.failure_every > 0);
    }

    #[test]
    fn test_chaos_metrics_avg_recovery() {
        let mut metrics = ChaosMetrics::default();
        assert!(metrics.avg_recovery_cycles().is_none());

        metrics.recovery_cycles = vec![1, 2, 3];
        assert_eq!(metrics.avg_recovery_cycles(), Some(2.0));
    }

    #[test]
    fn test_chaos_metrics_availability() {
        let mut metrics = ChaosMetrics::default();
        assert_eq!(metrics.availability(), 1.0);

        metrics.cycles = 10;
        metrics.decisions = 8;
        assert!((metrics.availability() - 0.8).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_fault_switch_intermittent() {
        let switch = FaultSwitch::new();
        tokio_test::assert_ok!(switch.inject_fault(FaultType::Intermittent { every: 3 }).await);

        let mut outcomes = Vec::new();
        for _ in 0..6 {
            outcomes.push(switch.call().await);
        }
        let failed = outcomes.iter().filter(|o| **o == CallOutcome::Fail).count();
        assert_eq!(failed, 2);
        assert_eq!(outcomes[2], CallOutcome::Fail);
        assert_eq!(switch.failures(), 2);
        assert!(!switch.health_check().await.unwrap());

        tokio_test::assert_ok!(switch.restore().await);
        assert!(switch.health_check().await.unwrap());
        assert_eq!(switch.call().await, CallOutcome::Normal);
    }
}
