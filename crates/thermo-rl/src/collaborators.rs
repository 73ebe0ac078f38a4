//! Contracts for the I/O the control loop depends on
//!
//! Implementations live in the daemon; tests use in-memory fakes.

use async_trait::async_trait;

use thermo_core::{FanGroup, Result, SensorReading, Severity};

use crate::orchestrator::CycleRecord;
use crate::table::ValueTable;

/// Produces the temperature samples for one cycle
#[async_trait]
pub trait SensorSource: Send + Sync {
    /// Read every sensor. Individual sensors may fail; their readings are
    /// simply absent from the result.
    async fn read(&self) -> Vec<SensorReading>;
}

/// Drives one fan group to a speed
#[async_trait]
pub trait Actuator: Send + Sync {
    async fn apply(&self, group: FanGroup, speed: u8) -> Result<()>;
}

/// Best-effort delivery of operator notifications
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, severity: Severity, subject: &str, body: &str) -> Result<()>;
}

/// Durable home of the value table
#[async_trait]
pub trait TableStore: Send + Sync {
    /// `Ok(None)` when nothing has been persisted yet
    async fn load(&self) -> Result<Option<ValueTable>>;

    async fn save(&self, table: &ValueTable) -> Result<()>;
}

/// Append-only per-cycle record sink
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn record(&self, record: &CycleRecord) -> Result<()>;
}

/// The full set of collaborators a [`crate::CycleRunner`] drives
pub struct Collaborators {
    pub sensors: Box<dyn SensorSource>,
    pub actuator: Box<dyn Actuator>,
    pub notifier: Box<dyn Notifier>,
    pub store: Box<dyn TableStore>,
    pub events: Box<dyn EventSink>,
}
