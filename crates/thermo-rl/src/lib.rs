//! Thermo RL - Decision engine for the fan control loop
//!
//! Smooths temperature samples, discretizes them into state keys, picks the
//! next fan-speed pair with a hysteresis policy, scores it with a
//! penalty-only reward, and keeps a tabular value estimate per
//! (state, action). A safety override forces maximum cooling above the
//! critical thresholds.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::float_cmp)]
#![allow(clippy::similar_names)]

pub mod collaborators;
pub mod emergency;
pub mod engine;
pub mod history;
pub mod orchestrator;
pub mod policy;
pub mod reward;
pub mod state;
pub mod table;

pub use collaborators::{Actuator, Collaborators, EventSink, Notifier, SensorSource, TableStore};
pub use emergency::{EmergencyOverride, EmergencyState, Transition};
pub use engine::{Decision, SkippedCycle, ThermalEngine};
pub use history::TemperatureHistory;
pub use orchestrator::{CycleRecord, CycleReport, CycleRunner, RunnerStats};
pub use policy::{ActionPolicy, HysteresisPolicy};
pub use reward::RewardBreakdown;
pub use state::{Action, Reward, StateKey, Temperatures};
pub use table::ValueTable;
