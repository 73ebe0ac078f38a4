//! Thermo Core - Shared types, errors, and configuration
//!
//! This crate provides the foundational types used across all thermo components.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod types;

pub use config::{AxisConfig, Config, ControlConfig, LearningConfig, ScheduleConfig};
pub use error::{Result, ThermoError};
pub use types::{FanGroup, SensorGroup, SensorReading, Severity};
