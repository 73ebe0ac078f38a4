//! Error types for thermo

use thiserror::Error;

use crate::types::{FanGroup, SensorGroup};

/// Main error type for thermo
#[derive(Error, Debug)]
pub enum ThermoError {
    #[error("No reading available for sensor group {0}")]
    SensorUnavailable(SensorGroup),

    #[error("Failed to apply speed to {group} fans: {reason}")]
    Actuator { group: FanGroup, reason: String },

    #[error("Persisted value table is corrupt: {0}")]
    PersistenceCorrupt(String),

    #[error("Failed to persist value table: {0}")]
    PersistenceWrite(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Command `{program}` failed: {reason}")]
    Command { program: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ThermoError {
    /// Shorthand for a failed external command
    pub fn command(program: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Command {
            program: program.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type alias for thermo operations
pub type Result<T> = std::result::Result<T, ThermoError>;
