//! JSON file store for the value table

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use thermo_core::{Result, ThermoError};
use thermo_rl::{TableStore, ValueTable};

use crate::metrics;

/// Flat `{"<state>|<action>": value}` JSON object on disk
#[derive(Debug, Clone)]
pub struct JsonTableStore {
    path: PathBuf,
}

impl JsonTableStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "value_table.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn write(&self, table: &ValueTable) -> Result<()> {
        let write_err = |e: std::io::Error| {
            ThermoError::PersistenceWrite(format!("{}: {}", self.path.display(), e))
        };

        let json = table.to_json()?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }

        // Write then rename so a crash never leaves a truncated table
        let temp = self.temp_path();
        tokio::fs::write(&temp, json).await.map_err(write_err)?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(write_err)?;
        Ok(())
    }
}

#[async_trait]
impl TableStore for JsonTableStore {
    async fn load(&self) -> Result<Option<ValueTable>> {
        let json = match tokio::fs::read_to_string(&self.path).await {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ThermoError::PersistenceCorrupt(format!(
                    "{}: {}",
                    self.path.display(),
                    e
                )))
            }
        };
        ValueTable::from_json(&json).map(Some)
    }

    async fn save(&self, table: &ValueTable) -> Result<()> {
        let result = self.write(table).await;
        metrics::record_table_save(result.is_ok());
        if result.is_ok() {
            debug!(entries = table.len(), "Value table written to {}", self.path.display());
        }
        result
    }
}
