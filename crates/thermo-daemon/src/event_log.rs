//! CSV cycle history

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use thermo_core::{Result, ThermoError};
use thermo_rl::{CycleRecord, EventSink};

/// Appends one row per cycle; the header is written when the file is new
#[derive(Debug, Clone)]
pub struct CsvEventLog {
    path: PathBuf,
}

impl CsvEventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn append(path: &Path, record: &CycleRecord) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let is_new = file.metadata()?.len() == 0;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(is_new)
        .from_writer(file);
    writer.serialize(record)?;
    writer.flush()?;
    Ok(())
}

#[async_trait]
impl EventSink for CsvEventLog {
    async fn record(&self, record: &CycleRecord) -> Result<()> {
        let path = self.path.clone();
        let record = record.clone();
        tokio::task::spawn_blocking(move || append(&path, &record))
            .await
            .map_err(|e| ThermoError::Io(std::io::Error::other(e)))?
    }
}
