//! JSON lines experiment logger

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{json, Value};

use super::{ExperimentDir, Logger, Metrics, RunOutcome, Version, DEFAULT_LOGGER_NAME};
use crate::error::Result;

/// Metrics stream written into the experiment directory
pub const METRICS_FILE: &str = "metrics.jsonl";

/// Hyperparameter file written into the experiment directory
pub const HPARAMS_FILE: &str = "hparams.json";

/// Final run status written on finalisation
pub const STATUS_FILE: &str = "status.json";

/// Appends one JSON object per logged step to `metrics.jsonl`.
pub struct JsonLogger {
    experiment: ExperimentDir,
    writer: Mutex<Option<BufWriter<File>>>,
}

impl JsonLogger {
    pub fn new(save_dir: impl Into<PathBuf>) -> Self {
        Self {
            experiment: ExperimentDir::new(save_dir, DEFAULT_LOGGER_NAME),
            writer: Mutex::new(None),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.experiment = self.experiment.with_name(name);
        self
    }

    pub fn with_version(mut self, version: impl Into<Version>) -> Self {
        self.experiment = self.experiment.with_version(version);
        self
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.experiment.path().join(METRICS_FILE)
    }
}

impl Logger for JsonLogger {
    fn name(&self) -> String {
        self.experiment.name().to_string()
    }

    fn version(&self) -> Version {
        self.experiment.version()
    }

    fn save_dir(&self) -> Option<&Path> {
        Some(self.experiment.save_dir())
    }

    fn validate(&self) -> Result<()> {
        self.experiment.validate()
    }

    fn log_hyperparams(&self, params: &Value) -> Result<()> {
        let dir = self.experiment.ensure()?;
        fs::write(dir.join(HPARAMS_FILE), serde_json::to_string_pretty(params)?)?;
        Ok(())
    }

    fn log_metrics(&self, metrics: &Metrics, step: u64) -> Result<()> {
        let mut writer = self.writer.lock();
        if writer.is_none() {
            let dir = self.experiment.ensure()?;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(dir.join(METRICS_FILE))?;
            *writer = Some(BufWriter::new(file));
        }

        let record = json!({
            "step": step,
            "metrics": metrics,
            "timestamp": Utc::now().to_rfc3339(),
        });

        if let Some(writer) = writer.as_mut() {
            serde_json::to_writer(&mut *writer, &record)?;
            writer.write_all(b"\n")?;
        }
        Ok(())
    }

    fn save(&self) -> Result<()> {
        if let Some(writer) = self.writer.lock().as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    fn finalize(&self, outcome: RunOutcome) -> Result<()> {
        self.save()?;
        let dir = self.experiment.ensure()?;
        let status = json!({
            "status": outcome.as_str(),
            "finished_at": Utc::now().to_rfc3339(),
        });
        fs::write(dir.join(STATUS_FILE), serde_json::to_string_pretty(&status)?)?;
        Ok(())
    }
}
