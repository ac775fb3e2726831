//! CSV experiment logger

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use super::{ExperimentDir, Logger, Metrics, Version, DEFAULT_LOGGER_NAME};
use crate::error::{Error, Result};

/// Metrics file written into the experiment directory
pub const METRICS_FILE: &str = "metrics.csv";

/// Hyperparameter file written into the experiment directory
pub const HPARAMS_FILE: &str = "hparams.yaml";

/// Rows buffered before an automatic flush
pub const DEFAULT_FLUSH_EVERY: usize = 100;

#[derive(Debug, Clone)]
struct MetricsRow {
    step: u64,
    values: Metrics,
}

/// Logs metrics to `<save_dir>/<name>/version_<n>/metrics.csv`.
///
/// Rows are kept in memory and the whole file is rewritten on every flush,
/// so columns added late in a run still get a header entry. The header is
/// `step` followed by the sorted union of all metric names; missing values
/// are left empty.
pub struct CsvLogger {
    experiment: ExperimentDir,
    flush_every: usize,
    rows: Mutex<Vec<MetricsRow>>,
    unflushed: Mutex<usize>,
}

impl CsvLogger {
    /// Create a logger named `lightning_logs` under `save_dir`
    pub fn new(save_dir: impl Into<PathBuf>) -> Self {
        Self {
            experiment: ExperimentDir::new(save_dir, DEFAULT_LOGGER_NAME),
            flush_every: DEFAULT_FLUSH_EVERY,
            rows: Mutex::new(Vec::new()),
            unflushed: Mutex::new(0),
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

    /// Flush to disk every `rows` logged rows
    pub fn with_flush_every(mut self, rows: usize) -> Self {
        self.flush_every = rows;
        self
    }

    /// Path of the metrics file
    pub fn metrics_path(&self) -> PathBuf {
        self.experiment.path().join(METRICS_FILE)
    }

    /// Rewrite `path` with every buffered row
    fn write_rows(path: &Path, rows: &[MetricsRow]) -> Result<()> {
        let columns: BTreeSet<&str> = rows
            .iter()
            .flat_map(|row| row.values.keys().map(String::as_str))
            .collect();

        let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;
        writer
            .write_record(std::iter::once("step").chain(columns.iter().copied()))
            .map_err(csv_error)?;

        for row in rows {
            let mut record = Vec::with_capacity(columns.len() + 1);
            record.push(row.step.to_string());
            for column in &columns {
                record.push(row.values.get(*column).map(f64::to_string).unwrap_or_default());
            }
            writer.write_record(&record).map_err(csv_error)?;
        }

        writer.flush()?;
        Ok(())
    }
}

fn csv_error(e: csv::Error) -> Error {
    Error::logger(format!("Failed to write metrics CSV: {e}"))
}

impl Logger for CsvLogger {
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
        if self.flush_every == 0 {
            return Err(Error::config("CSV logger flush interval must be greater than 0"));
        }
        self.experiment.validate()
    }

    fn log_hyperparams(&self, params: &Value) -> Result<()> {
        let dir = self.experiment.ensure()?;
        let path = dir.join(HPARAMS_FILE);
        fs::write(&path, serde_yaml::to_string(params)?)?;
        debug!("Wrote hyperparameters to {}", path.display());
        Ok(())
    }

    fn log_metrics(&self, metrics: &Metrics, step: u64) -> Result<()> {
        self.rows.lock().push(MetricsRow {
            step,
            values: metrics.clone(),
        });

        let due = {
            let mut unflushed = self.unflushed.lock();
            *unflushed += 1;
            *unflushed >= self.flush_every
        };

        if due {
            self.save()?;
        }
        Ok(())
    }

    fn save(&self) -> Result<()> {
        let rows = self.rows.lock();
        if rows.is_empty() {
            return Ok(());
        }

        let dir = self.experiment.ensure()?;
        Self::write_rows(&dir.join(METRICS_FILE), &rows)?;
        *self.unflushed.lock() = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn metrics(pairs: &[(&str, f64)]) -> Metrics {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_header_is_union_of_keys() {
        let tmp = TempDir::new().unwrap();
        let logger = CsvLogger::new(tmp.path());

        logger.log_metrics(&metrics(&[("loss", 0.5)]), 0).unwrap();
        logger.log_metrics(&metrics(&[("loss", 0.25), ("acc", 0.75)]), 1).unwrap();
        logger.save().unwrap();

        let content = fs::read_to_string(logger.metrics_path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, vec!["step,acc,loss", "0,,0.5", "1,0.75,0.25"]);
    }

    #[test]
    fn test_nothing_written_before_first_row() {
        let tmp = TempDir::new().unwrap();
        let logger = CsvLogger::new(tmp.path());
        logger.save().unwrap();
        assert!(!tmp.path().join("lightning_logs").exists());
    }

    #[test]
    fn test_flushes_automatically() {
        let tmp = TempDir::new().unwrap();
        let logger = CsvLogger::new(tmp.path()).with_flush_every(2);

        logger.log_metrics(&metrics(&[("loss", 1.0)]), 0).unwrap();
        assert!(!logger.metrics_path().exists());
        logger.log_metrics(&metrics(&[("loss", 0.5)]), 1).unwrap();
        assert!(logger.metrics_path().exists());
    }

    #[test]
    fn test_hparams_yaml() {
        let tmp = TempDir::new().unwrap();
        let logger = CsvLogger::new(tmp.path()).with_name("exp").with_version(3u32);
        logger
            .log_hyperparams(&serde_json::json!({"lr": 0.1, "layers": 2}))
            .unwrap();

        let path = tmp.path().join("exp").join("version_3").join(HPARAMS_FILE);
        let parsed: Value = serde_yaml::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(parsed["layers"], 2);
    }

    #[test]
    fn test_zero_flush_interval_rejected() {
        let logger = CsvLogger::new("/tmp").with_flush_every(0);
        assert!(logger.validate().is_err());
    }

    #[test]
    fn test_metric_names_are_quoted() {
        let tmp = TempDir::new().unwrap();
        let logger = CsvLogger::new(tmp.path());

        logger
            .log_metrics(&metrics(&[("acc,top1", 0.5), ("say \"hi\"", 1.0)]), 0)
            .unwrap();
        logger.save().unwrap();

        let content = fs::read_to_string(logger.metrics_path()).unwrap();
        assert_eq!(content.lines().next(), Some("step,\"acc,top1\",\"say \"\"hi\"\"\""));

        let mut reader = csv::Reader::from_path(logger.metrics_path()).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.iter().collect::<Vec<_>>(), vec!["step", "acc,top1", "say \"hi\""]);
        let row = reader.records().next().unwrap().unwrap();
        assert_eq!(row.len(), headers.len());
        assert_eq!(&row[1], "0.5");
    }

    #[test]
    fn test_unwritable_metrics_file_is_logger_error() {
        let tmp = TempDir::new().unwrap();
        let logger = CsvLogger::new(tmp.path());
        fs::create_dir_all(logger.metrics_path()).unwrap();

        logger.log_metrics(&metrics(&[("loss", 1.0)]), 0).unwrap();
        assert!(matches!(logger.save(), Err(Error::Logger(_))));
    }
}
