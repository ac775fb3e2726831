//! Several loggers behind one [`Logger`]

use std::path::Path;

use serde_json::Value;
use tracing::warn;

use super::{Logger, Metrics, RunOutcome, Version};
use crate::error::{Error, Result};

/// Forwards every call to a list of loggers.
///
/// The collection has no save directory of its own. Its name joins the member
/// names with `_` and its version is the label `version_<v1>_<v2>...`, so its
/// `log_dir` is `root/<a>_<b>/version_<v1>_<v2>`.
pub struct LoggerCollection {
    loggers: Vec<Box<dyn Logger>>,
}

impl LoggerCollection {
    pub fn new(loggers: Vec<Box<dyn Logger>>) -> Self {
        Self { loggers }
    }

    pub fn push(&mut self, logger: Box<dyn Logger>) {
        self.loggers.push(logger);
    }

    pub fn len(&self) -> usize {
        self.loggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loggers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Logger> {
        self.loggers.iter().map(|logger| logger.as_ref())
    }

    /// Run `op` on every member, returning the first error after all ran
    fn fan_out(&self, mut op: impl FnMut(&dyn Logger) -> Result<()>) -> Result<()> {
        let mut first_error = None;
        for logger in self.iter() {
            if let Err(e) = op(logger) {
                warn!("Logger '{}' failed: {}", logger.name(), e);
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl Logger for LoggerCollection {
    fn name(&self) -> String {
        self.iter().map(|l| l.name()).collect::<Vec<_>>().join("_")
    }

    fn version(&self) -> Version {
        let joined = self
            .iter()
            .map(|l| l.version().to_string())
            .collect::<Vec<_>>()
            .join("_");
        Version::Label(format!("version_{joined}"))
    }

    fn save_dir(&self) -> Option<&Path> {
        None
    }

    fn validate(&self) -> Result<()> {
        if self.loggers.is_empty() {
            return Err(Error::config("Logger collection must contain at least one logger"));
        }
        self.iter().try_for_each(|logger| logger.validate())
    }

    fn log_hyperparams(&self, params: &Value) -> Result<()> {
        self.fan_out(|logger| logger.log_hyperparams(params))
    }

    fn log_metrics(&self, metrics: &Metrics, step: u64) -> Result<()> {
        self.fan_out(|logger| logger.log_metrics(metrics, step))
    }

    fn save(&self) -> Result<()> {
        self.fan_out(|logger| logger.save())
    }

    fn finalize(&self, outcome: RunOutcome) -> Result<()> {
        self.fan_out(|logger| logger.finalize(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loggers::{CsvLogger, JsonLogger};
    use tempfile::TempDir;

    #[test]
    fn test_collection_naming() {
        let tmp = TempDir::new().unwrap();
        let collection = LoggerCollection::new(vec![
            Box::new(CsvLogger::new(tmp.path()).with_name("csv")) as Box<dyn Logger>,
            Box::new(JsonLogger::new(tmp.path()).with_name("json").with_version(2u32)),
        ]);

        assert_eq!(collection.name(), "csv_json");
        assert_eq!(collection.version(), Version::Label("version_0_2".to_string()));
        assert_eq!(
            collection.log_dir(Path::new("/root_dir")),
            Path::new("/root_dir").join("csv_json").join("version_0_2")
        );
    }

    #[test]
    fn test_collection_fans_out() {
        let tmp = TempDir::new().unwrap();
        let collection = LoggerCollection::new(vec![
            Box::new(CsvLogger::new(tmp.path()).with_name("csv")) as Box<dyn Logger>,
            Box::new(JsonLogger::new(tmp.path()).with_name("json")),
        ]);

        let mut metrics = Metrics::new();
        metrics.insert("loss".to_string(), 0.1);
        collection.log_metrics(&metrics, 0).unwrap();
        collection.finalize(RunOutcome::Success).unwrap();

        assert!(tmp.path().join("csv/version_0/metrics.csv").exists());
        assert!(tmp.path().join("json/version_0/metrics.jsonl").exists());
    }

    #[test]
    fn test_empty_collection_is_invalid() {
        assert!(LoggerCollection::new(Vec::new()).validate().is_err());
    }
}
