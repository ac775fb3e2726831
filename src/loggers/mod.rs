//! Experiment loggers
//!
//! A logger owns a versioned experiment directory (`save_dir/name/version_N`)
//! and receives hyperparameters and step metrics from the trainer. The
//! directory a logger reports is what the trainer exposes as its `log_dir`.
//!
//! Implementations provided here:
//!
//! - [`CsvLogger`]: buffered `metrics.csv` plus `hparams.yaml`
//! - [`JsonLogger`]: streaming `metrics.jsonl` plus `hparams.json`
//! - [`LoggerCollection`]: fans every call out to several loggers

pub mod collection;
pub mod csv;
pub mod experiment;
pub mod json;

pub use collection::LoggerCollection;
pub use self::csv::CsvLogger;
pub use experiment::ExperimentDir;
pub use json::JsonLogger;

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::paths::{self, VERSION_PREFIX};

/// Experiment name used when none is given
pub const DEFAULT_LOGGER_NAME: &str = "lightning_logs";

/// Metrics logged for a single step
pub type Metrics = BTreeMap<String, f64>;

/// Experiment version
///
/// Numbers render as `version_<n>` directories, labels are used verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Version {
    /// Numbered version, `version_<n>` on disk
    Number(u32),
    /// Free-form label used as the directory name as is
    Label(String),
}

impl Version {
    /// Directory name of this version
    pub fn dir_name(&self) -> String {
        match self {
            Version::Number(n) => format!("{VERSION_PREFIX}{n}"),
            Version::Label(label) => label.clone(),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::Number(n) => write!(f, "{n}"),
            Version::Label(label) => f.write_str(label),
        }
    }
}

impl From<u32> for Version {
    fn from(n: u32) -> Self {
        Version::Number(n)
    }
}

impl From<&str> for Version {
    fn from(label: &str) -> Self {
        Version::Label(label.to_string())
    }
}

impl From<String> for Version {
    fn from(label: String) -> Self {
        Version::Label(label)
    }
}

/// How a run ended, reported to loggers on finalisation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    Success,
    Failed,
}

impl RunOutcome {
    /// Lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Success => "success",
            RunOutcome::Failed => "failed",
        }
    }
}

/// Trait for experiment loggers
///
/// All methods take `&self`; implementations keep their mutable state behind
/// locks so a logger can be shared with the step context during `fit`.
pub trait Logger: Send + Sync {
    /// Experiment name, the first path component under the save directory
    fn name(&self) -> String;

    /// Experiment version. Must return the same value for the whole run.
    fn version(&self) -> Version;

    /// Directory experiments are stored under, if the logger has its own
    fn save_dir(&self) -> Option<&Path>;

    /// Versioned experiment directory, rooted at `root` when the logger has no
    /// save directory
    fn log_dir(&self, root: &Path) -> PathBuf {
        paths::versioned_dir(self.save_dir().unwrap_or(root), &self.name(), &self.version())
    }

    /// Check the logger settings before a run starts
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Record hyperparameters
    fn log_hyperparams(&self, params: &Value) -> Result<()>;

    /// Record metrics for a step
    fn log_metrics(&self, metrics: &Metrics, step: u64) -> Result<()>;

    /// Flush buffered data to disk
    fn save(&self) -> Result<()> {
        Ok(())
    }

    /// Called once when the run ends
    fn finalize(&self, outcome: RunOutcome) -> Result<()> {
        let _ = outcome;
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_dir_names() {
        assert_eq!(Version::Number(0).dir_name(), "version_0");
        assert_eq!(Version::from(7u32).dir_name(), "version_7");
        assert_eq!(Version::from("baseline").dir_name(), "baseline");
    }

    #[test]
    fn test_version_serde_is_untagged() {
        let n: Version = serde_json::from_str("3").unwrap();
        let label: Version = serde_json::from_str("\"ablation\"").unwrap();
        assert_eq!(n, Version::Number(3));
        assert_eq!(label, Version::Label("ablation".to_string()));
    }
}
