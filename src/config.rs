//! Trainer configuration
//!
//! Plain serde structures describing a run: where it writes, how long it
//! trains, which logger is attached and how checkpointing behaves. Files are
//! read as JSON when the extension is `.json` and as YAML otherwise.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::callbacks::{ModelCheckpoint, MonitorMode};
use crate::error::{Error, Result};
use crate::loggers::{
    csv::DEFAULT_FLUSH_EVERY, CsvLogger, ExperimentDir, JsonLogger, Logger, Version,
    DEFAULT_LOGGER_NAME,
};

/// Epoch limit used when neither `max_epochs` nor `max_steps` is set
pub const DEFAULT_MAX_EPOCHS: usize = 1000;

/// Main trainer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Root output directory. Defaults to the working directory.
    pub default_root_dir: Option<PathBuf>,

    /// Where checkpoints go when it should differ from the root directory
    pub weights_save_path: Option<PathBuf>,

    /// Maximum number of epochs
    pub max_epochs: Option<usize>,

    /// Maximum number of training steps
    pub max_steps: Option<u64>,

    /// Send metrics to the logger every N steps
    pub log_every_n_steps: u64,

    /// Abort the run on a NaN or infinite loss
    pub terminate_on_nan: bool,

    /// Experiment logger
    pub logger: LoggerConfig,

    /// Checkpointing configuration
    pub checkpointing: CheckpointingConfig,
}

/// Experiment logger selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoggerConfig {
    /// No logger; the root directory is the log directory
    Disabled,

    /// CSV metrics plus YAML hyperparameters
    Csv {
        #[serde(default)]
        save_dir: Option<PathBuf>,
        #[serde(default = "default_logger_name")]
        name: String,
        #[serde(default)]
        version: Option<Version>,
        #[serde(default = "default_flush_every")]
        flush_every: usize,
    },

    /// JSON lines metrics plus JSON hyperparameters
    Json {
        #[serde(default)]
        save_dir: Option<PathBuf>,
        #[serde(default = "default_logger_name")]
        name: String,
        #[serde(default)]
        version: Option<Version>,
    },
}

fn default_logger_name() -> String {
    DEFAULT_LOGGER_NAME.to_string()
}

fn default_flush_every() -> usize {
    DEFAULT_FLUSH_EVERY
}

/// Checkpointing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointingConfig {
    /// Attach a checkpoint callback
    pub enabled: bool,

    /// Fixed output directory; resolved from the logger when unset
    pub dirpath: Option<PathBuf>,

    /// Filename template
    pub filename: String,

    /// Metric used to rank checkpoints
    pub monitor: Option<String>,

    /// Whether lower or higher monitored values are better
    pub mode: MonitorMode,

    /// Number of checkpoints to keep; `None` keeps all
    pub save_top_k: Option<usize>,

    /// Also write `last.ckpt`
    pub save_last: bool,

    /// Save every N epochs
    pub every_n_epochs: usize,
}

impl TrainerConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;

        let config = if is_json(path.as_ref()) {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };

        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = if is_json(path.as_ref()) {
            serde_json::to_string_pretty(self)?
        } else {
            serde_yaml::to_string(self)?
        };

        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.log_every_n_steps == 0 {
            return Err(Error::config("log_every_n_steps must be greater than 0"));
        }

        if self.max_epochs == Some(0) {
            return Err(Error::config("max_epochs must be greater than 0"));
        }

        self.logger.validate()?;

        if self.checkpointing.enabled {
            ModelCheckpoint::from_config(&self.checkpointing)?;
        }

        Ok(())
    }

    /// Epoch limit actually used by `fit`
    pub fn effective_max_epochs(&self) -> usize {
        match (self.max_epochs, self.max_steps) {
            (Some(epochs), _) => epochs,
            (None, Some(_)) => usize::MAX,
            (None, None) => DEFAULT_MAX_EPOCHS,
        }
    }
}

impl LoggerConfig {
    /// Default CSV logger settings
    pub fn csv() -> Self {
        LoggerConfig::Csv {
            save_dir: None,
            name: default_logger_name(),
            version: None,
            flush_every: DEFAULT_FLUSH_EVERY,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, LoggerConfig::Disabled)
    }

    /// Instantiate the logger; `root` stands in for an unset `save_dir`
    pub fn build(&self, root: &Path) -> Option<Box<dyn Logger>> {
        match self {
            LoggerConfig::Disabled => None,
            LoggerConfig::Csv {
                save_dir,
                name,
                version,
                flush_every,
            } => {
                let mut logger = CsvLogger::new(save_dir.clone().unwrap_or_else(|| root.to_path_buf()))
                    .with_name(name.clone())
                    .with_flush_every(*flush_every);
                if let Some(version) = version {
                    logger = logger.with_version(version.clone());
                }
                Some(Box::new(logger))
            }
            LoggerConfig::Json {
                save_dir,
                name,
                version,
            } => {
                let mut logger = JsonLogger::new(save_dir.clone().unwrap_or_else(|| root.to_path_buf()))
                    .with_name(name.clone());
                if let Some(version) = version {
                    logger = logger.with_version(version.clone());
                }
                Some(Box::new(logger))
            }
        }
    }

    fn validate(&self) -> Result<()> {
        let (name, version) = match self {
            LoggerConfig::Disabled => return Ok(()),
            LoggerConfig::Csv {
                name,
                version,
                flush_every,
                ..
            } => {
                if *flush_every == 0 {
                    return Err(Error::config("CSV logger flush interval must be greater than 0"));
                }
                (name, version)
            }
            LoggerConfig::Json { name, version, .. } => (name, version),
        };

        let mut experiment = ExperimentDir::new(".", name.clone());
        if let Some(version) = version {
            experiment = experiment.with_version(version.clone());
        }
        experiment.validate()
    }
}

fn is_json(path: &Path) -> bool {
    path.extension().and_then(|s| s.to_str()) == Some("json")
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            default_root_dir: None,
            weights_save_path: None,
            max_epochs: None,
            max_steps: None,
            log_every_n_steps: 50,
            terminate_on_nan: false,
            logger: LoggerConfig::default(),
            checkpointing: CheckpointingConfig::default(),
        }
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self::csv()
    }
}

impl Default for CheckpointingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dirpath: None,
            filename: crate::callbacks::checkpoint::DEFAULT_FILENAME.to_string(),
            monitor: None,
            mode: MonitorMode::Min,
            save_top_k: Some(1),
            save_last: false,
            every_n_epochs: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = TrainerConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.logger.is_enabled());
        assert!(config.checkpointing.enabled);
        assert_eq!(config.effective_max_epochs(), DEFAULT_MAX_EPOCHS);
    }

    #[test]
    fn test_config_file_operations() {
        let dir = TempDir::new().unwrap();
        let mut config = TrainerConfig::default();
        config.max_steps = Some(2);
        config.logger = LoggerConfig::Json {
            save_dir: Some(dir.path().join("logs")),
            name: "exp".to_string(),
            version: Some(Version::Label("baseline".to_string())),
        };

        let json_path = dir.path().join("trainer.json");
        config.to_file(&json_path).unwrap();
        let loaded = TrainerConfig::from_file(&json_path).unwrap();
        assert_eq!(loaded.max_steps, Some(2));
        assert_eq!(loaded.logger, config.logger);

        let yaml_path = dir.path().join("trainer.yaml");
        config.to_file(&yaml_path).unwrap();
        let loaded = TrainerConfig::from_file(&yaml_path).unwrap();
        assert_eq!(loaded.logger, config.logger);
        assert_eq!(loaded.checkpointing, config.checkpointing);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = r#"
max_steps: 2
logger:
  kind: csv
  name: custom_logs
checkpointing:
  enabled: false
"#;
        let config: TrainerConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.log_every_n_steps, 50);
        assert_eq!(config.logger, LoggerConfig::Csv {
            save_dir: None,
            name: "custom_logs".to_string(),
            version: None,
            flush_every: DEFAULT_FLUSH_EVERY,
        });
        assert!(!config.checkpointing.enabled);
        assert_eq!(config.checkpointing.filename, "{epoch}-{step}");
    }

    #[test]
    fn test_disabled_logger_yaml() {
        let config: TrainerConfig = serde_yaml::from_str("logger:\n  kind: disabled\n").unwrap();
        assert!(!config.logger.is_enabled());
        assert!(config.logger.build(Path::new("/tmp")).is_none());
    }

    #[test]
    fn test_config_validation() {
        let mut config = TrainerConfig::default();
        config.log_every_n_steps = 0;
        assert!(config.validate().is_err());

        config = TrainerConfig::default();
        config.max_epochs = Some(0);
        assert!(config.validate().is_err());

        config = TrainerConfig::default();
        config.logger = LoggerConfig::Csv {
            save_dir: None,
            name: String::new(),
            version: None,
            flush_every: 10,
        };
        assert!(config.validate().is_err());

        config = TrainerConfig::default();
        config.checkpointing.save_top_k = Some(2);
        assert!(matches!(config.validate(), Err(Error::Misconfiguration(_))));

        // Ignored while checkpointing is off.
        config.checkpointing.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_effective_max_epochs() {
        let mut config = TrainerConfig::default();
        config.max_steps = Some(10);
        assert_eq!(config.effective_max_epochs(), usize::MAX);
        config.max_epochs = Some(3);
        assert_eq!(config.effective_max_epochs(), 3);
    }
}
