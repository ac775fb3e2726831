//! trainkit - training run orchestration with predictable output directories
//!
//! A [`Trainer`] drives a [`TrainingModule`] through a fit while an optional
//! experiment [`Logger`] and an optional [`ModelCheckpoint`] callback write
//! their artifacts. Every run has one canonical log directory:
//!
//! - with a logger: `<save_dir or root>/<name>/version_<n>`
//! - without a logger: the root directory itself
//!
//! Checkpoint settings never change the log directory.
//!
//! ```no_run
//! use trainkit::Trainer;
//!
//! let trainer = Trainer::builder()
//!     .default_root_dir("/tmp/runs")
//!     .max_steps(2)
//!     .build()?;
//! assert_eq!(
//!     trainer.log_dir(),
//!     std::path::Path::new("/tmp/runs/lightning_logs/version_0")
//! );
//! # Ok::<(), trainkit::Error>(())
//! ```

#![warn(rustdoc::broken_intra_doc_links)]

pub mod callbacks;
pub mod config;
pub mod error;
pub mod loggers;
pub mod logging;
pub mod module;
pub mod paths;
pub mod trainer;

// Re-exports
pub use callbacks::{Callback, CheckpointRecord, ModelCheckpoint, MonitorMode};
pub use config::{CheckpointingConfig, LoggerConfig, TrainerConfig};
pub use error::{Error, Result};
pub use loggers::{CsvLogger, JsonLogger, Logger, LoggerCollection, Metrics, RunOutcome, Version};
pub use module::{StepOutput, TrainingModule};
pub use trainer::{FitContext, Trainer, TrainerBuilder, TrainingResult, TrainingStatus};
