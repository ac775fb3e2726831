//! Trainer orchestration
//!
//! The [`Trainer`] owns the run configuration, the optional experiment logger,
//! the optional checkpoint callback and any user callbacks. Its
//! [`log_dir`](Trainer::log_dir) is derived from the logger alone and stays
//! the same before, during and after [`fit`](Trainer::fit).

pub mod context;
pub mod state;

pub use context::FitContext;
pub use state::{TrainingResult, TrainingState, TrainingStatus};

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::callbacks::{Callback, ModelCheckpoint};
use crate::config::{LoggerConfig, TrainerConfig};
use crate::error::{Error, Result};
use crate::loggers::{Logger, Metrics, RunOutcome};
use crate::module::TrainingModule;
use crate::paths;

/// Drives a [`TrainingModule`] through a fit
pub struct Trainer {
    config: TrainerConfig,
    default_root_dir: PathBuf,
    logger: Option<Box<dyn Logger>>,
    checkpoint_callback: Option<ModelCheckpoint>,
    callbacks: Vec<Box<dyn Callback>>,
    state: TrainingState,
}

impl std::fmt::Debug for Trainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trainer")
            .field("default_root_dir", &self.default_root_dir)
            .field("logger", &self.logger.as_ref().map(|l| l.name()))
            .field("checkpoint_callback", &self.checkpoint_callback.is_some())
            .field("callbacks", &self.callbacks.len())
            .field("state", &self.state)
            .finish()
    }
}

enum LoggerChoice {
    FromConfig,
    Disabled,
    Custom(Box<dyn Logger>),
}

enum CheckpointChoice {
    FromConfig,
    Custom(ModelCheckpoint),
}

/// Builder for [`Trainer`]
pub struct TrainerBuilder {
    config: TrainerConfig,
    logger: LoggerChoice,
    checkpoint: CheckpointChoice,
    callbacks: Vec<Box<dyn Callback>>,
}

impl Default for TrainerBuilder {
    fn default() -> Self {
        Self {
            config: TrainerConfig::default(),
            logger: LoggerChoice::FromConfig,
            checkpoint: CheckpointChoice::FromConfig,
            callbacks: Vec::new(),
        }
    }
}

impl TrainerBuilder {
    /// Replace the whole configuration
    pub fn config(mut self, config: TrainerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn default_root_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.default_root_dir = Some(dir.into());
        self
    }

    pub fn weights_save_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.weights_save_path = Some(dir.into());
        self
    }

    pub fn max_steps(mut self, steps: u64) -> Self {
        self.config.max_steps = Some(steps);
        self
    }

    pub fn max_epochs(mut self, epochs: usize) -> Self {
        self.config.max_epochs = Some(epochs);
        self
    }

    pub fn log_every_n_steps(mut self, steps: u64) -> Self {
        self.config.log_every_n_steps = steps;
        self
    }

    pub fn terminate_on_nan(mut self, enabled: bool) -> Self {
        self.config.terminate_on_nan = enabled;
        self
    }

    /// Attach a custom logger instead of the configured one
    pub fn logger(mut self, logger: impl Logger + 'static) -> Self {
        self.logger = LoggerChoice::Custom(Box::new(logger));
        self
    }

    /// Run without a logger; the root directory becomes the log directory
    pub fn no_logger(mut self) -> Self {
        self.config.logger = LoggerConfig::Disabled;
        self.logger = LoggerChoice::Disabled;
        self
    }

    /// Use a custom checkpoint callback instead of the configured one
    pub fn checkpoint_callback(mut self, checkpoint: ModelCheckpoint) -> Self {
        self.config.checkpointing.enabled = true;
        self.checkpoint = CheckpointChoice::Custom(checkpoint);
        self
    }

    /// Disable checkpointing
    pub fn no_checkpoint(mut self) -> Self {
        self.config.checkpointing.enabled = false;
        self
    }

    pub fn callback(mut self, callback: impl Callback + 'static) -> Self {
        self.callbacks.push(Box::new(callback));
        self
    }

    pub fn build(self) -> Result<Trainer> {
        let TrainerBuilder {
            config,
            logger,
            checkpoint,
            callbacks,
        } = self;

        config.validate()?;

        let default_root_dir = match &config.default_root_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()?,
        };

        let logger = match logger {
            LoggerChoice::FromConfig => config.logger.build(&default_root_dir),
            LoggerChoice::Disabled => None,
            LoggerChoice::Custom(logger) => Some(logger),
        };
        if let Some(logger) = &logger {
            logger.validate()?;
        }

        let checkpoint_callback = match (config.checkpointing.enabled, checkpoint) {
            (false, CheckpointChoice::Custom(_)) => {
                return Err(Error::misconfiguration(
                    "A checkpoint callback was given but checkpointing is disabled",
                ))
            }
            (false, CheckpointChoice::FromConfig) => None,
            (true, CheckpointChoice::FromConfig) => {
                Some(ModelCheckpoint::from_config(&config.checkpointing)?)
            }
            (true, CheckpointChoice::Custom(checkpoint)) => {
                checkpoint.validate()?;
                Some(checkpoint)
            }
        };

        debug!(
            "Trainer built: root={}, logger={}, checkpointing={}",
            default_root_dir.display(),
            logger.as_ref().map_or_else(|| "none".to_string(), |l| l.name()),
            checkpoint_callback.is_some()
        );

        Ok(Trainer {
            config,
            default_root_dir,
            logger,
            checkpoint_callback,
            callbacks,
            state: TrainingState::new(),
        })
    }
}

impl Trainer {
    /// Create a trainer from a configuration
    pub fn new(config: TrainerConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    pub fn builder() -> TrainerBuilder {
        TrainerBuilder::default()
    }

    /// Canonical log directory of the run.
    ///
    /// `save_dir/name/version_N` of the logger, or the root directory when
    /// there is no logger. Checkpoint settings never change it.
    pub fn log_dir(&self) -> PathBuf {
        paths::resolve_log_dir(&self.default_root_dir, self.logger.as_deref())
    }

    /// Directory the checkpoint callback writes into, `None` when checkpointing is off
    pub fn checkpoint_dir(&self) -> Option<PathBuf> {
        let checkpoint = self.checkpoint_callback.as_ref()?;
        Some(match checkpoint.dirpath() {
            Some(dir) => dir.to_path_buf(),
            None => paths::resolve_checkpoint_dir(
                &self.default_root_dir,
                self.weights_save_path(),
                self.logger.as_deref(),
            ),
        })
    }

    pub fn default_root_dir(&self) -> &Path {
        &self.default_root_dir
    }

    pub fn weights_save_path(&self) -> Option<&Path> {
        self.config.weights_save_path.as_deref()
    }

    pub fn logger(&self) -> Option<&dyn Logger> {
        self.logger.as_deref()
    }

    pub fn checkpoint_callback(&self) -> Option<&ModelCheckpoint> {
        self.checkpoint_callback.as_ref()
    }

    pub fn state(&self) -> &TrainingState {
        &self.state
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Train `model` until `max_steps` or the epoch limit is reached
    pub fn fit<M: TrainingModule>(&mut self, model: &mut M) -> Result<TrainingResult> {
        let log_dir = self.log_dir();
        info!("Starting fit, log directory {}", log_dir.display());

        self.state.start();
        let started = Instant::now();

        let outcome = self.run_fit(model, &log_dir);
        let finalized = self.finalize_logger(if outcome.is_ok() {
            RunOutcome::Success
        } else {
            RunOutcome::Failed
        });

        let outcome = match (outcome, finalized) {
            (Ok(()), finalized) => finalized,
            (Err(e), Err(finalize_error)) => {
                warn!("Logger finalize failed: {}", finalize_error);
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
        };

        if let Err(e) = outcome {
            error!("Training failed: {}", e);
            self.state.status = TrainingStatus::Failed {
                error: e.to_string(),
            };
            return Err(e);
        }

        self.state.status = TrainingStatus::Completed;
        let result = TrainingResult {
            global_step: self.state.global_step,
            epochs_completed: self.state.epochs_completed,
            last_loss: self.state.last_loss,
            best_model_path: self
                .checkpoint_callback
                .as_ref()
                .and_then(|c| c.best_model_path().map(Path::to_path_buf)),
            log_dir,
            duration: started.elapsed(),
        };

        info!(
            "Training completed in {:?}: {} steps over {} epochs",
            result.duration, result.global_step, result.epochs_completed
        );
        Ok(result)
    }

    fn run_fit<M: TrainingModule>(&mut self, model: &mut M, log_dir: &Path) -> Result<()> {
        let Trainer {
            config,
            default_root_dir,
            logger,
            checkpoint_callback,
            callbacks,
            state,
        } = self;

        let config: &TrainerConfig = config;
        let root: &Path = default_root_dir;
        let logger = logger.as_deref();
        let weights = config.weights_save_path.as_deref();
        let max_steps = config.max_steps;
        let ctx_at = move |epoch: usize, global_step: u64| {
            FitContext::new(log_dir, root, weights, logger, epoch, global_step, max_steps)
        };

        if let Some(logger) = logger {
            let hparams = model.hparams();
            if !hparams.is_null() {
                logger.log_hyperparams(&hparams)?;
            }
        }

        let ctx = ctx_at(0, 0);
        for callback in all_callbacks(callbacks, checkpoint_callback) {
            debug!("on_fit_start: {}", callback.name());
            callback.on_fit_start(&ctx)?;
        }

        let max_epochs = config.effective_max_epochs();
        for epoch in 0..max_epochs {
            if reached(max_steps, state.global_step) {
                break;
            }
            state.epoch = epoch;
            debug!("Starting epoch {}", epoch + 1);

            let batches = model.train_batches()?;
            if batches.is_empty() {
                warn!("Epoch {} produced no batches, stopping", epoch + 1);
                break;
            }

            let mut epoch_metrics = Metrics::new();
            for (batch_idx, batch) in batches.iter().enumerate() {
                if reached(max_steps, state.global_step) {
                    break;
                }

                let step = state.global_step;
                let output = model.training_step(&ctx_at(epoch, step), batch, batch_idx)?;
                if config.terminate_on_nan && !output.loss.is_finite() {
                    return Err(Error::model(format!(
                        "Loss is {} at epoch {} step {}",
                        output.loss, epoch, step
                    )));
                }

                let metrics = output.logged_metrics(epoch);
                if let Some(logger) = logger {
                    if (step + 1) % config.log_every_n_steps == 0 {
                        debug!("Logging {} metrics at step {}", metrics.len(), step);
                        logger.log_metrics(&metrics, step)?;
                    }
                }

                state.global_step += 1;
                state.last_loss = Some(output.loss);

                let ctx = ctx_at(epoch, state.global_step);
                for callback in all_callbacks(callbacks, checkpoint_callback) {
                    callback.on_train_batch_end(&ctx, &output)?;
                }
                epoch_metrics = metrics;
            }

            let ctx = ctx_at(epoch, state.global_step);
            let model_state = model.state_dict();
            for callback in all_callbacks(callbacks, checkpoint_callback) {
                callback.on_train_epoch_end(&ctx, &epoch_metrics, &model_state)?;
            }
            state.epochs_completed += 1;

            info!(
                "Epoch {} completed - Loss: {}",
                epoch + 1,
                state
                    .last_loss
                    .map_or_else(|| "n/a".to_string(), |l| format!("{:.4}", l))
            );
        }

        if reached(max_steps, state.global_step) {
            info!("Maximum steps reached: {}", state.global_step);
        }

        let ctx = ctx_at(state.epoch, state.global_step);
        for callback in all_callbacks(callbacks, checkpoint_callback) {
            debug!("on_fit_end: {}", callback.name());
            callback.on_fit_end(&ctx)?;
        }

        Ok(())
    }

    fn finalize_logger(&self, outcome: RunOutcome) -> Result<()> {
        match &self.logger {
            Some(logger) => {
                debug!("Finalizing logger {} ({})", logger.name(), outcome.as_str());
                logger.finalize(outcome)
            }
            None => Ok(()),
        }
    }
}

/// User callbacks first, then the checkpoint callback
fn all_callbacks<'a>(
    callbacks: &'a mut [Box<dyn Callback>],
    checkpoint: &'a mut Option<ModelCheckpoint>,
) -> impl Iterator<Item = &'a mut (dyn Callback + 'static)> {
    callbacks
        .iter_mut()
        .map(|c| &mut **c)
        .chain(checkpoint.iter_mut().map(|c| c as &mut (dyn Callback + 'static)))
}

fn reached(max_steps: Option<u64>, global_step: u64) -> bool {
    max_steps.map_or(false, |max| global_step >= max)
}
