//! User-facing training module trait

use serde_json::Value;

use crate::error::Result;
use crate::loggers::Metrics;
use crate::trainer::FitContext;

/// Result of a single training step
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutput {
    /// Step loss
    pub loss: f64,
    /// Extra metrics reported by the step
    pub metrics: Metrics,
}

impl StepOutput {
    pub fn new(loss: f64) -> Self {
        Self {
            loss,
            metrics: Metrics::new(),
        }
    }

    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }

    /// Metrics forwarded to loggers and callbacks: the step's own metrics plus
    /// `loss` and `epoch`
    pub fn logged_metrics(&self, epoch: usize) -> Metrics {
        let mut logged = self.metrics.clone();
        logged.insert("loss".to_string(), self.loss);
        logged.insert("epoch".to_string(), epoch as f64);
        logged
    }
}

/// A model the trainer can drive through `fit`.
///
/// The trainer only sequences calls; what a step computes is up to the
/// implementation.
pub trait TrainingModule {
    /// One unit of training data
    type Batch;

    /// Batches for the next epoch
    fn train_batches(&mut self) -> Result<Vec<Self::Batch>>;

    /// Run one training step
    fn training_step(
        &mut self,
        ctx: &FitContext<'_>,
        batch: &Self::Batch,
        batch_idx: usize,
    ) -> Result<StepOutput>;

    /// Hyperparameters sent to the logger when `fit` starts. `Null` skips logging.
    fn hparams(&self) -> Value {
        Value::Null
    }

    /// State stored in checkpoints
    fn state_dict(&self) -> Value {
        Value::Null
    }
}
