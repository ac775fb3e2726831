//! Training callbacks
//!
//! Callbacks observe a fit through [`FitContext`] snapshots. Every hook has a
//! no-op default so implementations only override what they need.

pub mod checkpoint;

pub use checkpoint::{load_checkpoint, CheckpointRecord, ModelCheckpoint, MonitorMode};

use serde_json::Value;

use crate::error::Result;
use crate::loggers::Metrics;
use crate::module::StepOutput;
use crate::trainer::FitContext;

/// Trait for training callbacks
pub trait Callback: Send {
    /// Callback name, used in logs
    fn name(&self) -> &str;

    fn on_fit_start(&mut self, ctx: &FitContext<'_>) -> Result<()> {
        let _ = ctx;
        Ok(())
    }

    fn on_train_batch_end(&mut self, ctx: &FitContext<'_>, output: &StepOutput) -> Result<()> {
        let _ = (ctx, output);
        Ok(())
    }

    /// `metrics` are the metrics of the last step of the epoch, `model_state`
    /// is the module's `state_dict`
    fn on_train_epoch_end(
        &mut self,
        ctx: &FitContext<'_>,
        metrics: &Metrics,
        model_state: &Value,
    ) -> Result<()> {
        let _ = (ctx, metrics, model_state);
        Ok(())
    }

    fn on_fit_end(&mut self, ctx: &FitContext<'_>) -> Result<()> {
        let _ = ctx;
        Ok(())
    }
}
