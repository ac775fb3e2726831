//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use trainkit::{FitContext, Result, StepOutput, Trainer, TrainingModule};

/// Model that records the log directory it sees in every step
pub struct DirProbe {
    pub batches: usize,
    pub loss: f64,
    pub seen_log_dirs: Vec<PathBuf>,
}

impl DirProbe {
    pub fn new() -> Self {
        Self {
            batches: 4,
            loss: 0.5,
            seen_log_dirs: Vec::new(),
        }
    }
}

impl TrainingModule for DirProbe {
    type Batch = usize;

    fn train_batches(&mut self) -> Result<Vec<usize>> {
        Ok((0..self.batches).collect())
    }

    fn training_step(&mut self, ctx: &FitContext<'_>, _batch: &usize, _batch_idx: usize) -> Result<StepOutput> {
        self.seen_log_dirs.push(ctx.log_dir().to_path_buf());
        Ok(StepOutput::new(self.loss))
    }

    fn hparams(&self) -> Value {
        json!({ "batches": self.batches, "loss": self.loss })
    }

    fn state_dict(&self) -> Value {
        json!({ "weights": [0.1, 0.2] })
    }
}

/// Check `expected` before fit, in every step and after fit
pub fn assert_log_dir_stable(trainer: &mut Trainer, expected: &Path) {
    assert_eq!(trainer.log_dir(), expected, "log_dir before fit");

    let mut model = DirProbe::new();
    trainer.fit(&mut model).unwrap();

    assert!(!model.seen_log_dirs.is_empty());
    for seen in &model.seen_log_dirs {
        assert_eq!(seen, expected, "log_dir during fit");
    }
    assert_eq!(trainer.log_dir(), expected, "log_dir after fit");
}
