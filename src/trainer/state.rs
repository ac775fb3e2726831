//! Training state tracking

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Training state tracking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingState {
    /// Current epoch
    pub epoch: usize,

    /// Global step across all epochs
    pub global_step: u64,

    /// Number of fully completed epochs
    pub epochs_completed: usize,

    /// Training start time
    pub start_time: DateTime<Utc>,

    /// Training status
    pub status: TrainingStatus,

    /// Loss of the most recent step
    pub last_loss: Option<f64>,
}

/// Training status enumeration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum TrainingStatus {
    NotStarted,
    Running,
    Completed,
    Failed { error: String },
}

/// Summary returned by a successful `fit`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingResult {
    /// Total training steps
    pub global_step: u64,

    pub epochs_completed: usize,

    pub last_loss: Option<f64>,

    /// Best checkpoint, when a checkpoint callback ranked one
    pub best_model_path: Option<PathBuf>,

    /// Log directory of the run
    pub log_dir: PathBuf,

    /// Training duration
    pub duration: Duration,
}

impl TrainingState {
    /// Create new training state
    pub fn new() -> Self {
        Self {
            epoch: 0,
            global_step: 0,
            epochs_completed: 0,
            start_time: Utc::now(),
            status: TrainingStatus::NotStarted,
            last_loss: None,
        }
    }

    /// Reset counters for a new run
    pub fn start(&mut self) {
        *self = Self::new();
        self.status = TrainingStatus::Running;
    }
}

impl Default for TrainingState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_resets_counters() {
        let mut state = TrainingState::new();
        state.global_step = 12;
        state.epochs_completed = 3;
        state.status = TrainingStatus::Completed;

        state.start();
        assert_eq!(state.global_step, 0);
        assert_eq!(state.epochs_completed, 0);
        assert_eq!(state.status, TrainingStatus::Running);
    }
}
