//! Read-only view of a running fit handed to modules and callbacks

use std::path::Path;

use crate::loggers::Logger;

/// Snapshot of the trainer at the current point of `fit`.
#[derive(Clone, Copy)]
pub struct FitContext<'a> {
    log_dir: &'a Path,
    default_root_dir: &'a Path,
    weights_save_path: Option<&'a Path>,
    logger: Option<&'a dyn Logger>,
    epoch: usize,
    global_step: u64,
    max_steps: Option<u64>,
}

impl<'a> FitContext<'a> {
    pub(crate) fn new(
        log_dir: &'a Path,
        default_root_dir: &'a Path,
        weights_save_path: Option<&'a Path>,
        logger: Option<&'a dyn Logger>,
        epoch: usize,
        global_step: u64,
        max_steps: Option<u64>,
    ) -> Self {
        Self {
            log_dir,
            default_root_dir,
            weights_save_path,
            logger,
            epoch,
            global_step,
            max_steps,
        }
    }

    /// Canonical log directory of the run
    pub fn log_dir(&self) -> &'a Path {
        self.log_dir
    }

    pub fn default_root_dir(&self) -> &'a Path {
        self.default_root_dir
    }

    pub fn weights_save_path(&self) -> Option<&'a Path> {
        self.weights_save_path
    }

    pub fn logger(&self) -> Option<&'a dyn Logger> {
        self.logger
    }

    /// Current epoch, starting at 0
    pub fn epoch(&self) -> usize {
        self.epoch
    }

    /// Number of steps completed before this point
    pub fn global_step(&self) -> u64 {
        self.global_step
    }

    pub fn max_steps(&self) -> Option<u64> {
        self.max_steps
    }
}
