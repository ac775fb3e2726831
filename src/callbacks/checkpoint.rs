//! Model checkpointing callback
//!
//! Writes a JSON checkpoint record at the end of training epochs. Where the
//! records go is either fixed by `dirpath` or resolved once at fit start from
//! the trainer's root directory, weights save path and logger (see
//! [`paths::resolve_checkpoint_dir`]). Checkpointing never influences the
//! trainer's log directory.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::Callback;
use crate::config::CheckpointingConfig;
use crate::error::{Error, Result};
use crate::loggers::Metrics;
use crate::paths;
use crate::trainer::FitContext;

/// Checkpoint file extension
pub const CHECKPOINT_EXT: &str = ".ckpt";

/// File name of the rolling last checkpoint
pub const LAST_CHECKPOINT: &str = "last.ckpt";

/// Default filename template
pub const DEFAULT_FILENAME: &str = "{epoch}-{step}";

/// Whether a lower or a higher monitored value is better
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorMode {
    #[default]
    Min,
    Max,
}

impl MonitorMode {
    /// True when `candidate` beats `current`
    pub fn is_better(&self, candidate: f64, current: f64) -> bool {
        match self {
            MonitorMode::Min => candidate < current,
            MonitorMode::Max => candidate > current,
        }
    }

    /// NaN ranks as the worst possible score
    pub fn rank_score(&self, score: f64) -> f64 {
        match self {
            _ if !score.is_nan() => score,
            MonitorMode::Min => f64::INFINITY,
            MonitorMode::Max => f64::NEG_INFINITY,
        }
    }
}

/// Contents of a checkpoint file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub epoch: usize,
    pub global_step: u64,
    pub saved_at: DateTime<Utc>,
    pub monitor: Option<String>,
    pub score: Option<f64>,
    pub metrics: Metrics,
    pub state: Value,
}

/// Read a checkpoint written by [`ModelCheckpoint`]
pub fn load_checkpoint(path: impl AsRef<Path>) -> Result<CheckpointRecord> {
    let content = fs::read_to_string(path.as_ref())?;
    Ok(serde_json::from_str(&content)?)
}

/// Saves checkpoint records during training.
///
/// Without `monitor` and with the default `save_top_k` of one, every save
/// replaces the previous file. With `monitor`, the best `save_top_k` records
/// by `mode` are kept. `save_top_k = Some(0)` disables saving and `None`
/// keeps everything.
#[derive(Debug, Clone)]
pub struct ModelCheckpoint {
    dirpath: Option<PathBuf>,
    resolved_dir: Option<PathBuf>,
    filename: String,
    monitor: Option<String>,
    mode: MonitorMode,
    save_top_k: Option<usize>,
    save_last: bool,
    every_n_epochs: usize,

    best_k_models: Vec<(PathBuf, f64)>,
    saved: Vec<PathBuf>,
    best_model_path: Option<PathBuf>,
    best_model_score: Option<f64>,
    last_model_path: Option<PathBuf>,
}

impl Default for ModelCheckpoint {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelCheckpoint {
    pub fn new() -> Self {
        Self {
            dirpath: None,
            resolved_dir: None,
            filename: DEFAULT_FILENAME.to_string(),
            monitor: None,
            mode: MonitorMode::Min,
            save_top_k: Some(1),
            save_last: false,
            every_n_epochs: 1,
            best_k_models: Vec::new(),
            saved: Vec::new(),
            best_model_path: None,
            best_model_score: None,
            last_model_path: None,
        }
    }

    /// Build from the checkpointing section of a trainer config
    pub fn from_config(config: &CheckpointingConfig) -> Result<Self> {
        let mut checkpoint = Self::new()
            .with_filename(config.filename.clone())
            .with_save_top_k(config.save_top_k)
            .with_save_last(config.save_last)
            .with_every_n_epochs(config.every_n_epochs);
        checkpoint.dirpath = config.dirpath.clone();
        checkpoint.mode = config.mode;
        checkpoint.monitor = config.monitor.clone();
        checkpoint.validate()?;
        Ok(checkpoint)
    }

    /// Write checkpoints into `dirpath` instead of the resolved default
    pub fn with_dirpath(mut self, dirpath: impl Into<PathBuf>) -> Self {
        self.dirpath = Some(dirpath.into());
        self
    }

    pub fn with_filename(mut self, template: impl Into<String>) -> Self {
        self.filename = template.into();
        self
    }

    pub fn with_monitor(mut self, metric: impl Into<String>, mode: MonitorMode) -> Self {
        self.monitor = Some(metric.into());
        self.mode = mode;
        self
    }

    pub fn with_save_top_k(mut self, save_top_k: Option<usize>) -> Self {
        self.save_top_k = save_top_k;
        self
    }

    pub fn with_save_last(mut self, save_last: bool) -> Self {
        self.save_last = save_last;
        self
    }

    pub fn with_every_n_epochs(mut self, every_n_epochs: usize) -> Self {
        self.every_n_epochs = every_n_epochs;
        self
    }

    /// Check option combinations
    pub fn validate(&self) -> Result<()> {
        if self.every_n_epochs == 0 {
            return Err(Error::config("Checkpoint interval (every_n_epochs) must be greater than 0"));
        }

        if self.monitor.is_none() && matches!(self.save_top_k, Some(k) if k > 1) {
            return Err(Error::misconfiguration(format!(
                "ModelCheckpoint(save_top_k={}) requires a monitored metric",
                self.save_top_k.unwrap_or_default()
            )));
        }

        // Catches unbalanced braces in the template early.
        format_checkpoint_name(&self.filename, 0, 0, &Metrics::new())?;
        Ok(())
    }

    /// Directory checkpoints are written to, once known
    pub fn dirpath(&self) -> Option<&Path> {
        self.dirpath.as_deref().or(self.resolved_dir.as_deref())
    }

    pub fn monitor(&self) -> Option<&str> {
        self.monitor.as_deref()
    }

    pub fn best_model_path(&self) -> Option<&Path> {
        self.best_model_path.as_deref()
    }

    pub fn best_model_score(&self) -> Option<f64> {
        self.best_model_score
    }

    pub fn last_model_path(&self) -> Option<&Path> {
        self.last_model_path.as_deref()
    }

    /// Currently kept monitored checkpoints with their scores
    pub fn best_k_models(&self) -> &[(PathBuf, f64)] {
        &self.best_k_models
    }

    /// Fix the output directory from the trainer settings unless `dirpath` was given
    pub fn resolve_dir(&mut self, ctx: &FitContext<'_>) {
        if self.dirpath.is_some() {
            return;
        }
        let dir = paths::resolve_checkpoint_dir(
            ctx.default_root_dir(),
            ctx.weights_save_path(),
            ctx.logger(),
        );
        debug!("Checkpoint directory resolved to {}", dir.display());
        self.resolved_dir = Some(dir);
    }

    /// Save a record for the current point of training, honouring top-k rules
    pub fn save_checkpoint(
        &mut self,
        ctx: &FitContext<'_>,
        metrics: &Metrics,
        model_state: &Value,
    ) -> Result<()> {
        if self.save_top_k == Some(0) {
            return Ok(());
        }

        let dir = self
            .dirpath()
            .map(Path::to_path_buf)
            .ok_or_else(|| Error::checkpoint("Checkpoint directory has not been resolved"))?;

        let mode = self.mode;
        let score = match &self.monitor {
            Some(monitor) => Some(metrics.get(monitor).map(|s| mode.rank_score(*s)).ok_or_else(|| {
                Error::misconfiguration(format!(
                    "ModelCheckpoint(monitor='{}') not found in the logged metrics: {:?}",
                    monitor,
                    metrics.keys().collect::<Vec<_>>()
                ))
            })?),
            None => None,
        };

        let stem = format_checkpoint_name(&self.filename, ctx.epoch(), ctx.global_step(), metrics)?;
        let record = CheckpointRecord {
            epoch: ctx.epoch(),
            global_step: ctx.global_step(),
            saved_at: Utc::now(),
            monitor: self.monitor.clone(),
            score,
            metrics: metrics.clone(),
            state: model_state.clone(),
        };

        match score {
            Some(score) => self.save_monitored(&dir, &stem, &record, score)?,
            None => self.save_unmonitored(&dir, &stem, &record)?,
        }

        if self.save_last {
            let last = dir.join(LAST_CHECKPOINT);
            write_record(&last, &record)?;
            self.last_model_path = Some(last);
        }

        Ok(())
    }

    fn save_unmonitored(&mut self, dir: &Path, stem: &str, record: &CheckpointRecord) -> Result<()> {
        let replace_previous = self.save_top_k == Some(1);
        let previous = if replace_previous { self.saved.last().cloned() } else { None };

        let path = unique_path(dir, stem, previous.as_deref());
        write_record(&path, record)?;

        if replace_previous {
            self.saved.pop();
        }
        if let Some(previous) = previous.filter(|p| *p != path) {
            remove_checkpoint(&previous)?;
        }

        info!("Saved checkpoint {}", path.display());
        self.saved.push(path.clone());
        self.best_model_path = Some(path.clone());
        self.last_model_path = Some(path);
        Ok(())
    }

    fn save_monitored(
        &mut self,
        dir: &Path,
        stem: &str,
        record: &CheckpointRecord,
        score: f64,
    ) -> Result<()> {
        let mode = self.mode;
        let full = matches!(self.save_top_k, Some(k) if self.best_k_models.len() >= k);

        if full {
            let worst = self.worst_index().map(|i| self.best_k_models[i].1);
            if let Some(worst) = worst {
                if !mode.is_better(score, worst) {
                    debug!("Score {:.4} does not enter the top {:?}", score, self.save_top_k);
                    return Ok(());
                }
            }
        }

        let path = unique_path(dir, stem, None);
        write_record(&path, record)?;
        info!("Saved checkpoint {} (score {:.4})", path.display(), score);
        self.best_k_models.push((path.clone(), score));
        self.last_model_path = Some(path);

        if let Some(k) = self.save_top_k {
            while self.best_k_models.len() > k {
                if let Some(i) = self.worst_index() {
                    let (evicted, _) = self.best_k_models.remove(i);
                    remove_checkpoint(&evicted)?;
                }
            }
        }

        let best = self
            .best_k_models
            .iter()
            .fold(None::<&(PathBuf, f64)>, |best, entry| match best {
                Some(b) if !mode.is_better(entry.1, b.1) => Some(b),
                _ => Some(entry),
            })
            .cloned();
        if let Some((path, score)) = best {
            self.best_model_path = Some(path);
            self.best_model_score = Some(score);
        }

        Ok(())
    }

    fn worst_index(&self) -> Option<usize> {
        let mode = self.mode;
        self.best_k_models
            .iter()
            .enumerate()
            .fold(None::<(usize, f64)>, |worst, (i, (_, score))| match worst {
                Some((_, w)) if mode.is_better(w, *score) => Some((i, *score)),
                None => Some((i, *score)),
                keep => keep,
            })
            .map(|(i, _)| i)
    }
}

impl Callback for ModelCheckpoint {
    fn name(&self) -> &str {
        "model_checkpoint"
    }

    fn on_fit_start(&mut self, ctx: &FitContext<'_>) -> Result<()> {
        self.resolve_dir(ctx);
        Ok(())
    }

    fn on_train_epoch_end(
        &mut self,
        ctx: &FitContext<'_>,
        metrics: &Metrics,
        model_state: &Value,
    ) -> Result<()> {
        if (ctx.epoch() + 1) % self.every_n_epochs != 0 {
            return Ok(());
        }
        self.save_checkpoint(ctx, metrics, model_state)
    }
}

/// Expand a filename template.
///
/// `{epoch}` and `{step}` become `epoch=<n>` / `step=<n>`; any other `{key}`
/// becomes `key=<value>` with the metric formatted to four decimals, or
/// `key=0` when the metric was not logged.
pub fn format_checkpoint_name(
    template: &str,
    epoch: usize,
    step: u64,
    metrics: &Metrics,
) -> Result<String> {
    let mut out = String::with_capacity(template.len() + 16);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after.find('}').ok_or_else(|| {
            Error::config(format!("Unclosed '{{' in checkpoint filename '{template}'"))
        })?;
        let key = after[..close].trim();
        if key.is_empty() || key.contains('{') {
            return Err(Error::config(format!(
                "Invalid placeholder in checkpoint filename '{template}'"
            )));
        }

        match key {
            "epoch" => out.push_str(&format!("epoch={epoch}")),
            "step" => out.push_str(&format!("step={step}")),
            _ => match metrics.get(key) {
                Some(value) => out.push_str(&format!("{key}={value:.4}")),
                None => out.push_str(&format!("{key}=0")),
            },
        }
        rest = &after[close + 1..];
    }

    if rest.contains('}') {
        return Err(Error::config(format!("Unmatched '}}' in checkpoint filename '{template}'")));
    }
    out.push_str(rest);
    Ok(out)
}

/// `dir/stem.ckpt`, or `dir/stem-v<n>.ckpt` when taken by a file other than `replacing`
fn unique_path(dir: &Path, stem: &str, replacing: Option<&Path>) -> PathBuf {
    let mut path = dir.join(format!("{stem}{CHECKPOINT_EXT}"));
    let mut n = 1;
    while path.exists() && Some(path.as_path()) != replacing {
        path = dir.join(format!("{stem}-v{n}{CHECKPOINT_EXT}"));
        n += 1;
    }
    path
}

fn write_record(path: &Path, record: &CheckpointRecord) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(record)?)?;
    Ok(())
}

fn remove_checkpoint(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!("Removed checkpoint {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
