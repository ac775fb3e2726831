//! Versioned experiment directory shared by the file based loggers

use std::fs;
use std::path::{Component, Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing::debug;

use super::Version;
use crate::error::{Error, Result};
use crate::paths;

/// `save_dir/name/version` with a lazily resolved, cached version.
///
/// Without an explicit version the next free `version_<n>` is picked the first
/// time the version is asked for. The choice is kept for the lifetime of the
/// value, so creating the directory later does not bump the version.
#[derive(Debug)]
pub struct ExperimentDir {
    save_dir: PathBuf,
    name: String,
    pinned: Option<Version>,
    resolved: OnceCell<Version>,
}

impl ExperimentDir {
    pub fn new(save_dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            save_dir: save_dir.into(),
            name: name.into(),
            pinned: None,
            resolved: OnceCell::new(),
        }
    }

    /// Replace the experiment name. Drops a previously discovered version.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self.resolved = OnceCell::new();
        self
    }

    /// Use a fixed version instead of discovering the next free one
    pub fn with_version(mut self, version: impl Into<Version>) -> Self {
        self.pinned = Some(version.into());
        self
    }

    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> Version {
        if let Some(version) = &self.pinned {
            return version.clone();
        }
        self.resolved
            .get_or_init(|| {
                let next = paths::next_version(&self.save_dir, &self.name);
                debug!("Resolved version {} for experiment '{}'", next, self.name);
                Version::Number(next)
            })
            .clone()
    }

    /// Full experiment directory path
    pub fn path(&self) -> PathBuf {
        paths::versioned_dir(&self.save_dir, &self.name, &self.version())
    }

    /// Create the experiment directory if needed and return it
    pub fn ensure(&self) -> Result<PathBuf> {
        let path = self.path();
        fs::create_dir_all(&path)?;
        Ok(path)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::config("Logger name must not be empty"));
        }

        if let Some(Version::Label(label)) = &self.pinned {
            let mut components = Path::new(label).components();
            let single_normal = matches!(
                (components.next(), components.next()),
                (Some(Component::Normal(_)), None)
            );
            if !single_normal {
                return Err(Error::config(format!(
                    "Version label '{label}' must be a single directory name"
                )));
            }
        }

        Ok(())
    }
}
