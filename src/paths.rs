//! Output directory resolution
//!
//! Every directory a training run writes to is derived here from three inputs:
//! the trainer's root directory, the (optional) experiment logger and, for
//! checkpoints only, an optional weights save path. The log directory never
//! depends on checkpointing; [`resolve_log_dir`] does not even take it as input.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::loggers::{Logger, Version};

/// Prefix of numbered version directories (`version_0`, `version_1`, ...)
pub const VERSION_PREFIX: &str = "version_";

/// Name of the checkpoint directory nested under a log or weights directory
pub const CHECKPOINTS_DIR: &str = "checkpoints";

/// Resolve the canonical log directory of a run.
///
/// With a logger this is `save_dir/name/version_N`, falling back to `root`
/// when the logger has no save directory of its own. Without a logger the
/// root directory itself is the log directory.
pub fn resolve_log_dir(root: &Path, logger: Option<&dyn Logger>) -> PathBuf {
    match logger {
        Some(logger) => logger.log_dir(root),
        None => root.to_path_buf(),
    }
}

/// `base/name/<version dir>`
pub fn versioned_dir(base: &Path, name: &str, version: &Version) -> PathBuf {
    base.join(name).join(version.dir_name())
}

/// Parse a `version_<n>` directory name.
pub fn parse_version_dir(dir_name: &str) -> Option<u32> {
    dir_name.strip_prefix(VERSION_PREFIX)?.parse().ok()
}

/// Next free version number under `save_dir/name`.
///
/// Returns `0` when the directory does not exist or holds no `version_<n>`
/// subdirectories. Files and unrelated directories are ignored.
pub fn next_version(save_dir: &Path, name: &str) -> u32 {
    let root = save_dir.join(name);

    let entries = match fs::read_dir(&root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("No existing versions under {}", root.display());
            return 0;
        }
        Err(e) => {
            warn!("Cannot list versions under {}: {}", root.display(), e);
            return 0;
        }
    };

    entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter_map(|entry| parse_version_dir(&entry.file_name().to_string_lossy()))
        .max()
        .map_or(0, |latest| latest.saturating_add(1))
}

/// Directory a checkpoint callback without an explicit `dirpath` writes into.
///
/// With a logger, checkpoints live next to the logs of the same version
/// (`<base>/name/version_N/checkpoints`), where `<base>` is the weights save
/// path when one is given and the logger's save directory (or `root`)
/// otherwise. Without a logger they go to `<weights or root>/checkpoints`.
pub fn resolve_checkpoint_dir(
    root: &Path,
    weights_save_path: Option<&Path>,
    logger: Option<&dyn Logger>,
) -> PathBuf {
    match logger {
        Some(logger) => {
            let base = weights_save_path
                .or_else(|| logger.save_dir())
                .unwrap_or(root);
            versioned_dir(base, &logger.name(), &logger.version()).join(CHECKPOINTS_DIR)
        }
        None => weights_save_path.unwrap_or(root).join(CHECKPOINTS_DIR),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loggers::CsvLogger;
    use proptest::prelude::*;
    use tempfile::TempDir;
    use test_case::test_case;

    #[test_case("version_0", Some(0))]
    #[test_case("version_12", Some(12))]
    #[test_case("version_", None)]
    #[test_case("version_x", None)]
    #[test_case("checkpoints", None)]
    #[test_case("Version_3", None)]
    fn test_parse_version_dir(name: &str, expected: Option<u32>) {
        assert_eq!(parse_version_dir(name), expected);
    }

    #[test]
    fn test_next_version_missing_dir() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(next_version(tmp.path(), "lightning_logs"), 0);
    }

    #[test]
    fn test_next_version_skips_files_and_foreign_dirs() {
        let tmp = TempDir::new().unwrap();
        let logs = tmp.path().join("lightning_logs");
        fs::create_dir_all(logs.join("version_0")).unwrap();
        fs::create_dir_all(logs.join("version_4")).unwrap();
        fs::create_dir_all(logs.join("scratch")).unwrap();
        fs::write(logs.join("version_9"), b"not a directory").unwrap();

        assert_eq!(next_version(tmp.path(), "lightning_logs"), 5);
        assert_eq!(next_version(tmp.path(), "other"), 0);
    }

    #[test]
    fn test_log_dir_without_logger_is_root() {
        let root = Path::new("/runs/exp");
        assert_eq!(resolve_log_dir(root, None), root);
    }

    #[test]
    fn test_log_dir_with_logger_falls_back_to_root() {
        let tmp = TempDir::new().unwrap();
        let logger = CsvLogger::new(tmp.path());
        let logger: &dyn Logger = &logger;
        let other_root = Path::new("/unused/root");
        assert_eq!(
            resolve_log_dir(other_root, Some(logger)),
            tmp.path().join("lightning_logs").join("version_0")
        );
    }

    #[test]
    fn test_checkpoint_dir_variants() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        let weights = root.join("weights");
        let logger = CsvLogger::new(root).with_name("exp");
        let logger: &dyn Logger = &logger;

        assert_eq!(
            resolve_checkpoint_dir(root, None, Some(logger)),
            root.join("exp").join("version_0").join("checkpoints")
        );
        assert_eq!(
            resolve_checkpoint_dir(root, Some(weights.as_path()), Some(logger)),
            weights.join("exp").join("version_0").join("checkpoints")
        );
        assert_eq!(resolve_checkpoint_dir(root, None, None), root.join("checkpoints"));
        assert_eq!(
            resolve_checkpoint_dir(root, Some(weights.as_path()), None),
            weights.join("checkpoints")
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_next_version_follows_highest(versions in proptest::collection::btree_set(0u32..500, 1..8)) {
            let tmp = TempDir::new().unwrap();
            for v in &versions {
                fs::create_dir_all(tmp.path().join("runs").join(format!("version_{v}"))).unwrap();
            }
            let highest = *versions.iter().max().unwrap();
            prop_assert_eq!(next_version(tmp.path(), "runs"), highest + 1);
        }
    }
}
