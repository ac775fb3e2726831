mod common;

use common::DirProbe;
use tempfile::TempDir;
use trainkit::callbacks::load_checkpoint;
use trainkit::{Error, ModelCheckpoint, MonitorMode, Trainer, TrainingStatus};

#[test]
fn test_default_checkpoint_lands_next_to_logs() {
    let tmp = TempDir::new().unwrap();
    let mut trainer = Trainer::builder()
        .default_root_dir(tmp.path())
        .max_steps(2)
        .build()
        .unwrap();

    let ckpt_dir = tmp
        .path()
        .join("lightning_logs")
        .join("version_0")
        .join("checkpoints");
    assert_eq!(trainer.checkpoint_dir(), Some(ckpt_dir.clone()));

    let result = trainer.fit(&mut DirProbe::new()).unwrap();
    let saved = ckpt_dir.join("epoch=0-step=2.ckpt");
    assert!(saved.exists());
    assert_eq!(result.best_model_path, Some(saved.clone()));

    let record = load_checkpoint(&saved).unwrap();
    assert_eq!(record.epoch, 0);
    assert_eq!(record.global_step, 2);
    assert_eq!(record.state["weights"][1], 0.2);
}

#[test]
fn test_checkpoint_without_logger_goes_under_root() {
    let tmp = TempDir::new().unwrap();
    let mut trainer = Trainer::builder()
        .default_root_dir(tmp.path())
        .max_steps(2)
        .no_logger()
        .build()
        .unwrap();

    trainer.fit(&mut DirProbe::new()).unwrap();
    assert!(tmp.path().join("checkpoints").join("epoch=0-step=2.ckpt").exists());
    assert!(!tmp.path().join("lightning_logs").exists());
}

#[test]
fn test_weights_save_path_moves_checkpoints_only() {
    let tmp = TempDir::new().unwrap();
    let weights = tmp.path().join("weights");
    let mut trainer = Trainer::builder()
        .default_root_dir(tmp.path())
        .weights_save_path(&weights)
        .max_steps(2)
        .build()
        .unwrap();

    assert_eq!(trainer.log_dir(), tmp.path().join("lightning_logs").join("version_0"));
    trainer.fit(&mut DirProbe::new()).unwrap();
    assert!(weights
        .join("lightning_logs")
        .join("version_0")
        .join("checkpoints")
        .join("epoch=0-step=2.ckpt")
        .exists());
}

#[test]
fn test_csv_metrics_written_after_fit() {
    let tmp = TempDir::new().unwrap();
    let mut trainer = Trainer::builder()
        .default_root_dir(tmp.path())
        .max_steps(2)
        .log_every_n_steps(1)
        .no_checkpoint()
        .build()
        .unwrap();

    trainer.fit(&mut DirProbe::new()).unwrap();

    let log_dir = trainer.log_dir();
    let csv = std::fs::read_to_string(log_dir.join("metrics.csv")).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines, vec!["step,epoch,loss", "0,0,0.5", "1,0,0.5"]);

    let hparams = std::fs::read_to_string(log_dir.join("hparams.yaml")).unwrap();
    assert!(hparams.contains("batches: 4"));
}

#[test]
fn test_missing_monitor_fails_fit() {
    let tmp = TempDir::new().unwrap();
    let mut trainer = Trainer::builder()
        .default_root_dir(tmp.path())
        .max_steps(2)
        .checkpoint_callback(ModelCheckpoint::new().with_monitor("val_loss", MonitorMode::Min))
        .build()
        .unwrap();

    let err = trainer.fit(&mut DirProbe::new()).unwrap_err();
    assert!(matches!(err, Error::Misconfiguration(_)));
    assert!(matches!(trainer.state().status, TrainingStatus::Failed { .. }));
    // The failed run still reports the same directory.
    assert_eq!(trainer.log_dir(), tmp.path().join("lightning_logs").join("version_0"));
}

#[test]
fn test_monitored_checkpoint_records_score() {
    let tmp = TempDir::new().unwrap();
    let mut trainer = Trainer::builder()
        .default_root_dir(tmp.path())
        .max_epochs(3)
        .no_logger()
        .checkpoint_callback(
            ModelCheckpoint::new()
                .with_monitor("loss", MonitorMode::Min)
                .with_filename("{epoch}-{loss}")
                .with_save_last(true),
        )
        .build()
        .unwrap();

    trainer.fit(&mut DirProbe::new()).unwrap();

    let checkpoint = trainer.checkpoint_callback().unwrap();
    assert_eq!(checkpoint.best_k_models().len(), 1);
    assert_eq!(checkpoint.best_model_score(), Some(0.5));
    assert!(tmp.path().join("checkpoints").join("last.ckpt").exists());
}
