use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info};

use trainkit::{logging, Trainer, TrainerConfig};

#[derive(Parser)]
#[command(name = "trainkit")]
#[command(about = "Inspect trainer output directories and configuration files", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Emit logs as JSON
    #[arg(long, global = true, env = "TRAINKIT_JSON_LOGS")]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the log and checkpoint directories a trainer would use
    LogDir {
        /// Trainer configuration file (JSON or YAML)
        #[arg(short, long)]
        config: PathBuf,

        /// Override the configured root directory
        #[arg(short, long)]
        root: Option<PathBuf>,
    },

    /// Validate a trainer configuration file
    CheckConfig {
        /// Configuration file to validate
        #[arg(short, long)]
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init_logging(cli.verbose, cli.quiet, cli.json_logs)?;

    match cli.command {
        Commands::LogDir { config, root } => show_log_dir(config, root),
        Commands::CheckConfig { file } => check_config(file),
    }
}

fn show_log_dir(config_path: PathBuf, root: Option<PathBuf>) -> Result<()> {
    let mut config = TrainerConfig::from_file(&config_path)
        .with_context(|| format!("Failed to load configuration file {}", config_path.display()))?;

    if let Some(root) = root {
        debug!("Root directory overridden with {}", root.display());
        config.default_root_dir = Some(root);
    }

    let trainer = Trainer::new(config).context("Failed to set up trainer")?;

    println!("log_dir: {}", trainer.log_dir().display());
    match trainer.checkpoint_dir() {
        Some(dir) => println!("checkpoint_dir: {}", dir.display()),
        None => println!("checkpoint_dir: disabled"),
    }

    Ok(())
}

fn check_config(path: PathBuf) -> Result<()> {
    info!("Validating configuration file: {}", path.display());

    let config = TrainerConfig::from_file(&path)
        .with_context(|| format!("Failed to load configuration file {}", path.display()))?;

    config.validate().context("Configuration validation failed")?;

    println!("Configuration is valid");
    println!("  Logger: {}", match &config.logger {
        trainkit::config::LoggerConfig::Disabled => "disabled".to_string(),
        trainkit::config::LoggerConfig::Csv { name, .. } => format!("csv ({name})"),
        trainkit::config::LoggerConfig::Json { name, .. } => format!("json ({name})"),
    });
    println!(
        "  Checkpointing: {}",
        if config.checkpointing.enabled { "enabled" } else { "disabled" }
    );
    if let Some(steps) = config.max_steps {
        println!("  Max steps: {steps}");
    }
    if let Some(epochs) = config.max_epochs {
        println!("  Max epochs: {epochs}");
    }

    Ok(())
}
