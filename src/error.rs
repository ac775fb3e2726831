//! Error types for trainkit

use thiserror::Error;

/// Main error type for trainkit operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Incompatible combination of trainer options
    #[error("Misconfiguration: {0}")]
    Misconfiguration(String),

    /// Experiment logger error
    #[error("Logger error: {0}")]
    Logger(String),

    /// Checkpoint writing or bookkeeping error
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// Error raised by a user training module
    #[error("Model error: {0}")]
    Model(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Other errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for trainkit operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a misconfiguration error
    pub fn misconfiguration(msg: impl Into<String>) -> Self {
        Self::Misconfiguration(msg.into())
    }

    /// Create a logger error
    pub fn logger(msg: impl Into<String>) -> Self {
        Self::Logger(msg.into())
    }

    /// Create a checkpoint error
    pub fn checkpoint(msg: impl Into<String>) -> Self {
        Self::Checkpoint(msg.into())
    }

    /// Create a model error
    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }
}
