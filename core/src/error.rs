//! Error types for pipeline-bench-core

use thiserror::Error;

use crate::config::ConfigError;
use crate::inputs::InputError;
use crate::traits::{ProbeError, TransportError};

/// Core error type
#[derive(Error, Debug)]
pub enum BenchError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// A required builder field was never set
    #[error("missing required configuration: {0}")]
    MissingConfig(&'static str),

    /// Input discovery failed
    #[error("input error: {0}")]
    Input(#[from] InputError),

    /// Transport error that escaped a session
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Utilization probe could not be started
    #[error("probe error: {0}")]
    Probe(#[from] ProbeError),

    /// Worker lifecycle failure
    #[error("orchestration error: {0}")]
    Orchestration(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BenchError {
    /// Build a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Build a missing-field error
    pub fn missing_config(field: &'static str) -> Self {
        Self::MissingConfig(field)
    }

    /// Build an orchestration error
    pub fn orchestration(message: impl Into<String>) -> Self {
        Self::Orchestration(message.into())
    }
}

impl From<ConfigError> for BenchError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type alias
pub type BenchResult<T> = std::result::Result<T, BenchError>;
