//! Error types for CLI operations.

use contracts::ContractError;
use dispatcher::{DispatcherError, PipelineError};
use ingestion::IngestionError;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration rejected by the validator
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String },

    /// Command-line usage that cannot be satisfied
    #[error("{message}")]
    Usage { message: String },

    #[error(transparent)]
    Contract(#[from] ContractError),

    #[error("Event source failed: {0}")]
    Source(#[from] IngestionError),

    #[error("Dispatcher setup failed: {0}")]
    Dispatcher(#[from] DispatcherError),

    #[error("Pipeline execution failed: {0}")]
    Pipeline(#[from] PipelineError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error wrapper
    #[error("{0:#}")]
    Other(#[from] anyhow::Error),
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
        }
    }

    /// Process exit code for this failure
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Usage { .. } => 64,
            Self::ConfigNotFound { .. } | Self::ConfigValidation { .. } => 78,
            Self::Contract(e) if e.is_config() => 78,
            Self::Contract(_) | Self::Source(_) => 65,
            Self::Io(_) => 74,
            Self::Dispatcher(_) | Self::Pipeline(_) | Self::Other(_) => 1,
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
