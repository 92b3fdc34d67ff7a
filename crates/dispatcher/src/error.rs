//! Dispatcher error types

use thiserror::Error;

/// Consumer-side errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Sink creation error
    #[error("failed to create sink '{name}': {message}")]
    SinkCreation { name: String, message: String },

    /// Sink write error (from contract)
    #[error("sink error: {0}")]
    Contract(#[from] contracts::ContractError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DispatcherError {
    /// Create a sink creation error
    pub fn sink_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Producer-side errors
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The producer thread could not be started
    #[error("failed to spawn producer thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// The producer thread panicked
    #[error("producer thread panicked: {0}")]
    ProducerPanicked(String),

    /// The producer's private runtime could not be built
    #[error("failed to build producer runtime: {0}")]
    Runtime(#[source] std::io::Error),
}
