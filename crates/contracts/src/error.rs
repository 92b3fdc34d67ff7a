//! Layered error definitions
//!
//! Categorized by source: config / input / alignment / sink

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    /// Tag pair is not two distinct, non-empty ids
    #[error("invalid tag pair: {message}")]
    InvalidTagPair { message: String },

    // ===== Input Errors =====
    /// Upstream record could not be decoded into a tag read
    #[error("malformed record at {location}: {message}")]
    MalformedRecord { location: String, message: String },

    /// A configured tag never appears in the data handed to the differencer
    #[error("tag '{tag_id}' has no records in the input")]
    MissingTag { tag_id: String },

    // ===== Alignment Errors =====
    /// Aligner produced no pairing although its preconditions held
    #[error("alignment failed on channel {channel}: {message}")]
    Alignment { channel: f64, message: String },

    // ===== Sink Errors =====
    /// Sink write error
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn invalid_tag_pair(message: impl Into<String>) -> Self {
        Self::InvalidTagPair {
            message: message.into(),
        }
    }

    /// Create malformed record error; `location` is a line number or source name
    pub fn malformed(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedRecord {
            location: location.into(),
            message: message.into(),
        }
    }

    pub fn alignment(channel: f64, message: impl Into<String>) -> Self {
        Self::Alignment {
            channel,
            message: message.into(),
        }
    }

    /// Create sink write error
    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Error raised by configuration rather than by the data stream
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::ConfigParse { .. } | Self::ConfigValidation { .. } | Self::InvalidTagPair { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_are_classified() {
        assert!(ContractError::config_validation("stream", "zero capacity").is_config());
        assert!(ContractError::invalid_tag_pair("same id").is_config());
        assert!(!ContractError::malformed("line 2", "bad phase").is_config());
        assert!(!ContractError::MissingTag { tag_id: "B".into() }.is_config());
    }
}
