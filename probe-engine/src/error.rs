//! Error types for the probe engine

use thiserror::Error;

/// Main error type for engine operations.
///
/// Per-attempt transport problems (timeouts, refused connections, DNS
/// failures, bad proxy URLs) are deliberately absent: they are recorded as
/// failed outcomes and flow through the result channel instead of aborting
/// anything.
#[derive(Debug, Error, Clone, serde::Serialize, serde::Deserialize)]
pub enum EngineError {
    #[error("Invalid configuration: {field} - {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("A run is already active")]
    AlreadyRunning,

    #[error("HTTP client construction failed: {reason}")]
    ClientBuild { reason: String },

    #[error("Result sink failed: {reason}")]
    Sink { reason: String },

    #[error("Serialization error: {reason}")]
    Serialization { reason: String },
}

impl EngineError {
    /// Create a configuration error with field and reason
    pub fn invalid_config(field: &str, reason: &str) -> Self {
        Self::InvalidConfig {
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(error: std::io::Error) -> Self {
        EngineError::Sink {
            reason: error.to_string(),
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(error: serde_json::Error) -> Self {
        EngineError::Serialization {
            reason: error.to_string(),
        }
    }
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
