//! Error types for the `ragchat-telemetry` crate.

use ragchat_core::ChatError;
use thiserror::Error;

/// Errors raised while writing telemetry or installing the logger.
///
/// None of these reach a user-facing answer: the sink logs and drops them.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A tracker backend rejected or failed to store a record.
    #[error("Tracker error ({backend}): {message}")]
    Tracker {
        /// The tracker that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A record with this run id was already written.
    #[error("Run {0} was already recorded")]
    DuplicateRun(uuid::Uuid),

    /// Writing a local telemetry file failed.
    #[error("Telemetry I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be serialized.
    #[error("Telemetry serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The tracing subscriber could not be installed.
    #[error("Logging initialisation failed: {0}")]
    Init(String),
}

impl From<TelemetryError> for ChatError {
    fn from(err: TelemetryError) -> Self {
        ChatError::Telemetry(err.to_string())
    }
}

/// A convenience result type for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;
