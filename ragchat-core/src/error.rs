//! Error taxonomy shared by every ragchat crate.

use thiserror::Error;

/// Errors surfaced by the query path.
///
/// Retrieval and transport failures are terminal for a single query.
/// Configuration failures are fatal at startup. Telemetry failures never
/// leave the telemetry sink; the variant exists so trackers and the sink
/// can speak the same language when they log them.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ChatError {
    /// A required setting is missing or inconsistent (for example an
    /// embedding dimensionality mismatch).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The document store is unreachable or its index is unusable.
    #[error("Retrieval error ({backend}): {message}")]
    Retrieval {
        /// The store or embedding backend that failed.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// The language-model endpoint could not be reached, answered with a
    /// non-success status, or dropped the stream mid-flight.
    #[error("Transport error: {message}")]
    Transport {
        /// A description of the failure.
        message: String,
        /// Text received before the failure, if any.
        partial_response: String,
    },

    /// Writing a telemetry record failed.
    #[error("Telemetry error: {0}")]
    Telemetry(String),
}

impl ChatError {
    /// Build a transport error that carries no partial output.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport { message: message.into(), partial_response: String::new() }
    }

    /// Build a transport error preserving the text received so far.
    pub fn transport_with_partial(
        message: impl Into<String>,
        partial_response: impl Into<String>,
    ) -> Self {
        Self::Transport { message: message.into(), partial_response: partial_response.into() }
    }

    /// Text received before a transport failure. Empty for other variants.
    pub fn partial_response(&self) -> &str {
        match self {
            Self::Transport { partial_response, .. } => partial_response,
            _ => "",
        }
    }
}

/// A convenience result type for ragchat operations.
pub type Result<T> = std::result::Result<T, ChatError>;
