//! Ollama endpoint configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default address of a locally running Ollama server.
pub const OLLAMA_API_BASE: &str = "http://localhost:11434";

/// Connection settings for an Ollama-compatible `/api/generate` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OllamaConfig {
    /// Base URL of the server, without the `/api/...` path.
    pub base_url: String,
    /// Model name sent with every request.
    pub model: String,
    /// Upper bound for a blocking generation. Streams are not bounded as a
    /// whole, since a long answer is not a failure.
    pub request_timeout_secs: Option<u64>,
    /// Longest silence tolerated between two chunks of a stream.
    pub stream_idle_timeout_secs: Option<u64>,
    /// Upper bound for establishing the TCP connection.
    pub connect_timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: OLLAMA_API_BASE.to_string(),
            model: "llama3.2".to_string(),
            request_timeout_secs: Some(300),
            stream_idle_timeout_secs: Some(60),
            connect_timeout_secs: 5,
        }
    }
}

impl OllamaConfig {
    /// Configuration for `model` on the default local server.
    pub fn new(model: impl Into<String>) -> Self {
        Self { model: model.into(), ..Default::default() }
    }

    /// Point at a different server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Bound blocking requests; `None` waits indefinitely.
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout_secs = timeout.map(|t| t.as_secs());
        self
    }

    /// Fail a stream that goes quiet for longer than `timeout`; `None` waits
    /// indefinitely.
    pub fn with_stream_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stream_idle_timeout_secs = timeout.map(|t| t.as_secs());
        self
    }

    /// Bound connection establishment.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_secs = timeout.as_secs();
        self
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }
}
