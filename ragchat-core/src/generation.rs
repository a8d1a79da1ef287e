//! The generation capability and its result type.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::stream::GenerationStream;

/// Outcome of one generation call.
///
/// In streaming mode the text is assembled from fragments; the value is
/// handed out only once the stream has settled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct GenerationResult {
    /// Model that produced the response.
    pub model: String,
    /// Full response text.
    pub response: String,
    /// Timestamp reported by the model service (RFC 3339).
    pub created_at: String,
    /// Total processing time reported by the service, in nanoseconds.
    pub total_duration_ns: u64,
    /// Number of prompt tokens evaluated.
    pub prompt_tokens: u64,
    /// Number of tokens generated.
    pub generated_tokens: u64,
    /// `false` when the response was cut short by an error or cancellation.
    pub completed: bool,
    /// Why generation stopped early. `None` on success and when the consumer
    /// abandoned the stream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GenerationResult {
    /// A finished result for text that was produced without calling a model,
    /// such as a refusal. Token counts are zero.
    pub fn fixed(model: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            response: response.into(),
            created_at: chrono::Utc::now().to_rfc3339(),
            completed: true,
            ..Default::default()
        }
    }

    /// An unfinished result holding whatever text arrived before the stream stopped.
    pub fn partial(model: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            response: response.into(),
            created_at: chrono::Utc::now().to_rfc3339(),
            completed: false,
            ..Default::default()
        }
    }

    /// An unfinished result for a generation that stopped on an error.
    pub fn failed(
        model: impl Into<String>,
        response: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self { error: Some(error.into()), ..Self::partial(model, response) }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// A language model reachable through one endpoint.
///
/// Both modes must share request construction and response parsing so that
/// a blocking call and a fully drained stream agree on text and token counts.
/// Implementations hold no per-call mutable state and can be shared across
/// concurrent queries.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Model identifier used for requests.
    fn name(&self) -> &str;

    /// Send the prompt and wait for the whole response.
    async fn generate(&self, prompt: &str) -> Result<GenerationResult>;

    /// Send the prompt and return fragments as they arrive, plus a completion
    /// handle that settles once the fragment sequence is exhausted or dropped.
    async fn generate_stream(&self, prompt: &str) -> Result<GenerationStream>;
}
