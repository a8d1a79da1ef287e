//! Telemetry records and the cost table used to price them.

use ragchat_core::{GenerationResult, QueryStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Value logged as the retrieved source when no document matched.
pub const NO_DOCUMENT_SOURCE: &str = "No document found";

/// USD price per 1000 tokens.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CostTable {
    /// Price of 1000 prompt tokens.
    pub input_per_1k: f64,
    /// Price of 1000 generated tokens.
    pub output_per_1k: f64,
}

impl Default for CostTable {
    fn default() -> Self {
        Self { input_per_1k: 0.003, output_per_1k: 0.015 }
    }
}

impl CostTable {
    /// Cost of `tokens` prompt tokens, rounded to six decimals.
    pub fn input_cost(&self, tokens: u64) -> f64 {
        round6(tokens as f64 / 1_000.0 * self.input_per_1k)
    }

    /// Cost of `tokens` generated tokens, rounded to six decimals.
    pub fn output_cost(&self, tokens: u64) -> f64 {
        round6(tokens as f64 / 1_000.0 * self.output_per_1k)
    }
}

fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

/// What the pipeline knows about a query when it hands it to the sink.
#[derive(Debug, Clone, PartialEq)]
pub struct RunContext {
    /// Run identifier; one run per query.
    pub run_id: Uuid,
    /// The user question.
    pub query: String,
    /// Prompt sent (or that would have been sent) to the model.
    pub prompt: String,
    /// Source id of the top retrieved document.
    pub retrieved_source: Option<String>,
    /// Top similarity score (cosine distance).
    pub similarity: f32,
    /// Terminal state of the query.
    pub status: QueryStatus,
}

/// One query's telemetry. Written once, never read back by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetryRecord {
    /// Run identifier, equal to the query id.
    pub run_id: Uuid,
    /// Experiment the run is grouped under.
    pub experiment: String,
    /// Terminal state of the query. A generation that stopped on an error is
    /// `Failed` even when fragments were already shown.
    pub status: QueryStatus,
    /// `false` when the response was cut short.
    pub completed: bool,
    /// Why generation stopped early, if it failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    // params
    /// Model that produced (or would have produced) the response.
    pub model: String,
    /// The user question.
    pub query: String,
    /// Prompt sent to the model.
    pub prompt: String,
    /// Source id of the top match, or [`NO_DOCUMENT_SOURCE`].
    pub retrieved_source: String,

    // metrics
    /// Top similarity score (cosine distance).
    pub similarity: f32,
    /// Processing time reported by the model service, in nanoseconds.
    pub processing_time_ns: u64,
    /// Prompt tokens evaluated by the model.
    pub prompt_tokens: u64,
    /// Tokens generated by the model.
    pub generated_tokens: u64,
    /// Prompt token cost in USD.
    pub input_cost_usd: f64,
    /// Generated token cost in USD.
    pub output_cost_usd: f64,
    /// Sum of the two costs, in USD.
    pub total_cost_usd: f64,
    /// Response length in characters.
    pub response_length: usize,

    /// Response text, possibly partial.
    pub response: String,
    /// Generation timestamp reported by the model service.
    pub created_at: String,
}

impl TelemetryRecord {
    /// Derive a record from the run context and the generation result.
    ///
    /// A result carrying an error overrides the context status with `Failed`.
    pub fn from_run(
        experiment: &str,
        context: RunContext,
        result: GenerationResult,
        costs: &CostTable,
    ) -> Self {
        let input_cost_usd = costs.input_cost(result.prompt_tokens);
        let output_cost_usd = costs.output_cost(result.generated_tokens);
        let model = if result.model.is_empty() { "Unknown Model".to_string() } else { result.model };
        let status = if result.error.is_some() { QueryStatus::Failed } else { context.status };

        Self {
            run_id: context.run_id,
            experiment: experiment.to_string(),
            status,
            completed: result.completed,
            error: result.error,
            model,
            query: context.query,
            prompt: context.prompt,
            retrieved_source: context
                .retrieved_source
                .unwrap_or_else(|| NO_DOCUMENT_SOURCE.to_string()),
            similarity: context.similarity,
            processing_time_ns: result.total_duration_ns,
            prompt_tokens: result.prompt_tokens,
            generated_tokens: result.generated_tokens,
            input_cost_usd,
            output_cost_usd,
            total_cost_usd: round6(input_cost_usd + output_cost_usd),
            response_length: result.response.chars().count(),
            response: result.response,
            created_at: result.created_at,
        }
    }
}
