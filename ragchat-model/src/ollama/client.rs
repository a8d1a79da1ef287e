//! Ollama generation client.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use ragchat_core::{
    ChatError, GenerationClient, GenerationResult, GenerationStream, Result, completion_channel,
};
use tracing::{debug, error, instrument, warn};

use super::config::OllamaConfig;
use super::wire::{ChunkAccumulator, ErrorResponse, GenerateRequest, LineDecoder, parse_chunk};

/// A [`GenerationClient`] for an Ollama-compatible `/api/generate` endpoint.
///
/// The client holds only a connection pool and immutable settings, so one
/// instance can serve concurrent queries.
///
/// # Example
///
/// ```rust,ignore
/// use ragchat_model::ollama::{OllamaClient, OllamaConfig};
///
/// let client = OllamaClient::new(OllamaConfig::new("llama3.2"))?;
/// let result = client.generate("Question: who won?").await?;
/// ```
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    config: OllamaConfig,
    generate_url: String,
}

impl OllamaClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Configuration`] if the HTTP client cannot be built.
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| ChatError::Configuration(format!("failed to build HTTP client: {e}")))?;
        let generate_url = config.endpoint("/api/generate");
        Ok(Self { http, config, generate_url })
    }

    /// Create a client for `model` on the default local server.
    pub fn localhost(model: impl Into<String>) -> Result<Self> {
        Self::new(OllamaConfig::new(model))
    }

    /// Return the client configuration.
    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    /// Issue the request and check the status. Shared by both modes.
    async fn send(&self, prompt: &str, stream: bool) -> Result<reqwest::Response> {
        let body = GenerateRequest { model: &self.config.model, prompt, stream };
        let mut request = self.http.post(&self.generate_url).json(&body);
        if let (false, Some(secs)) = (stream, self.config.request_timeout_secs) {
            request = request.timeout(Duration::from_secs(secs));
        }

        let response = request.send().await.map_err(|e| {
            error!(url = %self.generate_url, error = %e, "model endpoint unreachable");
            ChatError::transport(format!("request to {} failed: {e}", self.generate_url))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail =
                serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error).unwrap_or(body);
            error!(%status, "model endpoint returned an error status");
            return Err(ChatError::transport(format!("model endpoint returned {status}: {detail}")));
        }

        Ok(response)
    }
}

#[async_trait]
impl GenerationClient for OllamaClient {
    fn name(&self) -> &str {
        &self.config.model
    }

    #[instrument(skip_all, fields(model = %self.config.model, prompt.len = prompt.len()))]
    async fn generate(&self, prompt: &str) -> Result<GenerationResult> {
        let response = self.send(prompt, false).await?;
        let body = response
            .bytes()
            .await
            .map_err(|e| ChatError::transport(format!("failed to read response body: {e}")))?;

        let mut accumulator = ChunkAccumulator::new(self.config.model.as_str());
        parse_chunk(&body)
            .and_then(|chunk| accumulator.apply(chunk))
            .map_err(ChatError::transport)?;
        if !accumulator.is_done() {
            return Err(ChatError::transport_with_partial(
                "response was not marked done",
                accumulator.text(),
            ));
        }

        let result = accumulator.into_result();
        debug!(
            prompt_tokens = result.prompt_tokens,
            generated_tokens = result.generated_tokens,
            "generation finished"
        );
        Ok(result)
    }

    #[instrument(skip_all, fields(model = %self.config.model, prompt.len = prompt.len()))]
    async fn generate_stream(&self, prompt: &str) -> Result<GenerationStream> {
        let response = self.send(prompt, true).await?;
        let (mut sender, completion) = completion_channel(self.config.model.as_str());
        let mut accumulator = ChunkAccumulator::new(self.config.model.as_str());

        let idle_timeout = self.config.stream_idle_timeout_secs.map(Duration::from_secs);

        let fragments = async_stream::stream! {
            let mut body = response.bytes_stream();
            let mut decoder = LineDecoder::default();
            let mut body_ended = false;

            while !body_ended {
                let next = match idle_timeout {
                    Some(limit) => match tokio::time::timeout(limit, body.next()).await {
                        Ok(next) => next,
                        Err(_) => {
                            warn!(
                                idle_secs = limit.as_secs(),
                                received = accumulator.text().len(),
                                "generation stream stalled"
                            );
                            let err = ChatError::transport_with_partial(
                                format!("no data from model for {}s", limit.as_secs()),
                                accumulator.text(),
                            );
                            sender.fail(err.to_string());
                            yield Err(err);
                            return;
                        }
                    },
                    None => body.next().await,
                };

                let lines = match next {
                    Some(Ok(bytes)) => decoder.push(&bytes),
                    Some(Err(e)) => {
                        warn!(error = %e, received = accumulator.text().len(), "generation stream dropped");
                        let err = ChatError::transport_with_partial(
                            format!("stream interrupted: {e}"),
                            accumulator.text(),
                        );
                        sender.fail(err.to_string());
                        yield Err(err);
                        return;
                    }
                    None => {
                        body_ended = true;
                        decoder.finish()
                    }
                };

                for line in lines {
                    match parse_chunk(&line).and_then(|chunk| accumulator.apply(chunk)) {
                        Ok(Some(fragment)) => {
                            sender.push_fragment(&fragment);
                            yield Ok(fragment);
                        }
                        Ok(None) => {}
                        Err(message) => {
                            warn!(%message, "generation stream failed");
                            let err = ChatError::transport_with_partial(message, accumulator.text());
                            sender.fail(err.to_string());
                            yield Err(err);
                            return;
                        }
                    }

                    if accumulator.is_done() {
                        let result = accumulator.into_result();
                        debug!(
                            prompt_tokens = result.prompt_tokens,
                            generated_tokens = result.generated_tokens,
                            "generation stream finished"
                        );
                        sender.complete(result);
                        return;
                    }
                }
            }

            let err = ChatError::transport_with_partial(
                "stream ended before the final chunk",
                accumulator.text(),
            );
            sender.fail(err.to_string());
            yield Err(err);
        };

        Ok(GenerationStream::new(Box::pin(fragments), completion))
    }
}
