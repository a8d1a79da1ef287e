//! Query pipeline orchestrator.
//!
//! The [`QueryPipeline`] composes a [`DocumentStore`], a [`ContentFilter`],
//! the [`ContextPolicy`] and a [`GenerationClient`] into one
//! request/response (or request/stream) cycle:
//!
//! 1. retrieve the top `k` matches for the question
//! 2. no matches: answer with the "no document" text, skip generation
//! 3. restricted top match: answer with the refusal text, skip generation
//! 4. otherwise build the prompt from the top score and generate
//!
//! Every outcome, failures included, dispatches one telemetry record. The
//! pipeline never waits for it.
//!
//! # Example
//!
//! ```rust,ignore
//! use ragchat_rag::{QueryPipeline, RagConfig};
//!
//! let pipeline = QueryPipeline::builder()
//!     .config(RagConfig::default())
//!     .document_store(Arc::new(store))
//!     .generator(Arc::new(client))
//!     .telemetry(sink)
//!     .build()?;
//!
//! let answer = pipeline.ask(&Query::new("football game recap")).await?;
//! println!("{}", answer.response());
//! ```

use std::sync::Arc;

use ragchat_core::{
    ChatError, FilterReason, GenerationClient, GenerationResult, GenerationStream, Query,
    QueryStatus,
};
use ragchat_telemetry::{RunContext, TelemetrySink};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::config::RagConfig;
use crate::document::SimilarityMatch;
use crate::error::RagError;
use crate::filter::{ContentFilter, SourceBlocklist};
use crate::policy::{ContextPolicy, Prompt};
use crate::store::DocumentStore;

/// Matches retrieved for one query, with the values derived from the top one.
#[derive(Debug, Clone, PartialEq)]
pub struct Retrieval {
    /// All matches, best first.
    pub matches: Vec<SimilarityMatch>,
    /// Content of the top match, or the "no document" text.
    pub context: String,
    /// Score of the top match, or `0.0` when nothing matched.
    pub score: f32,
}

impl Retrieval {
    /// The best match, if any.
    pub fn top_match(&self) -> Option<&SimilarityMatch> {
        self.matches.first()
    }

    /// `true` when the corpus returned nothing.
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}

/// A completed answer in blocking mode.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    /// Id of the answered query, also the telemetry run id.
    pub query_id: Uuid,
    /// Terminal state: `Answered` or one of the `Filtered` reasons.
    pub status: QueryStatus,
    /// Prompt sent to the model, or the question alone when filtered.
    pub prompt: Prompt,
    /// Generated (or fixed) response with model metadata.
    pub result: GenerationResult,
    /// What retrieval found for the query.
    pub retrieval: Retrieval,
}

impl Answer {
    /// The response text.
    pub fn response(&self) -> &str {
        &self.result.response
    }

    pub fn top_match(&self) -> Option<&SimilarityMatch> {
        self.retrieval.top_match()
    }
}

/// An answer in streaming mode.
///
/// Consume [`stream`](Self::stream) to display fragments. Dropping it early
/// closes the model connection; telemetry then records `completed = false`.
#[derive(Debug)]
pub struct StreamingAnswer {
    /// Id of the answered query, also the telemetry run id.
    pub query_id: Uuid,
    /// State when the stream was opened. A later transport failure shows up
    /// as a stream error and in telemetry, not here.
    pub status: QueryStatus,
    /// Prompt sent to the model, or the question alone when filtered.
    pub prompt: Prompt,
    /// What retrieval found for the query.
    pub retrieval: Retrieval,
    /// Response fragments plus the completion handle.
    pub stream: GenerationStream,
}

impl StreamingAnswer {
    pub fn top_match(&self) -> Option<&SimilarityMatch> {
        self.retrieval.top_match()
    }
}

/// What to do after retrieval.
enum Plan {
    /// Return fixed text without calling the model.
    Fixed { status: QueryStatus, prompt: Prompt, response: String },
    Generate { prompt: Prompt },
}

/// The query pipeline. Construct one via [`QueryPipeline::builder()`].
///
/// Holds no per-query mutable state; share it behind an `Arc` to serve
/// concurrent queries.
pub struct QueryPipeline {
    config: RagConfig,
    store: Arc<dyn DocumentStore>,
    filter: Arc<dyn ContentFilter>,
    policy: ContextPolicy,
    generator: Arc<dyn GenerationClient>,
    telemetry: Option<TelemetrySink>,
}

impl QueryPipeline {
    /// Create a new [`QueryPipelineBuilder`].
    pub fn builder() -> QueryPipelineBuilder {
        QueryPipelineBuilder::default()
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn telemetry(&self) -> Option<&TelemetrySink> {
        self.telemetry.as_ref()
    }

    /// Retrieve the top matches for `query`.
    ///
    /// An empty corpus is not an error: the result carries no matches, the
    /// "no document" context, and a zero score.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Retrieval`] when the store or embedder fails, or
    /// [`ChatError::Configuration`] on a dimensionality mismatch.
    pub async fn retrieve(&self, query: &str) -> Result<Retrieval, ChatError> {
        let matches = self.store.search(query, self.config.top_k).await.map_err(|e| {
            error!(error = %e, "retrieval failed");
            ChatError::from(e)
        })?;

        let (context, score) = match matches.first() {
            Some(top) => (top.content().to_string(), top.score),
            None => (self.config.no_document_text.clone(), 0.0),
        };
        Ok(Retrieval { matches, context, score })
    }

    /// Answer `query` in blocking mode.
    ///
    /// # Errors
    ///
    /// Retrieval and generation failures are returned as-is; the query is
    /// then in the `Failed` state and no retry is attempted.
    #[instrument(skip_all, fields(query.id = %query.id))]
    pub async fn ask(&self, query: &Query) -> Result<Answer, ChatError> {
        let retrieval = self.retrieve_or_record(query).await?;

        let (status, prompt, result) = match self.plan(query, &retrieval) {
            Plan::Fixed { status, prompt, response } => {
                (status, prompt, GenerationResult::fixed(self.generator.name(), response))
            }
            Plan::Generate { prompt } => match self.generator.generate(prompt.as_str()).await {
                Ok(result) => (QueryStatus::Answered, prompt, result),
                Err(e) => {
                    error!(error = %e, "generation failed");
                    self.record_failure(query, &prompt, &retrieval, &e);
                    return Err(e);
                }
            },
        };

        info!(status = %status, score = retrieval.score, "query completed");
        self.record(query, &prompt, &retrieval, status, result.clone());
        Ok(Answer { query_id: query.id, status, prompt, result, retrieval })
    }

    /// Answer `query` in streaming mode.
    ///
    /// Filtered outcomes return a stream holding the fixed response as a
    /// single fragment. Telemetry is written once the stream settles: a
    /// stream that fails mid-answer is recorded as `Failed`, one the caller
    /// drops early as `Answered` with `completed = false`.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval fails or the stream cannot be opened.
    /// Failures after the first fragment surface as stream items instead.
    #[instrument(skip_all, fields(query.id = %query.id))]
    pub async fn ask_stream(&self, query: &Query) -> Result<StreamingAnswer, ChatError> {
        let retrieval = self.retrieve_or_record(query).await?;

        let (status, prompt, stream) = match self.plan(query, &retrieval) {
            Plan::Fixed { status, prompt, response } => {
                let result = GenerationResult::fixed(self.generator.name(), response);
                (status, prompt, GenerationStream::ready(result))
            }
            Plan::Generate { prompt } => {
                match self.generator.generate_stream(prompt.as_str()).await {
                    Ok(stream) => (QueryStatus::Answered, prompt, stream),
                    Err(e) => {
                        error!(error = %e, "failed to open generation stream");
                        self.record_failure(query, &prompt, &retrieval, &e);
                        return Err(e);
                    }
                }
            }
        };

        info!(status = %status, score = retrieval.score, "streaming answer");
        if let Some(sink) = &self.telemetry {
            sink.record_deferred(
                run_context(query, &prompt, &retrieval, status),
                stream.completion(),
            );
        }
        Ok(StreamingAnswer { query_id: query.id, status, prompt, retrieval, stream })
    }

    async fn retrieve_or_record(&self, query: &Query) -> Result<Retrieval, ChatError> {
        match self.retrieve(&query.text).await {
            Ok(retrieval) => Ok(retrieval),
            Err(e) => {
                if let Some(sink) = &self.telemetry {
                    let context = RunContext {
                        run_id: query.id,
                        query: query.text.clone(),
                        prompt: String::new(),
                        retrieved_source: None,
                        similarity: 0.0,
                        status: QueryStatus::Failed,
                    };
                    let result = GenerationResult::failed(self.generator.name(), "", e.to_string());
                    sink.record(context, result);
                }
                Err(e)
            }
        }
    }

    fn plan(&self, query: &Query, retrieval: &Retrieval) -> Plan {
        let Some(top) = retrieval.top_match() else {
            warn!("no documents in corpus");
            return Plan::Fixed {
                status: QueryStatus::Filtered(FilterReason::NoDocument),
                prompt: Prompt::question_only(&query.text),
                response: self.config.no_document_text.clone(),
            };
        };

        if self.filter.is_restricted(top) {
            warn!(source_id = top.source_id(), "top match is restricted");
            return Plan::Fixed {
                status: QueryStatus::Filtered(FilterReason::Restricted),
                prompt: Prompt::question_only(&query.text),
                response: self.config.refusal_text.clone(),
            };
        }

        Plan::Generate { prompt: self.policy.build_prompt(&query.text, top.score, top.content()) }
    }

    fn record_failure(
        &self,
        query: &Query,
        prompt: &Prompt,
        retrieval: &Retrieval,
        e: &ChatError,
    ) {
        let result =
            GenerationResult::failed(self.generator.name(), e.partial_response(), e.to_string());
        self.record(query, prompt, retrieval, QueryStatus::Failed, result);
    }

    fn record(
        &self,
        query: &Query,
        prompt: &Prompt,
        retrieval: &Retrieval,
        status: QueryStatus,
        result: GenerationResult,
    ) {
        if let Some(sink) = &self.telemetry {
            sink.record(run_context(query, prompt, retrieval, status), result);
        }
    }
}

fn run_context(
    query: &Query,
    prompt: &Prompt,
    retrieval: &Retrieval,
    status: QueryStatus,
) -> RunContext {
    RunContext {
        run_id: query.id,
        query: query.text.clone(),
        prompt: prompt.text.clone(),
        retrieved_source: retrieval.top_match().map(|m| m.source_id().to_string()),
        similarity: retrieval.score,
        status,
    }
}

/// Builder for constructing a [`QueryPipeline`].
///
/// `document_store` and `generator` are required. The content filter
/// defaults to a [`SourceBlocklist`] of `config.restricted_sources`, and
/// telemetry is off unless a sink is given.
#[derive(Default)]
pub struct QueryPipelineBuilder {
    config: Option<RagConfig>,
    store: Option<Arc<dyn DocumentStore>>,
    filter: Option<Arc<dyn ContentFilter>>,
    generator: Option<Arc<dyn GenerationClient>>,
    telemetry: Option<TelemetrySink>,
}

impl QueryPipelineBuilder {
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn document_store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Replace the default source blocklist.
    pub fn content_filter(mut self, filter: Arc<dyn ContentFilter>) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn generator(mut self, generator: Arc<dyn GenerationClient>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn telemetry(mut self, sink: TelemetrySink) -> Self {
        self.telemetry = Some(sink);
        self
    }

    /// Build the [`QueryPipeline`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required component is missing
    /// or the config fails validation.
    pub fn build(self) -> Result<QueryPipeline, RagError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let store = self
            .store
            .ok_or_else(|| RagError::ConfigError("document_store is required".to_string()))?;
        let generator = self
            .generator
            .ok_or_else(|| RagError::ConfigError("generator is required".to_string()))?;
        let filter = self.filter.unwrap_or_else(|| {
            Arc::new(SourceBlocklist::new(config.restricted_sources.iter().cloned()))
        });

        Ok(QueryPipeline {
            policy: ContextPolicy::new(config.similarity_threshold),
            config,
            store,
            filter,
            generator,
            telemetry: self.telemetry,
        })
    }
}
