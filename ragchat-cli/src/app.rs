//! Wiring and the question loop.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::StreamExt;
use ragchat_core::Query;
use ragchat_model::OllamaClient;
use ragchat_rag::{
    CorpusSnapshot, EmbeddedDocumentStore, InMemoryVectorStore, OllamaEmbeddingProvider,
    QueryPipeline,
};
use ragchat_telemetry::ShutdownReport;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{error, info};

use crate::config::AppConfig;
use crate::display::diagnostics;

/// Prompt shown before every question in interactive mode.
pub const PROMPT: &str = "\nAsk something (type 'exit' to quit): ";

pub struct App {
    pipeline: QueryPipeline,
    streaming: bool,
    grace: Duration,
}

impl App {
    pub fn new(pipeline: QueryPipeline, streaming: bool, grace: Duration) -> Self {
        Self { pipeline, streaming, grace }
    }

    /// Build the pipeline described by `config`: load the corpus, check it
    /// against the embedding model, connect the generator and the tracker.
    pub async fn from_config(config: &AppConfig, streaming: bool) -> Result<Self> {
        let llm = &config.llm;
        let embedder = Arc::new(
            OllamaEmbeddingProvider::new(&llm.base_url)
                .with_model(llm.embedding_model.clone(), llm.embedding_dimensions),
        );

        let corpus = CorpusSnapshot::load(&config.corpus.path)
            .await
            .with_context(|| format!("failed to load corpus '{}'", config.corpus.path.display()))?;
        corpus.check_embedder(embedder.as_ref())?;

        let vectors = Arc::new(InMemoryVectorStore::new());
        corpus.load_into(vectors.as_ref(), &config.corpus.collection).await?;
        let store = EmbeddedDocumentStore::new(embedder, vectors, config.corpus.collection.clone());
        store.verify().await?;

        let generator = OllamaClient::new(llm.ollama_config())?;
        let sink = config.tracking.build_sink().context("failed to set up telemetry")?;
        info!(
            model = %llm.model_name,
            tracker = sink.tracker_name(),
            experiment = sink.experiment(),
            "pipeline ready"
        );

        let pipeline = QueryPipeline::builder()
            .config(config.retrieval.clone())
            .document_store(Arc::new(store))
            .generator(Arc::new(generator))
            .telemetry(sink)
            .build()?;
        Ok(Self::new(pipeline, streaming, config.tracking.shutdown_grace()))
    }

    /// Answer one question, writing the response and diagnostics to `out`.
    pub async fn answer<W: Write>(&self, text: &str, out: &mut W) -> Result<()> {
        let query = Query::new(text);

        if !self.streaming {
            let answer = self.pipeline.ask(&query).await?;
            writeln!(out, "\nModel response: {}", answer.response())?;
            write!(out, "{}", diagnostics(&answer.retrieval))?;
            return Ok(());
        }

        let mut answer = self.pipeline.ask_stream(&query).await?;
        write!(out, "\nModel response: ")?;
        while let Some(fragment) = answer.stream.next().await {
            match fragment {
                Ok(fragment) => {
                    write!(out, "{fragment}")?;
                    out.flush()?;
                }
                Err(e) => {
                    writeln!(out)?;
                    return Err(e.into());
                }
            }
        }
        writeln!(out)?;
        write!(out, "{}", diagnostics(&answer.retrieval))?;
        Ok(())
    }

    /// Read questions from `input` until `exit` or end of input.
    ///
    /// A failed question is reported and the loop continues.
    pub async fn interactive<R, W>(&self, input: R, out: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        let mut lines = input.lines();
        loop {
            write!(out, "{PROMPT}")?;
            out.flush()?;
            let Some(line) = lines.next_line().await? else {
                break;
            };
            let question = line.trim();
            if question.eq_ignore_ascii_case("exit") {
                writeln!(out, "Exiting chat...")?;
                break;
            }
            if question.is_empty() {
                continue;
            }
            if let Err(e) = self.answer(question, out).await {
                error!(error = %e, "query failed");
                writeln!(out, "Error: {e:#}")?;
            }
        }
        Ok(())
    }

    /// Wait up to the configured grace period for telemetry writes.
    pub async fn shutdown(self) -> ShutdownReport {
        match self.pipeline.telemetry() {
            Some(sink) => sink.shutdown(self.grace).await,
            None => ShutdownReport::default(),
        }
    }
}
