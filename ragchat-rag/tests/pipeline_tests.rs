//! Query pipeline behaviour against stub stores, generators and trackers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use ragchat_core::{
    ChatError, FilterReason, GenerationClient, GenerationResult, GenerationStream, Query,
    QueryStatus,
};
use ragchat_model::MockGenerator;
use ragchat_rag::{
    Document, DocumentStore, NO_DOCUMENT_TEXT, QueryPipeline, RagConfig, RagError,
    SimilarityMatch,
};
use ragchat_telemetry::{InMemoryTracker, NO_DOCUMENT_SOURCE, TelemetrySink};
use tokio::time::Instant;

const GRACE: Duration = Duration::from_secs(2);

/// Returns a fixed list of matches regardless of the query.
struct StubStore {
    matches: Vec<SimilarityMatch>,
}

impl StubStore {
    fn empty() -> Self {
        Self { matches: Vec::new() }
    }

    fn with(entries: &[(&str, &str, f32)]) -> Self {
        let matches = entries
            .iter()
            .enumerate()
            .map(|(i, (source_id, content, score))| SimilarityMatch {
                document: Arc::new(Document {
                    id: i.to_string(),
                    source_id: source_id.to_string(),
                    content: content.to_string(),
                    embedding: vec![1.0, 0.0],
                    metadata: HashMap::new(),
                }),
                score: *score,
            })
            .collect();
        Self { matches }
    }
}

#[async_trait]
impl DocumentStore for StubStore {
    async fn search(&self, _query: &str, k: usize) -> ragchat_rag::Result<Vec<SimilarityMatch>> {
        Ok(self.matches.iter().take(k).cloned().collect())
    }
}

struct UnreachableStore;

#[async_trait]
impl DocumentStore for UnreachableStore {
    async fn search(&self, _query: &str, _k: usize) -> ragchat_rag::Result<Vec<SimilarityMatch>> {
        Err(RagError::VectorStoreError {
            backend: "chroma".into(),
            message: "connection refused".into(),
        })
    }
}

/// Answers with a fixed text and reports the prompt length as the number of
/// generated tokens.
struct PromptLengthGenerator;

impl PromptLengthGenerator {
    fn result_for(prompt: &str) -> GenerationResult {
        GenerationResult {
            model: "echo".into(),
            response: "Team A won the match 3-1.".into(),
            created_at: "2025-03-01T10:00:00Z".into(),
            total_duration_ns: 1_000,
            prompt_tokens: 7,
            generated_tokens: prompt.len() as u64,
            completed: true,
            error: None,
        }
    }
}

#[async_trait]
impl GenerationClient for PromptLengthGenerator {
    fn name(&self) -> &str {
        "echo"
    }

    async fn generate(&self, prompt: &str) -> ragchat_core::Result<GenerationResult> {
        Ok(Self::result_for(prompt))
    }

    async fn generate_stream(&self, prompt: &str) -> ragchat_core::Result<GenerationStream> {
        Ok(GenerationStream::ready(Self::result_for(prompt)))
    }
}

fn config(threshold: f32) -> RagConfig {
    RagConfig::builder()
        .top_k(4)
        .similarity_threshold(threshold)
        .restrict_source("00-Sports-Articles/vulgar.txt")
        .build()
        .unwrap()
}

fn pipeline(
    store: impl DocumentStore + 'static,
    generator: Arc<dyn GenerationClient>,
    tracker: &InMemoryTracker,
) -> QueryPipeline {
    QueryPipeline::builder()
        .config(config(0.35))
        .document_store(Arc::new(store))
        .generator(generator)
        .telemetry(TelemetrySink::new(Arc::new(tracker.clone()), "rag-chat"))
        .build()
        .unwrap()
}

async fn drain(pipeline: &QueryPipeline) {
    if let Some(sink) = pipeline.telemetry() {
        let report = sink.shutdown(GRACE).await;
        assert_eq!(report.abandoned, 0);
    }
}

#[tokio::test]
async fn empty_corpus_returns_sentinel_without_generating() {
    let tracker = InMemoryTracker::new();
    let mock = Arc::new(MockGenerator::new("llama3.2", ["unused"]));
    let pipeline = pipeline(StubStore::empty(), mock.clone(), &tracker);
    let query = Query::new("football game recap");

    let answer = pipeline.ask(&query).await.unwrap();

    assert_eq!(answer.status, QueryStatus::Filtered(FilterReason::NoDocument));
    assert_eq!(answer.retrieval.context, NO_DOCUMENT_TEXT);
    assert_eq!(answer.retrieval.score, 0.0);
    assert_eq!(answer.response(), NO_DOCUMENT_TEXT);
    assert!(answer.top_match().is_none());
    assert_eq!(mock.calls(), 0);

    drain(&pipeline).await;
    let record = tracker.get(&query.id).unwrap();
    assert_eq!(record.retrieved_source, NO_DOCUMENT_SOURCE);
    assert_eq!(record.status, QueryStatus::Filtered(FilterReason::NoDocument));
}

#[tokio::test]
async fn restricted_top_match_is_refused_without_generating() {
    let tracker = InMemoryTracker::new();
    let mock = Arc::new(MockGenerator::new("llama3.2", ["unused"]));
    let store = StubStore::with(&[
        ("00-Sports-Articles/vulgar.txt", "rude words", 0.05),
        ("00-Sports-Articles/match.txt", "Team A won 3-1", 0.10),
    ]);
    let pipeline = pipeline(store, mock.clone(), &tracker);
    let query = Query::new("tell me something rude");

    let answer = pipeline.ask(&query).await.unwrap();
    assert_eq!(answer.status, QueryStatus::Filtered(FilterReason::Restricted));
    assert_eq!(answer.response(), "no comment");
    assert_eq!(answer.prompt.text, "Question: tell me something rude");
    assert_eq!(answer.retrieval.matches.len(), 2);

    let streamed = pipeline.ask_stream(&Query::new("tell me something rude")).await.unwrap();
    let fragments: Vec<String> = streamed.stream.map(|f| f.unwrap()).collect().await;
    assert_eq!(fragments, vec!["no comment".to_string()]);

    assert_eq!(mock.calls(), 0);
    drain(&pipeline).await;
    assert_eq!(tracker.get(&query.id).unwrap().response, "no comment");
}

#[tokio::test]
async fn restricted_document_ranked_second_passes_through() {
    let tracker = InMemoryTracker::new();
    let mock = Arc::new(MockGenerator::new("llama3.2", ["ok"]));
    let store = StubStore::with(&[
        ("00-Sports-Articles/match.txt", "Team A won 3-1", 0.10),
        ("00-Sports-Articles/vulgar.txt", "rude words", 0.20),
    ]);
    let pipeline = pipeline(store, mock.clone(), &tracker);

    let answer = pipeline.ask(&Query::new("recap")).await.unwrap();
    assert_eq!(answer.status, QueryStatus::Answered);
    assert_eq!(mock.calls(), 1);
}

#[tokio::test]
async fn threshold_decides_whether_context_is_sent() {
    for (score, included) in [(0.20, true), (0.35, true), (0.50, false)] {
        let tracker = InMemoryTracker::new();
        let mock = Arc::new(MockGenerator::new("llama3.2", ["ok"]));
        let store = StubStore::with(&[("00-Sports-Articles/match.txt", "Team A won 3-1", score)]);
        let pipeline = pipeline(store, mock.clone(), &tracker);

        let answer = pipeline.ask(&Query::new("football game recap")).await.unwrap();

        let sent = &mock.prompts()[0];
        assert_eq!(sent.contains("Team A won 3-1"), included, "score {score}");
        assert_eq!(answer.prompt.includes_context, included);
        assert_eq!(&answer.prompt.text, sent);
    }
}

#[tokio::test]
async fn football_recap_end_to_end() {
    let tracker = InMemoryTracker::new();
    let store = StubStore::with(&[("00-Sports-Articles/match.txt", "Team A won 3-1", 0.1)]);
    let pipeline = pipeline(store, Arc::new(PromptLengthGenerator), &tracker);
    let query = Query::new("football game recap");

    let answer = pipeline.ask(&query).await.unwrap();

    let expected_prompt = "Context: Team A won 3-1\n\nQuestion: football game recap";
    assert_eq!(answer.prompt.text, expected_prompt);
    assert_eq!(answer.status, QueryStatus::Answered);
    assert_eq!(answer.result.generated_tokens, expected_prompt.len() as u64);

    drain(&pipeline).await;
    let record = tracker.get(&query.id).unwrap();
    assert_eq!(record.generated_tokens, expected_prompt.len() as u64);
    assert_eq!(record.prompt, expected_prompt);
    assert_eq!(record.retrieved_source, "00-Sports-Articles/match.txt");
    assert_eq!(record.similarity, 0.1);
    assert_eq!(record.model, "echo");
    assert_eq!(record.created_at, "2025-03-01T10:00:00Z");
    assert!(record.completed);
}

#[tokio::test(start_paused = true)]
async fn slow_telemetry_does_not_delay_the_answer() {
    let tracker = InMemoryTracker::new().with_latency(Duration::from_millis(50));
    let store = StubStore::with(&[("00-Sports-Articles/match.txt", "Team A won 3-1", 0.1)]);
    let pipeline = pipeline(store, Arc::new(MockGenerator::new("llama3.2", ["ok"])), &tracker);
    let query = Query::new("football game recap");

    let started = Instant::now();
    pipeline.ask(&query).await.unwrap();
    assert!(started.elapsed() < Duration::from_millis(5));
    assert!(tracker.get(&query.id).is_none());

    drain(&pipeline).await;
    assert!(tracker.get(&query.id).is_some());
}

#[tokio::test]
async fn generation_failure_is_propagated_and_recorded() {
    let tracker = InMemoryTracker::new();
    let store = StubStore::with(&[("00-Sports-Articles/match.txt", "Team A won 3-1", 0.1)]);
    let mock = Arc::new(MockGenerator::failing("llama3.2", "connection refused"));
    let pipeline = pipeline(store, mock, &tracker);
    let query = Query::new("football game recap");

    let err = pipeline.ask(&query).await.unwrap_err();
    assert!(matches!(err, ChatError::Transport { .. }));
    assert!(pipeline.ask_stream(&Query::new("again")).await.is_err());

    drain(&pipeline).await;
    let record = tracker.get(&query.id).unwrap();
    assert_eq!(record.status, QueryStatus::Failed);
    assert!(!record.completed);
    assert!(record.error.unwrap().contains("connection refused"));
}

#[tokio::test]
async fn store_failure_is_a_retrieval_error() {
    let tracker = InMemoryTracker::new();
    let mock = Arc::new(MockGenerator::new("llama3.2", ["unused"]));
    let pipeline = pipeline(UnreachableStore, mock.clone(), &tracker);
    let query = Query::new("football game recap");

    let err = pipeline.ask(&query).await.unwrap_err();
    assert!(matches!(err, ChatError::Retrieval { ref backend, .. } if backend == "chroma"));
    assert_eq!(mock.calls(), 0);

    drain(&pipeline).await;
    assert_eq!(tracker.get(&query.id).unwrap().status, QueryStatus::Failed);
}

#[tokio::test]
async fn streamed_answer_is_recorded_once_drained() {
    let tracker = InMemoryTracker::new();
    let store = StubStore::with(&[("00-Sports-Articles/match.txt", "Team A won 3-1", 0.1)]);
    let mock = Arc::new(MockGenerator::new("llama3.2", ["Team", " A", " won"]));
    let pipeline = pipeline(store, mock, &tracker);
    let query = Query::new("football game recap");

    let answer = pipeline.ask_stream(&query).await.unwrap();
    assert_eq!(answer.status, QueryStatus::Answered);
    let text: String = answer.stream.map(|f| f.unwrap()).collect::<Vec<_>>().await.concat();
    assert_eq!(text, "Team A won");

    drain(&pipeline).await;
    let record = tracker.get(&query.id).unwrap();
    assert!(record.completed);
    assert_eq!(record.response, "Team A won");
    assert_eq!(record.generated_tokens, 3);
}

#[tokio::test]
async fn abandoned_stream_is_recorded_as_incomplete() {
    let tracker = InMemoryTracker::new();
    let store = StubStore::with(&[("00-Sports-Articles/match.txt", "Team A won 3-1", 0.1)]);
    let mock = Arc::new(MockGenerator::new("llama3.2", ["Team", " A", " won"]));
    let pipeline = pipeline(store, mock, &tracker);
    let query = Query::new("football game recap");

    let mut answer = pipeline.ask_stream(&query).await.unwrap();
    assert_eq!(answer.stream.next().await.unwrap().unwrap(), "Team");
    drop(answer);

    drain(&pipeline).await;
    let record = tracker.get(&query.id).unwrap();
    assert_eq!(record.status, QueryStatus::Answered);
    assert!(!record.completed);
    assert!(record.error.is_none());
    assert_eq!(record.response, "Team");
}

#[tokio::test]
async fn stream_failing_mid_answer_is_recorded_as_failed() {
    let tracker = InMemoryTracker::new();
    let store = StubStore::with(&[("00-Sports-Articles/match.txt", "Team A won 3-1", 0.1)]);
    let mock = Arc::new(
        MockGenerator::new("llama3.2", ["Team", " A", " won"])
            .with_interruption(1, "stream interrupted"),
    );
    let pipeline = pipeline(store, mock, &tracker);
    let query = Query::new("football game recap");

    let mut answer = pipeline.ask_stream(&query).await.unwrap();
    assert_eq!(answer.stream.next().await.unwrap().unwrap(), "Team");
    let err = answer.stream.next().await.unwrap().unwrap_err();
    assert!(matches!(err, ChatError::Transport { .. }));
    assert!(answer.stream.next().await.is_none());
    drop(answer);

    drain(&pipeline).await;
    let record = tracker.get(&query.id).unwrap();
    assert_eq!(record.status, QueryStatus::Failed);
    assert!(!record.completed);
    assert_eq!(record.response, "Team");
    assert!(record.error.unwrap().contains("stream interrupted"));
}

#[tokio::test]
async fn builder_requires_store_and_generator() {
    let missing_store =
        QueryPipeline::builder().generator(Arc::new(MockGenerator::new("m", ["x"]))).build();
    assert!(matches!(missing_store, Err(RagError::ConfigError(_))));

    let missing_generator =
        QueryPipeline::builder().document_store(Arc::new(StubStore::empty())).build();
    assert!(matches!(missing_generator, Err(RagError::ConfigError(_))));
}
