//! Two-channel streaming output: a sequence of text fragments plus a
//! separately awaitable completion result.
//!
//! A producer creates a [`CompletionSender`]/[`Completion`] pair with
//! [`completion_channel`], pushes every fragment it yields through the
//! sender, and calls [`CompletionSender::complete`] when the terminal chunk
//! arrives, or [`CompletionSender::fail`] when the producer hits an error.
//! If the producer is dropped without either (the consumer abandoned the
//! stream) the sender settles the completion with the partial text,
//! `completed = false` and no error.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future::{BoxFuture, FutureExt, Shared};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use tokio::sync::oneshot;

use crate::error::{ChatError, Result};
use crate::generation::GenerationResult;

/// The fragment side of a [`GenerationStream`].
pub type FragmentStream = BoxStream<'static, Result<String>>;

/// Settles exactly once with the final (or partial) [`GenerationResult`].
///
/// Cloning is cheap; every clone observes the same value.
#[derive(Clone)]
pub struct Completion {
    inner: Shared<BoxFuture<'static, Option<GenerationResult>>>,
}

impl Completion {
    /// A completion that is already settled.
    pub fn ready(result: GenerationResult) -> Self {
        Self { inner: futures::future::ready(Some(result)).boxed().shared() }
    }

    /// Wait for the result. `None` only if the producer vanished without a sender.
    pub async fn wait(self) -> Option<GenerationResult> {
        self.inner.await
    }

    /// The settled value, if the completion has already been awaited to the end.
    pub fn peek(&self) -> Option<GenerationResult> {
        self.inner.peek().cloned().flatten()
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion").field("settled", &self.inner.peek().is_some()).finish()
    }
}

/// Producer half of a completion.
pub struct CompletionSender {
    tx: Option<oneshot::Sender<GenerationResult>>,
    model: String,
    received: String,
}

impl CompletionSender {
    /// Record a fragment that has been handed to the consumer.
    pub fn push_fragment(&mut self, fragment: &str) {
        self.received.push_str(fragment);
    }

    /// Text pushed so far.
    pub fn received(&self) -> &str {
        &self.received
    }

    /// Settle the completion with the final result.
    pub fn complete(mut self, result: GenerationResult) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(result);
        }
    }

    /// Settle the completion as failed, keeping the text received so far.
    pub fn fail(mut self, error: impl Into<String>) {
        if let Some(tx) = self.tx.take() {
            let failed = GenerationResult::failed(
                std::mem::take(&mut self.model),
                std::mem::take(&mut self.received),
                error,
            );
            let _ = tx.send(failed);
        }
    }
}

impl Drop for CompletionSender {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let partial = GenerationResult::partial(
                std::mem::take(&mut self.model),
                std::mem::take(&mut self.received),
            );
            let _ = tx.send(partial);
        }
    }
}

impl fmt::Debug for CompletionSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionSender")
            .field("model", &self.model)
            .field("received_len", &self.received.len())
            .field("settled", &self.tx.is_none())
            .finish()
    }
}

/// Create a connected sender/completion pair for a stream from `model`.
pub fn completion_channel(model: impl Into<String>) -> (CompletionSender, Completion) {
    let (tx, rx) = oneshot::channel();
    let inner = async move { rx.await.ok() }.boxed().shared();
    let sender = CompletionSender { tx: Some(tx), model: model.into(), received: String::new() };
    (sender, Completion { inner })
}

/// A live generation: fragments to surface immediately, and a completion
/// that carries model metadata once the fragments run out.
///
/// Dropping the stream before it is exhausted drops the underlying
/// connection; the completion then settles with `completed = false`.
pub struct GenerationStream {
    fragments: FragmentStream,
    completion: Completion,
}

impl GenerationStream {
    /// Pair a fragment stream with its completion.
    pub fn new(fragments: FragmentStream, completion: Completion) -> Self {
        Self { fragments, completion }
    }

    /// A stream that yields the result text as a single fragment and is
    /// already settled.
    pub fn ready(result: GenerationResult) -> Self {
        let fragments: FragmentStream = if result.response.is_empty() {
            stream::empty().boxed()
        } else {
            stream::once(futures::future::ready(Ok(result.response.clone()))).boxed()
        };
        Self { fragments, completion: Completion::ready(result) }
    }

    /// A handle on the completion, usable after the stream has been consumed.
    pub fn completion(&self) -> Completion {
        self.completion.clone()
    }

    /// Split into the fragment stream and the completion.
    pub fn into_parts(self) -> (FragmentStream, Completion) {
        (self.fragments, self.completion)
    }

    /// Drain every fragment and return the settled result.
    ///
    /// # Errors
    ///
    /// Returns the first fragment error; transport errors carry the partial text.
    pub async fn collect_result(self) -> Result<GenerationResult> {
        let Self { mut fragments, completion } = self;
        while let Some(fragment) = fragments.next().await {
            fragment?;
        }
        drop(fragments);
        completion
            .wait()
            .await
            .ok_or_else(|| ChatError::transport("stream finished without a completion result"))
    }
}

impl Stream for GenerationStream {
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.fragments.poll_next_unpin(cx)
    }
}

impl fmt::Debug for GenerationStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationStream").field("completion", &self.completion).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dropped_sender_settles_with_partial_text() {
        let (mut tx, completion) = completion_channel("llama3.2");
        tx.push_fragment("Team ");
        tx.push_fragment("A");
        drop(tx);

        let result = completion.wait().await.unwrap();
        assert!(!result.completed);
        assert!(!result.is_failed());
        assert_eq!(result.response, "Team A");
        assert_eq!(result.model, "llama3.2");
    }

    #[tokio::test]
    async fn failed_sender_carries_the_error() {
        let (mut tx, completion) = completion_channel("llama3.2");
        tx.push_fragment("Team");
        tx.fail("stream interrupted");

        let result = completion.wait().await.unwrap();
        assert!(!result.completed);
        assert_eq!(result.response, "Team");
        assert_eq!(result.error.as_deref(), Some("stream interrupted"));
    }

    #[tokio::test]
    async fn completed_sender_wins_over_drop() {
        let (mut tx, completion) = completion_channel("llama3.2");
        tx.push_fragment("done");
        let final_result = GenerationResult {
            model: "llama3.2".into(),
            response: "done".into(),
            generated_tokens: 1,
            completed: true,
            ..Default::default()
        };
        tx.complete(final_result.clone());

        assert_eq!(completion.clone().wait().await, Some(final_result.clone()));
        assert_eq!(completion.peek(), Some(final_result));
    }

    #[tokio::test]
    async fn ready_stream_yields_text_once() {
        let stream = GenerationStream::ready(GenerationResult::fixed("m", "no comment"));
        let completion = stream.completion();
        let fragments: Vec<_> = stream.collect().await;

        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].as_ref().unwrap(), "no comment");
        assert!(completion.wait().await.unwrap().completed);
    }

    #[tokio::test]
    async fn collect_result_surfaces_fragment_errors() {
        let (_tx, completion) = completion_channel("m");
        let fragments: FragmentStream = stream::iter(vec![
            Ok("half".to_string()),
            Err(ChatError::transport_with_partial("connection reset", "half")),
        ])
        .boxed();

        let err = GenerationStream::new(fragments, completion).collect_result().await.unwrap_err();
        assert_eq!(err.partial_response(), "half");
    }
}
