//! Scripted generation client for tests and offline demos.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use ragchat_core::{
    ChatError, GenerationClient, GenerationResult, GenerationStream, Result, completion_channel,
};

/// A [`GenerationClient`] that replays a fixed list of fragments.
///
/// The blocking mode returns the concatenated fragments; the streaming mode
/// yields them one by one. Token counts default to the number of prompt words
/// and the number of fragments. Every prompt is recorded for inspection.
#[derive(Debug)]
pub struct MockGenerator {
    model: String,
    fragments: Vec<String>,
    prompt_tokens: Option<u64>,
    fragment_delay: Option<Duration>,
    failure: Option<String>,
    interruption: Option<(usize, String)>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl MockGenerator {
    /// A mock that answers with `fragments`.
    pub fn new<I, S>(model: impl Into<String>, fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            model: model.into(),
            fragments: fragments.into_iter().map(Into::into).collect(),
            prompt_tokens: None,
            fragment_delay: None,
            failure: None,
            interruption: None,
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// A mock whose every call fails with a transport error.
    pub fn failing(model: impl Into<String>, message: impl Into<String>) -> Self {
        let mut mock = Self::new(model, Vec::<String>::new());
        mock.failure = Some(message.into());
        mock
    }

    /// Fail with a transport error after `after` fragments have been
    /// delivered, as if the connection dropped mid-answer.
    pub fn with_interruption(mut self, after: usize, message: impl Into<String>) -> Self {
        self.interruption = Some((after, message.into()));
        self
    }

    /// Report a fixed prompt token count.
    pub fn with_prompt_tokens(mut self, tokens: u64) -> Self {
        self.prompt_tokens = Some(tokens);
        self
    }

    /// Sleep before each streamed fragment.
    pub fn with_fragment_delay(mut self, delay: Duration) -> Self {
        self.fragment_delay = Some(delay);
        self
    }

    /// Number of generation calls made so far, in either mode.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    fn begin(&self, prompt: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        match &self.failure {
            Some(message) => Err(ChatError::transport(message.clone())),
            None => Ok(()),
        }
    }

    fn result_for(&self, prompt: &str) -> GenerationResult {
        GenerationResult {
            model: self.model.clone(),
            response: self.fragments.concat(),
            created_at: "2025-01-01T00:00:00Z".to_string(),
            total_duration_ns: 0,
            prompt_tokens: self
                .prompt_tokens
                .unwrap_or_else(|| prompt.split_whitespace().count() as u64),
            generated_tokens: self.fragments.len() as u64,
            completed: true,
            error: None,
        }
    }
}

#[async_trait]
impl GenerationClient for MockGenerator {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<GenerationResult> {
        self.begin(prompt)?;
        if let Some((after, message)) = &self.interruption {
            let delivered: String =
                self.fragments.iter().take(*after).map(String::as_str).collect();
            return Err(ChatError::transport_with_partial(message.clone(), delivered));
        }
        Ok(self.result_for(prompt))
    }

    async fn generate_stream(&self, prompt: &str) -> Result<GenerationStream> {
        self.begin(prompt)?;
        let result = self.result_for(prompt);
        let fragments = self.fragments.clone();
        let delay = self.fragment_delay;
        let interruption = self.interruption.clone();
        let (mut sender, completion) = completion_channel(self.model.as_str());

        let stream = async_stream::stream! {
            for (i, fragment) in fragments.into_iter().enumerate() {
                if let Some((after, message)) = &interruption {
                    if i == *after {
                        let err =
                            ChatError::transport_with_partial(message.clone(), sender.received());
                        sender.fail(err.to_string());
                        yield Err(err);
                        return;
                    }
                }
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                sender.push_fragment(&fragment);
                yield Ok(fragment);
            }
            sender.complete(result);
        };

        Ok(GenerationStream::new(stream.boxed(), completion))
    }
}
