//! Shared test helpers for selection tests.

use filescope_core::error::ProviderError;
use filescope_core::model::{Completion, ContextModel, Prompt};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
struct Capability {
    replies: VecDeque<Result<Completion, ProviderError>>,
    prompts: Vec<Prompt>,
}

impl Capability {
    fn next(&mut self, prompt: &Prompt, name: &str) -> Result<Completion, ProviderError> {
        self.prompts.push(prompt.clone());
        self.replies.pop_front().unwrap_or_else(|| {
            Err(ProviderError::NotConfigured(format!(
                "ScriptedModel: no scripted {name} reply left"
            )))
        })
    }
}

/// A `ContextModel` answering from per-capability reply queues.
///
/// Every call records its prompt. An exhausted queue answers with
/// `ProviderError::NotConfigured`.
#[derive(Default)]
pub struct ScriptedModel {
    summaries: Mutex<Capability>,
    selections: Mutex<Capability>,
    similarities: Mutex<Capability>,
    delay: Option<Duration>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long (on the tokio clock) before every reply.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_summary(&self, reply: Result<&str, ProviderError>) {
        push(&self.summaries, reply, 0);
    }

    pub fn push_selection(&self, reply: Result<&str, ProviderError>) {
        push(&self.selections, reply, 0);
    }

    pub fn push_selection_tokens(&self, reply: Result<&str, ProviderError>, tokens: u32) {
        push(&self.selections, reply, tokens);
    }

    pub fn push_similarity(&self, reply: Result<&str, ProviderError>) {
        push(&self.similarities, reply, 0);
    }

    pub fn summary_calls(&self) -> usize {
        self.summaries.lock().unwrap().prompts.len()
    }

    pub fn selection_calls(&self) -> usize {
        self.selections.lock().unwrap().prompts.len()
    }

    pub fn similarity_calls(&self) -> usize {
        self.similarities.lock().unwrap().prompts.len()
    }

    #[allow(dead_code)]
    pub fn last_selection_prompt(&self) -> Option<Prompt> {
        self.selections.lock().unwrap().prompts.last().cloned()
    }

    pub fn last_similarity_prompt(&self) -> Option<Prompt> {
        self.similarities.lock().unwrap().prompts.last().cloned()
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

fn push(capability: &Mutex<Capability>, reply: Result<&str, ProviderError>, tokens: u32) {
    capability
        .lock()
        .unwrap()
        .replies
        .push_back(reply.map(|text| Completion::new(text, tokens)));
}

#[async_trait::async_trait]
impl ContextModel for ScriptedModel {
    async fn summarize(&self, prompt: &Prompt) -> Result<Completion, ProviderError> {
        self.pause().await;
        self.summaries.lock().unwrap().next(prompt, "summary")
    }

    async fn select_files(&self, prompt: &Prompt) -> Result<Completion, ProviderError> {
        self.pause().await;
        self.selections.lock().unwrap().next(prompt, "selection")
    }

    async fn judge_similarity(&self, prompt: &Prompt) -> Result<Completion, ProviderError> {
        self.pause().await;
        self.similarities.lock().unwrap().next(prompt, "similarity")
    }
}
