//! Conversation summarizer with a literal fallback.
//!
//! Used when the caller supplies no precomputed summary. A failed or empty
//! summary never aborts a selection; the configured fallback text is used
//! instead.

use crate::key::strip_routing_tags;
use filescope_core::error::SelectionError;
use filescope_core::message::{Message, Role};
use filescope_core::model::{ContextModel, Prompt};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Default text used when no summary can be produced.
pub const DEFAULT_FALLBACK: &str = filescope_config::DEFAULT_SUMMARY_FALLBACK;

/// Only the tail of a conversation is shown to the summarizer.
const MAX_TRANSCRIPT_MESSAGES: usize = 20;

const SYSTEM_PROMPT: &str = "Summarize the conversation between a developer and a coding assistant \
in a few sentences. Focus on what is being built, which parts of the project were discussed, and \
what the developer wants next. Reply with the summary only.";

pub struct Summarizer {
    model: Arc<dyn ContextModel>,
    timeout: Option<Duration>,
    fallback: String,
}

impl Summarizer {
    pub fn new(model: Arc<dyn ContextModel>) -> Self {
        Self {
            model,
            timeout: None,
            fallback: DEFAULT_FALLBACK.to_string(),
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = fallback.into();
        self
    }

    /// Summarize, or fail with `SummaryGenerationFailed`.
    pub async fn try_summarize(&self, messages: &[Message]) -> Result<String, SelectionError> {
        let prompt = build_prompt(messages);
        let call = self.model.summarize(&prompt);

        let completion = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                SelectionError::SummaryGenerationFailed(format!(
                    "timed out after {}s",
                    limit.as_secs_f32()
                ))
            })?,
            None => call.await,
        }
        .map_err(|e| SelectionError::SummaryGenerationFailed(e.to_string()))?;

        let summary = completion.text.trim();
        if summary.is_empty() {
            return Err(SelectionError::SummaryGenerationFailed(
                "model returned an empty summary".into(),
            ));
        }
        Ok(summary.to_string())
    }

    /// Summarize, degrading to the fallback text on any failure.
    pub async fn summarize(&self, messages: &[Message]) -> String {
        match self.try_summarize(messages).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(error = %e, "Using fallback conversation summary");
                self.fallback.clone()
            }
        }
    }
}

/// Transcript of the last messages, system turns skipped, routing tags removed.
pub fn build_prompt(messages: &[Message]) -> Prompt {
    let visible: Vec<&Message> = messages.iter().filter(|m| m.role != Role::System).collect();
    let tail = &visible[visible.len().saturating_sub(MAX_TRANSCRIPT_MESSAGES)..];

    let mut transcript = String::new();
    for message in tail {
        let speaker = match message.role {
            Role::User => "Developer",
            Role::Assistant => "Assistant",
            Role::System => continue,
        };
        let text = strip_routing_tags(&message.text());
        if text.is_empty() {
            continue;
        }
        transcript.push_str(&format!("{speaker}: {text}\n\n"));
    }

    if transcript.is_empty() {
        transcript.push_str("(empty conversation)\n");
    }
    Prompt::new(SYSTEM_PROMPT, transcript.trim_end().to_string())
}
