//! ContextModel trait: the text-completion capabilities the selection core
//! needs from an LLM.
//!
//! Three single-shot capabilities, each taking a fully rendered prompt:
//! - `summarize`: compress a conversation into a short running summary
//! - `select_files`: answer the context negotiation protocol
//! - `judge_similarity`: pick a near-duplicate cached request, or none
//!
//! Prompt construction and response parsing live with the callers; an
//! implementation only moves text to a model and back. Fakes implementing
//! this trait drive the selection tests deterministically.

use crate::error::ProviderError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A two-part prompt: system instructions plus one user turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }
}

/// Raw model output plus what it cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,

    /// Total tokens reported by the backend (0 when unknown)
    #[serde(default)]
    pub tokens_used: u32,
}

impl Completion {
    pub fn new(text: impl Into<String>, tokens_used: u32) -> Self {
        Self {
            text: text.into(),
            tokens_used,
        }
    }
}

#[async_trait]
pub trait ContextModel: Send + Sync {
    /// Produce a compact running summary of a conversation.
    async fn summarize(&self, prompt: &Prompt) -> Result<Completion, ProviderError>;

    /// Answer a context negotiation prompt with include/exclude directives.
    async fn select_files(&self, prompt: &Prompt) -> Result<Completion, ProviderError>;

    /// Judge whether a request matches one of the numbered candidates.
    async fn judge_similarity(&self, prompt: &Prompt) -> Result<Completion, ProviderError>;
}
