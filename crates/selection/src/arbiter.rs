//! Similarity arbiter: on an exact-key miss, ask a model whether the current
//! request repeats one of the most recently cached ones.
//!
//! The arbiter never fails. A provider error, a timeout or an unparseable
//! verdict is treated as "no match" and the turn falls through to full
//! negotiation.

use crate::key::CacheKey;
use crate::store::SimilarityCandidate;
use filescope_core::error::ProviderError;
use filescope_core::model::{ContextModel, Prompt};
use filescope_telemetry::CacheMetrics;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Upper bound on candidates offered per call, whatever the store holds.
pub const MAX_CANDIDATES: usize = filescope_config::MAX_SIMILARITY_CANDIDATES;

/// Reply meaning "none of the candidates".
pub const NO_MATCH: &str = "none";

const SYSTEM_PROMPT: &str = "You decide whether a developer's new request to a coding assistant asks \
for the same thing as an earlier request. Two requests match only if the same project files would be \
needed to answer them; wording, politeness and small rephrasings do not matter.\n\n\
Reply with exactly one token: the number of the matching earlier request, or `none` if no earlier \
request matches. Do not explain.";

pub struct SimilarityArbiter {
    model: Arc<dyn ContextModel>,
    timeout: Option<Duration>,
    max_candidates: usize,
    metrics: Arc<CacheMetrics>,
}

impl SimilarityArbiter {
    pub fn new(model: Arc<dyn ContextModel>, metrics: Arc<CacheMetrics>) -> Self {
        Self {
            model,
            timeout: None,
            max_candidates: MAX_CANDIDATES,
            metrics,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Offer fewer candidates than the default; clamped to `1..=MAX_CANDIDATES`.
    pub fn with_max_candidates(mut self, max_candidates: usize) -> Self {
        self.max_candidates = max_candidates.clamp(1, MAX_CANDIDATES);
        self
    }

    pub fn max_candidates(&self) -> usize {
        self.max_candidates
    }

    /// Key of the candidate the model judged equivalent to `essence`, if any.
    ///
    /// Only the first `max_candidates` candidates are offered. No call is made
    /// when there are none.
    pub async fn find_similar(
        &self,
        essence: &str,
        candidates: &[SimilarityCandidate],
    ) -> Option<CacheKey> {
        let offered = &candidates[..candidates.len().min(self.max_candidates)];
        if offered.is_empty() {
            return None;
        }

        let prompt = build_prompt(essence, offered);
        let started = std::time::Instant::now();
        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, self.model.judge_similarity(&prompt)).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(format!(
                    "similarity judgement exceeded {}s",
                    limit.as_secs_f32()
                ))),
            },
            None => self.model.judge_similarity(&prompt).await,
        };

        let completion = match result {
            Ok(completion) => completion,
            Err(e) => {
                self.metrics.record_arbiter_degradation();
                warn!(error = %e, "Similarity arbiter unavailable, treating as no match");
                return None;
            }
        };

        let verdict = parse_verdict(&completion.text, offered.len());
        debug!(
            candidates = offered.len(),
            reply = %completion.text.trim(),
            verdict = ?verdict,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Similarity arbiter verdict"
        );
        verdict.map(|index| offered[index].key.clone())
    }
}

/// Numbered candidate list plus the current request.
pub fn build_prompt(essence: &str, candidates: &[SimilarityCandidate]) -> Prompt {
    let mut user = String::from("Earlier requests:\n");
    for (i, candidate) in candidates.iter().enumerate() {
        user.push_str(&format!("{}. {}\n", i + 1, candidate.essence));
    }
    user.push_str(&format!(
        "\nNew request:\n{essence}\n\nAnswer with a number from 1 to {} or `{NO_MATCH}`.",
        candidates.len()
    ));
    Prompt::new(SYSTEM_PROMPT, user)
}

/// Zero-based candidate index named by a reply, or `None`.
///
/// Replies are 1-based. The sentinel, `0`, anything out of range and
/// anything that is not a bare integer all mean no match.
pub fn parse_verdict(reply: &str, candidate_count: usize) -> Option<usize> {
    let normalized = reply.trim().trim_matches('`').trim().to_lowercase();
    let normalized = normalized.trim_end_matches('.');
    if normalized == NO_MATCH {
        return None;
    }
    let index: usize = normalized.parse().ok()?;
    (1..=candidate_count).contains(&index).then(|| index - 1)
}
