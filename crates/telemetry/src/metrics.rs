//! Thread-safe cache metrics: lock-free monotonic counters shared by the
//! cache store and the selection engine.

use crate::model::{EntryCost, MetricsSnapshot};
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide counters.
///
/// Every counter only ever increases. Readers get values through the
/// accessor methods or a [`MetricsSnapshot`]; there is no reset.
#[derive(Debug, Default)]
pub struct CacheMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    similar_hits: AtomicU64,
    negotiations: AtomicU64,
    negotiation_failures: AtomicU64,
    arbiter_degradations: AtomicU64,
    evictions: AtomicU64,
    tokens_spent: AtomicU64,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Recording ─────────────────────────────────────────────────────

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// A hit reached through the similarity arbiter.
    pub fn record_similar_hit(&self) {
        self.similar_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// A completed negotiation and what it cost.
    pub fn record_negotiation(&self, cost: &EntryCost) {
        self.negotiations.fetch_add(1, Ordering::Relaxed);
        self.tokens_spent
            .fetch_add(u64::from(cost.tokens_used), Ordering::Relaxed);
    }

    pub fn record_negotiation_failure(&self) {
        self.negotiation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_arbiter_degradation(&self) {
        self.arbiter_degradations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evictions(&self, count: usize) {
        self.evictions.fetch_add(count as u64, Ordering::Relaxed);
    }

    // ── Reading ───────────────────────────────────────────────────────

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn negotiations(&self) -> u64 {
        self.negotiations.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let hits = self.hits();
        let misses = self.misses();
        let lookups = hits + misses;
        MetricsSnapshot {
            hits,
            misses,
            similar_hits: self.similar_hits.load(Ordering::Relaxed),
            negotiations: self.negotiations(),
            negotiation_failures: self.negotiation_failures.load(Ordering::Relaxed),
            arbiter_degradations: self.arbiter_degradations.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            tokens_spent: self.tokens_spent.load(Ordering::Relaxed),
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
        }
    }
}
