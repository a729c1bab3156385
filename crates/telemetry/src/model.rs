//! Data model for entry costs, sweep reports, and metric snapshots.

use serde::{Deserialize, Serialize};

// ── Entry cost ────────────────────────────────────────────────────────────

/// What producing one cache entry cost.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryCost {
    /// Wall time of the negotiation that produced the entry.
    pub selection_latency_ms: u64,
    /// Tokens reported by the negotiation model call.
    pub tokens_used: u32,
}

impl EntryCost {
    pub fn new(selection_latency_ms: u64, tokens_used: u32) -> Self {
        Self {
            selection_latency_ms,
            tokens_used,
        }
    }
}

// ── Sweep report ──────────────────────────────────────────────────────────

/// Aggregate of the entries removed by one TTL sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Entries removed.
    pub removed: usize,
    /// Entries still cached after the sweep.
    pub remaining: usize,
    /// Tokens originally spent producing the removed entries.
    pub tokens: u64,
    /// Selection latency originally spent producing the removed entries.
    pub latency_ms: u64,
}

impl SweepReport {
    /// Fold one evicted entry's cost into the report.
    pub fn absorb(&mut self, cost: &EntryCost) {
        self.removed += 1;
        self.tokens += u64::from(cost.tokens_used);
        self.latency_ms += cost.selection_latency_ms;
    }

    pub fn is_empty(&self) -> bool {
        self.removed == 0
    }
}

// ── Snapshot ──────────────────────────────────────────────────────────────

/// A point-in-time, serializable copy of all counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    /// Hits reached through the similarity arbiter.
    pub similar_hits: u64,
    pub negotiations: u64,
    pub negotiation_failures: u64,
    /// Arbiter calls that failed or timed out and were treated as no match.
    pub arbiter_degradations: u64,
    /// Entries removed by TTL expiry or the soft cap.
    pub evictions: u64,
    /// Tokens spent on successful negotiations.
    pub tokens_spent: u64,
    /// hits / (hits + misses), 0.0 before any lookup.
    pub hit_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_report_absorbs_costs() {
        let mut report = SweepReport::default();
        assert!(report.is_empty());

        report.absorb(&EntryCost::new(120, 900));
        report.absorb(&EntryCost::new(80, 100));

        assert_eq!(report.removed, 2);
        assert_eq!(report.tokens, 1000);
        assert_eq!(report.latency_ms, 200);
    }

    #[test]
    fn entry_cost_serializes_field_names() {
        let json = serde_json::to_value(EntryCost::new(42, 7)).unwrap();
        assert_eq!(json["selection_latency_ms"], 42);
        assert_eq!(json["tokens_used"], 7);
    }
}
