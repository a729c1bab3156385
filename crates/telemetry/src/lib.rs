//! Cache metrics for filescope.
//!
//! Process-wide, monotonic counters for cache hits and misses, negotiation
//! outcomes and arbiter degradations, plus the per-entry cost model
//! (selection latency and tokens) that the TTL sweep aggregates on eviction.

pub mod metrics;
pub mod model;

pub use metrics::CacheMetrics;
pub use model::{EntryCost, MetricsSnapshot, SweepReport};
