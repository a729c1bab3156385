//! TTL cache store for completed selections, plus the background sweeper.
//!
//! One `CacheStore` is shared (behind an `Arc`) by every conversation in the
//! process. All state sits behind a single mutex that is never held across an
//! `.await`, so a lookup, a write or a sweep each costs at most one map pass.

use crate::buffer::ContextBuffer;
use crate::clock::{Clock, SystemClock};
use crate::key::CacheKey;
use chrono::{DateTime, TimeDelta, Utc};
use filescope_core::files::FileMap;
use filescope_telemetry::{CacheMetrics, EntryCost, SweepReport};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Default entry lifetime: 30 minutes.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

/// Default soft cap on the number of live entries.
pub const DEFAULT_SOFT_CAP: usize = 100;

/// A completed selection.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: CacheKey,
    /// Message essence the entry was produced for; shown to the arbiter.
    pub essence: String,
    /// Buffer state after the selection.
    pub buffer: ContextBuffer,
    /// The selected file subset.
    pub files: FileMap,
    pub cost: EntryCost,
    pub inserted_at: DateTime<Utc>,
}

/// Everything needed to write an entry; the store stamps key and time.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub essence: String,
    pub buffer: ContextBuffer,
    pub files: FileMap,
    pub cost: EntryCost,
}

/// Read-only projection of a recent entry offered to the similarity arbiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimilarityCandidate {
    pub key: CacheKey,
    pub essence: String,
    pub inserted_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Entries {
    map: HashMap<CacheKey, CacheEntry>,
    /// Keys in insertion order, oldest first.
    order: VecDeque<CacheKey>,
}

impl Entries {
    fn remove(&mut self, key: &CacheKey) -> Option<CacheEntry> {
        let entry = self.map.remove(key)?;
        self.order.retain(|k| k != key);
        Some(entry)
    }
}

pub struct CacheStore {
    entries: Mutex<Entries>,
    ttl: TimeDelta,
    soft_cap: usize,
    clock: Arc<dyn Clock>,
    metrics: Arc<CacheMetrics>,
}

impl CacheStore {
    pub fn new(
        ttl: Duration,
        soft_cap: usize,
        clock: Arc<dyn Clock>,
        metrics: Arc<CacheMetrics>,
    ) -> Self {
        Self {
            entries: Mutex::new(Entries::default()),
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
            soft_cap: soft_cap.max(1),
            clock,
            metrics,
        }
    }

    /// 30-minute TTL, 100-entry soft cap, wall clock, fresh metrics.
    pub fn with_defaults() -> Self {
        Self::new(
            DEFAULT_TTL,
            DEFAULT_SOFT_CAP,
            Arc::new(SystemClock),
            Arc::new(CacheMetrics::new()),
        )
    }

    pub fn metrics(&self) -> &Arc<CacheMetrics> {
        &self.metrics
    }

    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().map.is_empty()
    }

    /// Exact lookup. Counts one hit or one miss; an expired entry is removed
    /// on the spot and reported as a miss.
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let now = self.clock.now();
        let mut entries = self.lock();

        let fresh = match entries.map.get(key) {
            None => {
                self.metrics.record_miss();
                return None;
            }
            Some(entry) => self.is_fresh(entry, now),
        };

        if fresh {
            self.metrics.record_hit();
            return entries.map.get(key).cloned();
        }

        entries.remove(key);
        self.metrics.record_miss();
        self.metrics.record_evictions(1);
        debug!(key = %key, "Expired cache entry evicted on access");
        None
    }

    /// Insert or supersede the entry for `key`, then enforce the soft cap
    /// oldest-first.
    pub fn put(&self, key: CacheKey, entry: NewEntry) {
        let now = self.clock.now();
        let mut entries = self.lock();

        entries.remove(&key);
        entries.order.push_back(key.clone());
        entries.map.insert(
            key.clone(),
            CacheEntry {
                key: key.clone(),
                essence: entry.essence,
                buffer: entry.buffer,
                files: entry.files,
                cost: entry.cost,
                inserted_at: now,
            },
        );

        let mut evicted = 0usize;
        while entries.map.len() > self.soft_cap {
            let Some(oldest) = entries.order.pop_front() else {
                break;
            };
            if entries.map.remove(&oldest).is_some() {
                evicted += 1;
            }
        }
        drop(entries);

        debug!(key = %key, "Cache entry written");
        if evicted > 0 {
            self.metrics.record_evictions(evicted);
            debug!(evicted, soft_cap = self.soft_cap, "Soft cap reached, oldest entries evicted");
        }
    }

    /// The `limit` most recently inserted live entries, newest first.
    ///
    /// Does not touch hit/miss counters or remove anything.
    pub fn recent_candidates(&self, limit: usize) -> Vec<SimilarityCandidate> {
        let now = self.clock.now();
        let entries = self.lock();

        let mut candidates: Vec<SimilarityCandidate> = entries
            .order
            .iter()
            .rev()
            .filter_map(|key| entries.map.get(key))
            .filter(|entry| self.is_fresh(entry, now))
            .map(|entry| SimilarityCandidate {
                key: entry.key.clone(),
                essence: entry.essence.clone(),
                inserted_at: entry.inserted_at,
            })
            .collect();
        candidates.sort_by(|a, b| b.inserted_at.cmp(&a.inserted_at));
        candidates.truncate(limit);
        candidates
    }

    /// Remove every expired entry in one pass.
    ///
    /// Only evictions are recorded; hit/miss counters are left alone.
    pub fn sweep(&self) -> SweepReport {
        let now = self.clock.now();
        let mut report = SweepReport::default();
        let mut guard = self.lock();
        let entries = &mut *guard;

        let expired: Vec<CacheKey> = entries
            .map
            .values()
            .filter(|entry| !self.is_fresh(entry, now))
            .map(|entry| entry.key.clone())
            .collect();

        for key in &expired {
            if let Some(entry) = entries.map.remove(key) {
                report.absorb(&entry.cost);
            }
        }
        if !expired.is_empty() {
            entries.order.retain(|key| entries.map.contains_key(key));
        }
        report.remaining = entries.map.len();
        drop(guard);

        self.metrics.record_evictions(report.removed);
        report
    }

    fn is_fresh(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        now - entry.inserted_at <= self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("entries", &self.len())
            .field("ttl", &self.ttl)
            .field("soft_cap", &self.soft_cap)
            .finish()
    }
}

/// Run [`CacheStore::sweep`] every `interval` until the store is dropped.
///
/// The first sweep happens one full interval after spawning.
pub fn spawn_sweeper(store: Arc<CacheStore>, interval: Duration) -> JoinHandle<()> {
    let store: Weak<CacheStore> = Arc::downgrade(&store);
    let period = interval.max(Duration::from_millis(1));

    tokio::spawn(async move {
        let start = tokio::time::Instant::now() + period;
        let mut ticker = tokio::time::interval_at(start, period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let Some(store) = store.upgrade() else {
                debug!("Cache store dropped, sweeper exiting");
                break;
            };

            let report = store.sweep();
            if report.is_empty() {
                debug!(remaining = report.remaining, "Cache sweep found nothing to evict");
            } else {
                info!(
                    removed = report.removed,
                    remaining = report.remaining,
                    tokens = report.tokens,
                    latency_ms = report.latency_ms,
                    "Cache sweep evicted expired entries"
                );
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use filescope_core::files::FileEntry;

    fn key(name: &str) -> CacheKey {
        crate::key::derive_key(&filescope_core::message::MessageContent::from(name), &FileMap::new())
    }

    fn entry(essence: &str, tokens: u32) -> NewEntry {
        let mut files = FileMap::new();
        files.insert("src/a.ts".into(), FileEntry::file("a"));
        NewEntry {
            essence: essence.to_string(),
            buffer: ContextBuffer::from_paths(["src/a.ts"], 5),
            files,
            cost: EntryCost::new(100, tokens),
        }
    }

    fn store_with_clock() -> (CacheStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let store = CacheStore::new(
            DEFAULT_TTL,
            DEFAULT_SOFT_CAP,
            clock.clone(),
            Arc::new(CacheMetrics::new()),
        );
        (store, clock)
    }

    #[test]
    fn hit_just_before_ttl_miss_just_after() {
        let (store, clock) = store_with_clock();
        store.put(key("add a login form"), entry("add a login form", 10));

        clock.advance(TimeDelta::minutes(30) - TimeDelta::milliseconds(1));
        assert!(store.get(&key("add a login form")).is_some());

        clock.advance(TimeDelta::milliseconds(2));
        assert!(store.get(&key("add a login form")).is_none());
        assert!(store.is_empty());

        let snapshot = store.metrics().snapshot();
        assert_eq!(snapshot.hits, 1);
        assert_eq!(snapshot.misses, 1);
        assert_eq!(snapshot.evictions, 1);
    }

    #[test]
    fn unknown_key_counts_a_miss() {
        let (store, _) = store_with_clock();
        assert!(store.get(&key("nothing")).is_none());
        assert_eq!(store.metrics().misses(), 1);
        assert_eq!(store.metrics().hits(), 0);
    }

    #[test]
    fn put_supersedes_same_key() {
        let (store, clock) = store_with_clock();
        store.put(key("a"), entry("a", 1));
        clock.advance(TimeDelta::minutes(20));
        store.put(key("a"), entry("a", 2));
        clock.advance(TimeDelta::minutes(20));

        let hit = store.get(&key("a")).expect("fresher write is live");
        assert_eq!(hit.cost.tokens_used, 2);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn soft_cap_evicts_oldest_first() {
        let clock = Arc::new(ManualClock::default());
        let store = CacheStore::new(DEFAULT_TTL, 3, clock.clone(), Arc::new(CacheMetrics::new()));
        for name in ["one", "two", "three", "four"] {
            store.put(key(name), entry(name, 1));
            clock.advance(TimeDelta::seconds(1));
        }

        assert_eq!(store.len(), 3);
        assert_eq!(store.metrics().snapshot().evictions, 1);
        assert!(store.get(&key("one")).is_none());
        assert!(store.get(&key("four")).is_some());
    }

    #[test]
    fn recent_candidates_newest_first_and_bounded() {
        let (store, clock) = store_with_clock();
        for i in 0..8 {
            store.put(key(&format!("request {i}")), entry(&format!("request {i}"), 1));
            clock.advance(TimeDelta::seconds(1));
        }

        let candidates = store.recent_candidates(5);
        let essences: Vec<&str> = candidates.iter().map(|c| c.essence.as_str()).collect();
        assert_eq!(
            essences,
            vec!["request 7", "request 6", "request 5", "request 4", "request 3"]
        );
        assert_eq!(store.metrics().hits() + store.metrics().misses(), 0);
    }

    #[test]
    fn recent_candidates_skip_expired() {
        let (store, clock) = store_with_clock();
        store.put(key("old"), entry("old", 1));
        clock.advance(TimeDelta::minutes(31));
        store.put(key("new"), entry("new", 1));

        let candidates = store.recent_candidates(5);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].essence, "new");
    }

    #[test]
    fn sweep_removes_exactly_expired_and_leaves_counters() {
        let (store, clock) = store_with_clock();
        for i in 0..3 {
            store.put(key(&format!("stale {i}")), entry("stale", 100));
        }
        clock.advance(TimeDelta::minutes(20));
        for i in 0..7 {
            store.put(key(&format!("fresh {i}")), entry("fresh", 1));
        }
        clock.advance(TimeDelta::minutes(11));

        let before = store.metrics().snapshot();
        let report = store.sweep();
        let after = store.metrics().snapshot();

        assert_eq!(report.removed, 3);
        assert_eq!(report.remaining, 7);
        assert_eq!(report.tokens, 300);
        assert_eq!(store.len(), 7);
        assert_eq!(before.hits, after.hits);
        assert_eq!(before.misses, after.misses);
        assert_eq!(after.evictions, 3);
        assert!(store.get(&key("fresh 0")).is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_conversations_share_one_store() {
        const TASKS: usize = 8;
        const PER_TASK: usize = 10;

        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(CacheStore::new(
            DEFAULT_TTL,
            DEFAULT_SOFT_CAP,
            clock,
            Arc::new(CacheMetrics::new()),
        ));

        let handles: Vec<_> = (0..TASKS)
            .map(|task| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    for turn in 0..PER_TASK {
                        let name = format!("conversation {task} turn {turn}");
                        assert!(store.get(&key(&name)).is_none());
                        store.put(key(&name), entry(&name, 1));
                        let hit = store.get(&key(&name)).expect("own write is visible");
                        assert_eq!(hit.essence, name);
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.len(), TASKS * PER_TASK);
        for task in 0..TASKS {
            for turn in 0..PER_TASK {
                assert!(store.get(&key(&format!("conversation {task} turn {turn}"))).is_some());
            }
        }

        let candidates = store.recent_candidates(TASKS * PER_TASK);
        assert_eq!(candidates.len(), TASKS * PER_TASK);
        assert!(candidates.windows(2).all(|w| w[0].inserted_at >= w[1].inserted_at));
        for task in 0..TASKS {
            let turns: Vec<usize> = candidates
                .iter()
                .filter_map(|c| c.essence.strip_prefix(&format!("conversation {task} turn ")))
                .map(|turn| turn.parse().unwrap())
                .collect();
            let newest_first: Vec<usize> = (0..PER_TASK).rev().collect();
            assert_eq!(turns, newest_first);
        }

        let lookups = (TASKS * PER_TASK * 3) as u64;
        let snapshot = store.metrics().snapshot();
        assert_eq!(snapshot.hits + snapshot.misses, lookups);
        assert_eq!(snapshot.misses, (TASKS * PER_TASK) as u64);
        assert_eq!(snapshot.evictions, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_runs_on_interval() {
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(CacheStore::new(
            DEFAULT_TTL,
            DEFAULT_SOFT_CAP,
            clock.clone(),
            Arc::new(CacheMetrics::new()),
        ));
        store.put(key("stale"), entry("stale", 1));
        clock.advance(TimeDelta::minutes(45));

        let handle = spawn_sweeper(store.clone(), Duration::from_secs(60));
        tokio::time::sleep(Duration::from_secs(61)).await;
        tokio::task::yield_now().await;

        assert!(store.is_empty());
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_exits_when_store_dropped() {
        let store = Arc::new(CacheStore::with_defaults());
        let handle = spawn_sweeper(store.clone(), Duration::from_secs(1));
        drop(store);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(handle.await.is_ok());
    }
}
