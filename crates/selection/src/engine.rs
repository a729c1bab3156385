//! The selection engine: one call per assistant turn.
//!
//! ```text
//! derive key ─► exact lookup ─hit─► cached subset
//!                   │miss
//!                   ▼
//!          similarity arbiter ─match─► lookup of matched key ─hit─► cached subset
//!                   │no match
//!                   ▼
//!     summary (given or generated) ─► negotiation ─ok─► cache write ─► new subset
//!                                          │err
//!                                          ▼
//!                                   error to caller, nothing cached
//! ```

use crate::arbiter::{MAX_CANDIDATES, SimilarityArbiter};
use crate::buffer::{ContextBuffer, DEFAULT_CAPACITY};
use crate::ignore_filter::{DEFAULT_FILTER, IgnoreFilter};
use crate::key::{CacheKey, derive_key_with, message_essence, strip_routing_tags};
use crate::negotiator::{ContextNegotiator, materialize};
use crate::store::{CacheEntry, CacheStore, NewEntry};
use crate::summarizer::{DEFAULT_FALLBACK, Summarizer};
use filescope_config::AppConfig;
use filescope_core::error::SelectionError;
use filescope_core::files::FileMap;
use filescope_core::message::{Message, MessageContent, last_user_message};
use filescope_core::model::ContextModel;
use filescope_telemetry::{CacheMetrics, EntryCost};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Tunables for one engine.
///
/// `max_files` and `similarity_candidates` are clamped to 5 by the
/// components they configure.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub max_files: usize,
    pub similarity_candidates: usize,
    pub arbiter_enabled: bool,
    pub selection_timeout: Option<Duration>,
    pub arbiter_timeout: Option<Duration>,
    pub summarizer_timeout: Option<Duration>,
    pub summary_fallback: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_files: DEFAULT_CAPACITY,
            similarity_candidates: MAX_CANDIDATES,
            arbiter_enabled: true,
            selection_timeout: None,
            arbiter_timeout: None,
            summarizer_timeout: None,
            summary_fallback: DEFAULT_FALLBACK.to_string(),
        }
    }
}

impl EngineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_files: config.selection.max_files,
            similarity_candidates: config.cache.similarity_candidates,
            arbiter_enabled: config.arbiter.enabled,
            selection_timeout: seconds(config.selection.timeout_secs),
            arbiter_timeout: seconds(config.arbiter.timeout_secs),
            summarizer_timeout: seconds(config.summarizer.timeout_secs),
            summary_fallback: config.summarizer.fallback.clone(),
        }
    }
}

/// `0` disables the timeout.
fn seconds(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Inputs for one turn.
#[derive(Debug, Clone, Copy)]
pub struct SelectionRequest<'a> {
    /// Full conversation, oldest first.
    pub messages: &'a [Message],
    /// Precomputed running summary; generated when absent.
    pub summary: Option<&'a str>,
    /// Current project snapshot.
    pub files: &'a FileMap,
    /// Files in context before this turn.
    pub buffer: &'a ContextBuffer,
}

impl<'a> SelectionRequest<'a> {
    pub fn new(messages: &'a [Message], files: &'a FileMap, buffer: &'a ContextBuffer) -> Self {
        Self {
            messages,
            summary: None,
            files,
            buffer,
        }
    }

    pub fn with_summary(mut self, summary: &'a str) -> Self {
        self.summary = Some(summary);
        self
    }
}

/// How a selection was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum SelectionSource {
    CacheHit,
    SimilarHit { matched_key: CacheKey },
    Negotiated { tokens_used: u32, latency_ms: u64 },
}

#[derive(Debug, Clone)]
pub struct SelectionOutcome {
    /// Selected files with content from the request snapshot.
    pub files: FileMap,
    /// Buffer to carry into the next turn.
    pub buffer: ContextBuffer,
    pub key: CacheKey,
    pub source: SelectionSource,
}

pub struct ContextEngine {
    store: Arc<CacheStore>,
    arbiter: SimilarityArbiter,
    negotiator: ContextNegotiator,
    summarizer: Summarizer,
    filter: IgnoreFilter,
    settings: EngineSettings,
}

impl ContextEngine {
    pub fn new(model: Arc<dyn ContextModel>, store: Arc<CacheStore>, settings: EngineSettings) -> Self {
        let metrics = Arc::clone(store.metrics());
        let arbiter = SimilarityArbiter::new(Arc::clone(&model), metrics)
            .with_timeout(settings.arbiter_timeout)
            .with_max_candidates(settings.similarity_candidates);
        let negotiator = ContextNegotiator::new(Arc::clone(&model), settings.max_files)
            .with_timeout(settings.selection_timeout);
        let summarizer = Summarizer::new(model)
            .with_timeout(settings.summarizer_timeout)
            .with_fallback(settings.summary_fallback.clone());

        Self {
            store,
            arbiter,
            negotiator,
            summarizer,
            filter: DEFAULT_FILTER.clone(),
            settings,
        }
    }

    /// Replace the built-in ignore filter (e.g. one with extra patterns).
    pub fn with_ignore_filter(mut self, filter: IgnoreFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    pub fn metrics(&self) -> &Arc<CacheMetrics> {
        self.store.metrics()
    }

    pub fn ignore_filter(&self) -> &IgnoreFilter {
        &self.filter
    }

    /// Choose the files for the next model invocation.
    ///
    /// Only negotiation failures are returned as errors; the store is written
    /// only after a negotiation completes.
    pub async fn select(&self, request: SelectionRequest<'_>) -> Result<SelectionOutcome, SelectionError> {
        let content = last_user_message(request.messages)
            .map(|m| m.content.clone())
            .unwrap_or_else(|| MessageContent::Text(String::new()));
        let essence = message_essence(&content);
        let key = derive_key_with(&content, request.files, &self.filter);
        let known_paths = self.filter.selectable_paths(request.files);
        let known: HashSet<&str> = known_paths.iter().map(String::as_str).collect();

        if let Some(entry) = self.store.get(&key) {
            debug!(key = %key, "Context cache hit");
            return Ok(self.reuse(entry, key, request.files, &known, SelectionSource::CacheHit));
        }
        debug!(key = %key, "Context cache miss");

        if self.settings.arbiter_enabled && !self.store.is_empty() {
            let candidates = self.store.recent_candidates(self.arbiter.max_candidates());
            if let Some(matched) = self.arbiter.find_similar(&essence, &candidates).await {
                if let Some(entry) = self.store.get(&matched) {
                    self.metrics().record_similar_hit();
                    info!(key = %key, matched = %matched, "Reusing selection of a similar request");
                    let source = SelectionSource::SimilarHit {
                        matched_key: matched,
                    };
                    return Ok(self.reuse(entry, key, request.files, &known, source));
                }
                debug!(matched = %matched, "Matched entry expired before reuse");
            }
        }

        let mut current = request.buffer.clone();
        let stale = current.retain(|path| known.contains(path));
        if !stale.is_empty() {
            debug!(pruned = ?stale, "Dropped buffered paths missing from the snapshot");
        }

        let summary = match request.summary {
            Some(summary) => summary.to_string(),
            None => self.summarizer.summarize(request.messages).await,
        };
        let last_text = strip_routing_tags(&content.text());

        let started = Instant::now();
        let negotiation = match self
            .negotiator
            .select_files(&summary, &last_text, request.files, &known_paths, &current)
            .await
        {
            Ok(negotiation) => negotiation,
            Err(e) => {
                self.metrics().record_negotiation_failure();
                warn!(key = %key, error = %e, "Context negotiation failed");
                return Err(e);
            }
        };
        let latency_ms = started.elapsed().as_millis() as u64;

        let cost = EntryCost::new(latency_ms, negotiation.tokens_used);
        self.metrics().record_negotiation(&cost);
        self.store.put(
            key.clone(),
            NewEntry {
                essence,
                buffer: negotiation.buffer.clone(),
                files: negotiation.files.clone(),
                cost,
            },
        );
        info!(
            key = %key,
            files = negotiation.files.len(),
            tokens_used = negotiation.tokens_used,
            elapsed_ms = latency_ms,
            "Context negotiated"
        );

        Ok(SelectionOutcome {
            files: negotiation.files,
            buffer: negotiation.buffer,
            key,
            source: SelectionSource::Negotiated {
                tokens_used: negotiation.tokens_used,
                latency_ms,
            },
        })
    }

    /// Rebuild a cached selection against the current snapshot.
    fn reuse(
        &self,
        entry: CacheEntry,
        key: CacheKey,
        files: &FileMap,
        known: &HashSet<&str>,
        source: SelectionSource,
    ) -> SelectionOutcome {
        let mut buffer = entry.buffer;
        buffer.retain(|path| known.contains(path));
        SelectionOutcome {
            files: materialize(&buffer, files),
            buffer,
            key,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::protocol::{CLOSE_MARKER, OPEN_MARKER};
    use crate::test_helpers::ScriptedModel;
    use chrono::TimeDelta;
    use filescope_core::error::ProviderError;
    use filescope_core::files::FileEntry;

    fn snapshot(paths: &[&str]) -> FileMap {
        paths
            .iter()
            .map(|p| (p.to_string(), FileEntry::file(format!("v1 {p}"))))
            .collect()
    }

    fn block(lines: &[&str]) -> String {
        format!("{OPEN_MARKER}\n{}\n{CLOSE_MARKER}", lines.join("\n"))
    }

    fn engine(model: Arc<ScriptedModel>) -> (ContextEngine, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(CacheStore::new(
            Duration::from_secs(1800),
            100,
            clock.clone(),
            Arc::new(CacheMetrics::new()),
        ));
        (ContextEngine::new(model, store, EngineSettings::default()), clock)
    }

    #[tokio::test]
    async fn summary_generated_only_when_missing() {
        let model = Arc::new(ScriptedModel::new());
        model.push_summary(Ok("building auth"));
        model.push_selection(Ok(&block(&["include src/a.ts"])));
        model.push_selection(Ok(&block(&[])));
        let (engine, _) = engine(model.clone());

        let files = snapshot(&["src/a.ts"]);
        let buffer = ContextBuffer::default();
        let first = [Message::user("first")];
        engine.select(SelectionRequest::new(&first, &files, &buffer)).await.unwrap();
        assert_eq!(model.summary_calls(), 1);
        assert!(model.last_selection_prompt().unwrap().user.contains("building auth"));

        let second = [Message::user("second")];
        engine
            .select(SelectionRequest::new(&second, &files, &buffer).with_summary("given"))
            .await
            .unwrap();
        assert_eq!(model.summary_calls(), 1);
    }

    #[tokio::test]
    async fn summary_failure_does_not_abort() {
        let model = Arc::new(ScriptedModel::new());
        model.push_summary(Err(ProviderError::Network("down".into())));
        model.push_selection(Ok(&block(&["include src/a.ts"])));
        let (engine, _) = engine(model.clone());

        let files = snapshot(&["src/a.ts"]);
        let messages = [Message::user("x")];
        let outcome = engine
            .select(SelectionRequest::new(&messages, &files, &ContextBuffer::default()))
            .await
            .unwrap();
        assert_eq!(outcome.buffer.paths(), &["src/a.ts"]);
        assert!(model.last_selection_prompt().unwrap().user.contains(DEFAULT_FALLBACK));
    }

    #[tokio::test]
    async fn cache_hit_uses_current_content() {
        let model = Arc::new(ScriptedModel::new());
        model.push_selection(Ok(&block(&["include src/a.ts"])));
        let (engine, _) = engine(model.clone());

        let messages = [Message::user("edit a")];
        let buffer = ContextBuffer::default();
        let files = snapshot(&["src/a.ts"]);
        engine
            .select(SelectionRequest::new(&messages, &files, &buffer).with_summary(""))
            .await
            .unwrap();

        let mut edited = files.clone();
        edited.insert("src/a.ts".into(), FileEntry::file("v2"));
        let outcome = engine
            .select(SelectionRequest::new(&messages, &edited, &buffer).with_summary(""))
            .await
            .unwrap();

        assert_eq!(outcome.source, SelectionSource::CacheHit);
        assert_eq!(outcome.files["src/a.ts"].content, "v2");
        assert_eq!(model.selection_calls(), 1);
    }

    #[tokio::test]
    async fn stale_buffer_paths_are_pruned_before_negotiation() {
        let model = Arc::new(ScriptedModel::new());
        model.push_selection(Ok(&block(&[])));
        let (engine, _) = engine(model.clone());

        let files = snapshot(&["src/a.ts"]);
        let buffer = ContextBuffer::from_paths(["src/a.ts", "src/deleted.ts"], 5);
        let messages = [Message::user("x")];
        let outcome = engine
            .select(SelectionRequest::new(&messages, &files, &buffer).with_summary(""))
            .await
            .unwrap();

        assert_eq!(outcome.buffer.paths(), &["src/a.ts"]);
        assert!(!model.last_selection_prompt().unwrap().system.contains("src/deleted.ts"));
    }

    #[tokio::test]
    async fn negotiation_failure_counts_and_skips_cache() {
        let model = Arc::new(ScriptedModel::new());
        model.push_selection(Err(ProviderError::Timeout("slow".into())));
        let (engine, _) = engine(model);

        let files = snapshot(&["src/a.ts"]);
        let messages = [Message::user("x")];
        let err = engine
            .select(SelectionRequest::new(&messages, &files, &ContextBuffer::default()).with_summary(""))
            .await
            .unwrap_err();

        assert!(matches!(err, SelectionError::ProviderUnavailable(_)));
        assert!(engine.store().is_empty());
        assert_eq!(engine.metrics().snapshot().negotiation_failures, 1);
    }

    #[tokio::test]
    async fn disabled_arbiter_is_never_called() {
        let model = Arc::new(ScriptedModel::new());
        model.push_selection(Ok(&block(&[])));
        model.push_selection(Ok(&block(&[])));
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(CacheStore::new(
            Duration::from_secs(1800),
            100,
            clock,
            Arc::new(CacheMetrics::new()),
        ));
        let settings = EngineSettings {
            arbiter_enabled: false,
            ..EngineSettings::default()
        };
        let engine = ContextEngine::new(model.clone(), store, settings);

        let files = snapshot(&["src/a.ts"]);
        let buffer = ContextBuffer::default();
        for text in ["one", "two"] {
            let messages = [Message::user(text)];
            engine
                .select(SelectionRequest::new(&messages, &files, &buffer).with_summary(""))
                .await
                .unwrap();
        }
        assert_eq!(model.similarity_calls(), 0);
        assert_eq!(model.selection_calls(), 2);
    }

    #[tokio::test]
    async fn expired_entry_renegotiates() {
        let model = Arc::new(ScriptedModel::new());
        model.push_selection(Ok(&block(&["include src/a.ts"])));
        model.push_selection(Ok(&block(&["include src/a.ts"])));
        let (engine, clock) = engine(model.clone());

        let files = snapshot(&["src/a.ts"]);
        let buffer = ContextBuffer::default();
        let messages = [Message::user("edit a")];
        engine
            .select(SelectionRequest::new(&messages, &files, &buffer).with_summary(""))
            .await
            .unwrap();
        clock.advance(TimeDelta::minutes(31));

        let outcome = engine
            .select(SelectionRequest::new(&messages, &files, &buffer).with_summary(""))
            .await
            .unwrap();
        assert!(matches!(outcome.source, SelectionSource::Negotiated { .. }));
        assert_eq!(model.selection_calls(), 2);
        assert_eq!(model.similarity_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_negotiation_writes_nothing() {
        let model = Arc::new(ScriptedModel::new().with_delay(Duration::from_secs(60)));
        model.push_selection(Ok(&block(&["include src/a.ts"])));
        let (engine, _) = engine(model);

        let files = snapshot(&["src/a.ts"]);
        let buffer = ContextBuffer::default();
        let messages = [Message::user("edit a")];
        let request = SelectionRequest::new(&messages, &files, &buffer).with_summary("");

        let aborted = tokio::time::timeout(Duration::from_secs(5), engine.select(request)).await;
        assert!(aborted.is_err());

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(engine.store().is_empty());
        let metrics = engine.metrics().snapshot();
        assert_eq!(metrics.negotiations, 0);
        assert_eq!(metrics.negotiation_failures, 0);
    }

    #[tokio::test]
    async fn oversized_settings_stay_within_five() {
        let model = Arc::new(ScriptedModel::new());
        let paths: Vec<String> = (0..12).map(|i| format!("src/f{i}.ts")).collect();
        let includes: Vec<String> = paths.iter().take(10).map(|p| format!("include {p}")).collect();
        let includes: Vec<&str> = includes.iter().map(String::as_str).collect();
        for _ in 0..12 {
            model.push_selection(Ok(&block(&includes)));
            model.push_similarity(Ok("none"));
        }

        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(CacheStore::new(
            Duration::from_secs(1800),
            100,
            clock,
            Arc::new(CacheMetrics::new()),
        ));
        let settings = EngineSettings {
            max_files: 10,
            similarity_candidates: 20,
            ..EngineSettings::default()
        };
        let engine = ContextEngine::new(model.clone(), store, settings);

        let names: Vec<&str> = paths.iter().map(String::as_str).collect();
        let files = snapshot(&names);
        let mut buffer = ContextBuffer::default();
        for turn in 0..12 {
            let messages = [Message::user(format!("turn {turn}"))];
            let outcome = engine
                .select(SelectionRequest::new(&messages, &files, &buffer).with_summary(""))
                .await
                .unwrap();
            assert!(outcome.buffer.len() <= 5, "turn {turn}: {:?}", outcome.buffer.paths());
            assert_eq!(outcome.files.len(), outcome.buffer.len());
            buffer = outcome.buffer;
        }

        assert_eq!(engine.store().len(), 12);
        let prompt = model.last_similarity_prompt().unwrap();
        assert!(prompt.user.contains("5. "));
        assert!(!prompt.user.contains("6. "));
    }

    #[test]
    fn settings_from_config() {
        let mut config = AppConfig::default();
        config.selection.timeout_secs = 0;
        config.arbiter.enabled = false;
        let settings = EngineSettings::from_config(&config);
        assert_eq!(settings.max_files, 5);
        assert!(settings.selection_timeout.is_none());
        assert_eq!(settings.arbiter_timeout, Some(Duration::from_secs(20)));
        assert!(!settings.arbiter_enabled);
    }

    #[test]
    fn fallback_is_the_same_from_config_and_default() {
        let from_config = EngineSettings::from_config(&AppConfig::default());
        assert_eq!(from_config.summary_fallback, EngineSettings::default().summary_fallback);
        assert_eq!(from_config.summary_fallback, DEFAULT_FALLBACK);
    }

    #[test]
    fn source_serializes_tagged() {
        let json = serde_json::to_value(SelectionSource::Negotiated {
            tokens_used: 10,
            latency_ms: 5,
        })
        .unwrap();
        assert_eq!(json["source"], "negotiated");
        assert_eq!(json["tokens_used"], 10);
    }
}
