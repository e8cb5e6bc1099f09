//! The per-user memory indexer.
//!
//! Owns the append-only log of one user's reasoning chains and tool
//! executions, persists each record best-effort, and mines the log for
//! usage and error patterns on demand.

use crate::keywords::{extract_keywords, jaccard};
use crate::patterns::{
    ErrorPattern, PatternSettings, PatternType, UsagePattern, detect_error_patterns,
    detect_usage_patterns,
};
use chrono::{Duration, Utc};
use inkwell_config::MemoryConfig;
use inkwell_core::store::{EXECUTION_STREAM, REASONING_STREAM};
use inkwell_core::{BoundedCache, PersistentStore, ReasoningChain, ToolExecution};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A cached pattern matched against a query.
#[derive(Debug, Clone, Serialize)]
pub struct SimilarPattern {
    pub pattern: UsagePattern,
    pub similarity: f32,
}

/// Aggregate statistics over one user's log.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryStatistics {
    pub total_reasoning_chains: usize,
    pub total_tool_executions: usize,
    pub avg_reasoning_time_ms: f64,
    pub avg_execution_time_ms: f64,
    /// Share of turns whose chain succeeded
    pub overall_success_rate: f64,
    /// `(capability, uses)`, most used first, at most 5
    pub most_used_capabilities: Vec<(String, usize)>,
    pub cached_patterns: usize,
    pub storage_bytes: u64,
}

pub struct MemoryIndexer {
    user_id: String,
    store: Arc<dyn PersistentStore>,
    settings: PatternSettings,
    lookback: Duration,
    chains: Vec<ReasoningChain>,
    executions: Vec<ToolExecution>,
    pattern_cache: BoundedCache<String, UsagePattern>,
    error_patterns: Vec<ErrorPattern>,
}

impl MemoryIndexer {
    pub fn new(user_id: impl Into<String>, store: Arc<dyn PersistentStore>, config: &MemoryConfig) -> Self {
        Self {
            user_id: user_id.into(),
            store,
            settings: PatternSettings {
                session_gap: Duration::minutes(config.sequence_window_minutes),
                min_confidence: config.min_pattern_confidence,
                confidence_weight: config.ranking_confidence_weight,
                frequency_weight: config.ranking_frequency_weight,
                max_patterns: config.max_patterns,
            },
            lookback: Duration::days(config.lookback_days),
            chains: Vec::new(),
            executions: Vec::new(),
            pattern_cache: BoundedCache::new(config.pattern_cache_capacity),
            error_patterns: Vec::new(),
        }
    }

    /// Create an indexer and replay the user's persisted log.
    ///
    /// Unreadable records and records owned by another user are skipped.
    pub async fn load(
        user_id: impl Into<String>,
        store: Arc<dyn PersistentStore>,
        config: &MemoryConfig,
    ) -> Self {
        let mut indexer = Self::new(user_id, store, config);
        indexer.chains = indexer.replay(REASONING_STREAM, |c: &ReasoningChain| &c.user_id).await;
        indexer.executions = indexer.replay(EXECUTION_STREAM, |e: &ToolExecution| &e.user_id).await;
        info!(
            user_id = %indexer.user_id,
            chains = indexer.chains.len(),
            executions = indexer.executions.len(),
            "Memory indexer loaded"
        );
        indexer
    }

    async fn replay<T, F>(&self, stream: &str, owner: F) -> Vec<T>
    where
        T: DeserializeOwned,
        F: Fn(&T) -> &String,
    {
        let raw = match self.store.read_stream(&self.user_id, stream).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(user_id = %self.user_id, stream, error = %e, "Failed to read stream, starting empty");
                return Vec::new();
            }
        };
        raw.into_iter()
            .filter_map(|value| match serde_json::from_value::<T>(value) {
                Ok(record) if owner(&record) == &self.user_id => Some(record),
                Ok(_) => {
                    warn!(user_id = %self.user_id, stream, "Skipping record owned by another user");
                    None
                }
                Err(e) => {
                    warn!(user_id = %self.user_id, stream, error = %e, "Skipping corrupted record");
                    None
                }
            })
            .collect()
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    // ── Recording ─────────────────────────────────────────────────────

    /// Log a reasoning chain. Persistence failures are logged, never returned.
    pub async fn record_chain(&mut self, chain: ReasoningChain) {
        if chain.user_id != self.user_id {
            warn!(expected = %self.user_id, got = %chain.user_id, "Refusing cross-user reasoning chain");
            return;
        }
        self.persist(REASONING_STREAM, &chain).await;
        self.chains.push(chain);
    }

    /// Log a tool execution. Persistence failures are logged, never returned.
    pub async fn record_execution(&mut self, execution: ToolExecution) {
        if execution.user_id != self.user_id {
            warn!(expected = %self.user_id, got = %execution.user_id, "Refusing cross-user tool execution");
            return;
        }
        self.persist(EXECUTION_STREAM, &execution).await;
        self.executions.push(execution);
    }

    async fn persist<T: Serialize>(&self, stream: &str, record: &T) {
        let value = match serde_json::to_value(record) {
            Ok(v) => v,
            Err(e) => {
                warn!(user_id = %self.user_id, stream, error = %e, "Failed to serialize record");
                return;
            }
        };
        if let Err(e) = self.store.append(&self.user_id, stream, value).await {
            warn!(user_id = %self.user_id, stream, error = %e, "Failed to persist record");
        }
    }

    pub fn chains(&self) -> &[ReasoningChain] {
        &self.chains
    }

    pub fn executions(&self) -> &[ToolExecution] {
        &self.executions
    }

    /// Whether any of the last `n` executions failed.
    pub fn has_recent_failures(&self, n: usize) -> bool {
        self.executions.iter().rev().take(n).any(|e| !e.success)
    }

    // ── Pattern mining ────────────────────────────────────────────────

    /// Mine usage patterns over the last `lookback` and refresh the cache.
    pub fn detect_usage_patterns(&mut self, lookback: Duration) -> Vec<UsagePattern> {
        let since = Utc::now() - lookback;
        let patterns = detect_usage_patterns(&self.executions, since, &self.settings);
        self.pattern_cache.clear();
        for pattern in &patterns {
            self.pattern_cache.insert(pattern.key(), pattern.clone());
        }
        debug!(user_id = %self.user_id, count = patterns.len(), "Usage patterns refreshed");
        patterns
    }

    /// Mine error patterns over the last `lookback`.
    pub fn detect_error_patterns(&mut self, lookback: Duration) -> Vec<ErrorPattern> {
        let since = Utc::now() - lookback;
        self.error_patterns = detect_error_patterns(&self.executions, since);
        self.error_patterns.clone()
    }

    /// Refresh both pattern kinds over the configured lookback.
    /// Returns `(usage, error)` counts.
    pub fn refresh_patterns(&mut self) -> (usize, usize) {
        let usage = self.detect_usage_patterns(self.lookback).len();
        let errors = self.detect_error_patterns(self.lookback).len();
        (usage, errors)
    }

    pub fn cached_patterns(&self) -> Vec<UsagePattern> {
        self.pattern_cache.values().cloned().collect()
    }

    pub fn error_patterns(&self) -> &[ErrorPattern] {
        &self.error_patterns
    }

    /// Cached patterns whose indicators resemble `query`.
    ///
    /// Patterns with a success rate above 0.8 get a 1.2× boost; matches
    /// below 0.3 are dropped; at most 10 are returned.
    pub fn find_similar(&self, query: &str, pattern_type: Option<PatternType>) -> Vec<SimilarPattern> {
        let query_words: BTreeSet<String> = extract_keywords(query).into_iter().collect();
        let mut matches: Vec<SimilarPattern> = self
            .pattern_cache
            .values()
            .filter(|p| pattern_type.is_none_or(|t| p.pattern_type == t))
            .filter_map(|p| {
                let mut similarity = jaccard(&query_words, &p.context_indicators);
                if p.success_rate > 0.8 {
                    similarity *= 1.2;
                }
                (similarity >= 0.3).then(|| SimilarPattern {
                    pattern: p.clone(),
                    similarity,
                })
            })
            .collect();
        matches.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(10);
        matches
    }

    /// Short lines describing the top cached usage patterns and the current
    /// error patterns, for prompt context.
    pub fn pattern_summaries(&self, limit: usize) -> Vec<String> {
        let mut usage: Vec<&UsagePattern> = self.pattern_cache.values().collect();
        usage.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        usage
            .into_iter()
            .take(limit)
            .map(UsagePattern::summary)
            .chain(self.error_patterns.iter().take(limit).map(ErrorPattern::summary))
            .collect()
    }

    // ── Statistics ────────────────────────────────────────────────────

    pub async fn statistics(&self) -> MemoryStatistics {
        let mean = |total: u64, n: usize| if n == 0 { 0.0 } else { total as f64 / n as f64 };

        let chain_time: u64 = self.chains.iter().map(|c| c.execution_time_ms).sum();
        let exec_time: u64 = self.executions.iter().map(|e| e.execution_time_ms).sum();
        let successes = self.chains.iter().filter(|c| c.success).count();

        let mut usage: HashMap<&str, usize> = HashMap::new();
        for exec in &self.executions {
            *usage.entry(exec.capability_name.as_str()).or_default() += 1;
        }
        let mut most_used: Vec<(String, usize)> =
            usage.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        most_used.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        most_used.truncate(5);

        let storage_bytes = self.store.footprint(&self.user_id).await.unwrap_or_else(|e| {
            warn!(user_id = %self.user_id, error = %e, "Failed to measure storage footprint");
            0
        });

        MemoryStatistics {
            total_reasoning_chains: self.chains.len(),
            total_tool_executions: self.executions.len(),
            avg_reasoning_time_ms: mean(chain_time, self.chains.len()),
            avg_execution_time_ms: mean(exec_time, self.executions.len()),
            overall_success_rate: if self.chains.is_empty() {
                0.0
            } else {
                successes as f64 / self.chains.len() as f64
            },
            most_used_capabilities: most_used,
            cached_patterns: self.pattern_cache.len(),
            storage_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory::InMemoryStore;
    use crate::patterns::test_support::exec_at;
    use async_trait::async_trait;
    use inkwell_core::error::StoreError;
    use serde_json::{Value, json};

    fn config() -> MemoryConfig {
        MemoryConfig {
            backend: "memory".into(),
            ..MemoryConfig::default()
        }
    }

    fn chain(user: &str, ok: bool) -> ReasoningChain {
        ReasoningChain::new(user, "brainstorm ideas", vec![], "brainstorm", "ideas", ok, 120, 300)
    }

    /// A store whose writes always fail.
    struct BrokenStore;

    #[async_trait]
    impl PersistentStore for BrokenStore {
        fn name(&self) -> &str {
            "broken"
        }
        async fn append(&self, _: &str, _: &str, _: Value) -> Result<(), StoreError> {
            Err(StoreError::Storage("disk full".into()))
        }
        async fn read_stream(&self, _: &str, _: &str) -> Result<Vec<Value>, StoreError> {
            Err(StoreError::Storage("unreadable".into()))
        }
        async fn put(&self, _: &str, _: &str, _: Value) -> Result<(), StoreError> {
            Err(StoreError::Storage("disk full".into()))
        }
        async fn get(&self, _: &str, _: &str) -> Result<Option<Value>, StoreError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn records_survive_reload() {
        let store: Arc<dyn PersistentStore> = Arc::new(InMemoryStore::new());
        let mut indexer = MemoryIndexer::new("u1", store.clone(), &config());
        indexer.record_chain(chain("u1", true)).await;
        indexer
            .record_execution(exec_at("brainstorm", Utc::now(), "ideas", true))
            .await;

        let reloaded = MemoryIndexer::load("u1", store.clone(), &config()).await;
        assert_eq!(reloaded.chains().len(), 1);
        assert_eq!(reloaded.executions().len(), 1);

        let other = MemoryIndexer::load("u2", store, &config()).await;
        assert!(other.chains().is_empty());
    }

    #[tokio::test]
    async fn cross_user_records_are_refused() {
        let store: Arc<dyn PersistentStore> = Arc::new(InMemoryStore::new());
        let mut indexer = MemoryIndexer::new("u2", store, &config());
        indexer.record_chain(chain("u1", true)).await;
        assert!(indexer.chains().is_empty());
    }

    #[tokio::test]
    async fn store_failures_do_not_abort_recording() {
        let mut indexer = MemoryIndexer::new("u1", Arc::new(BrokenStore), &config());
        indexer.record_chain(chain("u1", true)).await;
        assert_eq!(indexer.chains().len(), 1);

        let loaded = MemoryIndexer::load("u1", Arc::new(BrokenStore), &config()).await;
        assert!(loaded.chains().is_empty());
    }

    #[tokio::test]
    async fn corrupted_records_are_skipped_on_load() {
        let store = Arc::new(InMemoryStore::new());
        store.append("u1", REASONING_STREAM, json!({"garbage": true})).await.unwrap();
        store
            .append("u1", REASONING_STREAM, serde_json::to_value(chain("u1", true)).unwrap())
            .await
            .unwrap();
        let indexer = MemoryIndexer::load("u1", store, &config()).await;
        assert_eq!(indexer.chains().len(), 1);
    }

    #[tokio::test]
    async fn find_similar_uses_cached_indicators() {
        let store: Arc<dyn PersistentStore> = Arc::new(InMemoryStore::new());
        let mut indexer = MemoryIndexer::new("u1", store, &config());
        let ctx = "college essay failure story";
        for hours in [30, 20, 10, 5] {
            indexer
                .record_execution(exec_at("brainstorm", Utc::now() - Duration::hours(hours), ctx, true))
                .await;
        }
        let patterns = indexer.detect_usage_patterns(Duration::days(7));
        assert!(!patterns.is_empty());

        let similar = indexer.find_similar("essay about failure in college", None);
        assert!(!similar.is_empty());
        assert!(similar[0].similarity >= 0.3);
        assert!(similar.windows(2).all(|w| w[0].similarity >= w[1].similarity));

        let none = indexer.find_similar("weather in paris", None);
        assert!(none.is_empty());

        let only_sequences = indexer.find_similar("college essay failure", Some(PatternType::Sequence));
        assert!(only_sequences.is_empty());
    }

    #[tokio::test]
    async fn statistics_summarize_the_log() {
        let store: Arc<dyn PersistentStore> = Arc::new(InMemoryStore::new());
        let mut indexer = MemoryIndexer::new("u1", store, &config());
        indexer.record_chain(chain("u1", true)).await;
        indexer.record_chain(chain("u1", false)).await;
        indexer.record_execution(exec_at("outline", Utc::now(), "", true)).await;
        indexer.record_execution(exec_at("outline", Utc::now(), "", true)).await;
        indexer.record_execution(exec_at("word_count", Utc::now(), "", true)).await;

        let stats = indexer.statistics().await;
        assert_eq!(stats.total_reasoning_chains, 2);
        assert_eq!(stats.total_tool_executions, 3);
        assert!((stats.overall_success_rate - 0.5).abs() < 1e-9);
        assert_eq!(stats.most_used_capabilities[0], ("outline".to_string(), 2));
        assert!((stats.avg_reasoning_time_ms - 120.0).abs() < 1e-9);
        assert!(stats.storage_bytes > 0);
    }

    #[tokio::test]
    async fn summaries_include_error_patterns() {
        let store: Arc<dyn PersistentStore> = Arc::new(InMemoryStore::new());
        let mut indexer = MemoryIndexer::new("u1", store, &config());
        indexer.record_execution(exec_at("outline", Utc::now(), "", false)).await;
        indexer.record_execution(exec_at("outline", Utc::now(), "", false)).await;
        let (_, errors) = indexer.refresh_patterns();
        assert_eq!(errors, 1);
        assert!(indexer.has_recent_failures(3));
        let lines = indexer.pattern_summaries(3);
        assert!(lines.iter().any(|l| l.contains("timeout")));
    }
}
