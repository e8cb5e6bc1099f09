//! The orchestrator: Observe → Reason → Act → Respond for every user turn.
//!
//! Each user owns a session behind a `tokio::sync::Mutex`, so a user's turns
//! run one at a time while different users proceed in parallel. Sessions are
//! created lazily and rebuilt from the persistent store.

use crate::context::{ContextAssembler, RawSources};
use crate::executor::{ActionExecutor, ExecutionMetrics};
use crate::profile::{PROFILE_KEY, UserProfile};
use crate::reasoning::{CONCISE_DECISION_TEMPLATE, DECISION_PROMPT_ID, ReasoningEngine, ReasoningMetrics};
use chrono::Utc;
use inkwell_config::AppConfig;
use inkwell_core::capability::CapabilityRegistry;
use inkwell_core::decision::DecisionTag;
use inkwell_core::error::{Error, Result};
use inkwell_core::event::{DomainEvent, EventBus};
use inkwell_core::message::{Conversation, Message};
use inkwell_core::provider::Provider;
use inkwell_core::record::ReasoningChain;
use inkwell_core::store::PersistentStore;
use inkwell_memory::{ErrorPattern, MemoryIndexer, MemoryStatistics, SimilarPattern, UsagePattern};
use inkwell_optimizer::{OptimizationReport, OptimizerSnapshot, PromptOptimizer};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Store key for the optimizer snapshot.
pub const PROMPT_METRICS_KEY: &str = "prompt_metrics";

/// Recent failures that flag a context as error-prone.
const RECENT_FAILURE_WINDOW: usize = 3;
/// Pattern summaries offered to the context assembler.
const PATTERN_SUMMARY_LIMIT: usize = 3;
/// Messages kept per session; the assembler windows this further.
const MAX_CONVERSATION_MESSAGES: usize = 200;

#[derive(Debug, Clone, Serialize)]
pub struct SessionMetrics {
    pub user_id: String,
    pub interaction_count: u64,
    pub avg_response_time_ms: f64,
    pub reasoning_metrics: ReasoningMetrics,
    pub execution_metrics: ExecutionMetrics,
}

struct UserSession {
    user_id: String,
    indexer: MemoryIndexer,
    engine: ReasoningEngine,
    executor: ActionExecutor,
    optimizer: Arc<PromptOptimizer>,
    conversation: Conversation,
    profile: UserProfile,
    interaction_count: u64,
    total_response_ms: u64,
    /// Prompt and context signature of the last LLM-backed turn
    last_prompt: Option<(String, String)>,
}

pub struct Orchestrator {
    config: AppConfig,
    provider: Arc<dyn Provider>,
    registry: Arc<CapabilityRegistry>,
    store: Arc<dyn PersistentStore>,
    assembler: ContextAssembler,
    events: Arc<EventBus>,
    sessions: Mutex<HashMap<String, Arc<Mutex<UserSession>>>>,
}

impl Orchestrator {
    pub fn new(
        config: AppConfig,
        provider: Arc<dyn Provider>,
        registry: Arc<CapabilityRegistry>,
        store: Arc<dyn PersistentStore>,
    ) -> Self {
        Self {
            assembler: ContextAssembler::new(&config.context),
            config,
            provider,
            registry,
            store,
            events: Arc::new(EventBus::default()),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    pub fn events(&self) -> Arc<EventBus> {
        self.events.clone()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    // ── Sessions ──────────────────────────────────────────────────

    async fn session(&self, user_id: &str) -> Arc<Mutex<UserSession>> {
        if let Some(existing) = self.sessions.lock().await.get(user_id) {
            return existing.clone();
        }
        // built outside the map lock so other users are not blocked on the load
        let created = Arc::new(Mutex::new(self.build_session(user_id).await));
        self.sessions
            .lock()
            .await
            .entry(user_id.to_string())
            .or_insert(created)
            .clone()
    }

    async fn build_session(&self, user_id: &str) -> UserSession {
        let indexer = MemoryIndexer::load(user_id, self.store.clone(), &self.config.memory).await;
        let profile = self.load_value::<UserProfile>(user_id, PROFILE_KEY).await.unwrap_or_default();

        let optimizer = Arc::new(PromptOptimizer::new(self.config.optimizer.clone()));
        if let Some(snapshot) = self.load_value::<OptimizerSnapshot>(user_id, PROMPT_METRICS_KEY).await {
            optimizer.restore(snapshot);
        }
        let engine = ReasoningEngine::new(
            self.provider.clone(),
            self.registry.clone(),
            optimizer.clone(),
            self.config.reasoning.clone(),
        )
        .with_sampling(self.config.provider.temperature, Some(self.config.provider.max_tokens));
        if let Err(e) = optimizer.register_variant(DECISION_PROMPT_ID, CONCISE_DECISION_TEMPLATE, "concise, action-first") {
            warn!(user_id, error = %e, "Failed to register built-in prompt variant");
        }

        info!(user_id, "Session created");
        UserSession {
            user_id: user_id.to_string(),
            indexer,
            engine,
            executor: ActionExecutor::new(user_id, self.registry.clone(), &self.config.executor),
            optimizer,
            conversation: Conversation::new(MAX_CONVERSATION_MESSAGES),
            profile,
            interaction_count: 0,
            total_response_ms: 0,
            last_prompt: None,
        }
    }

    async fn load_value<T: serde::de::DeserializeOwned>(&self, user_id: &str, key: &str) -> Option<T> {
        match self.store.get(user_id, key).await {
            Ok(Some(value)) => serde_json::from_value(value)
                .inspect_err(|e| warn!(user_id, key, error = %e, "Ignoring unreadable stored value"))
                .ok(),
            Ok(None) => None,
            Err(e) => {
                warn!(user_id, key, error = %e, "Failed to read stored value");
                None
            }
        }
    }

    // ── Turns ─────────────────────────────────────────────────────

    /// Handle one user turn. Never fails: reasoning and execution failures
    /// become graceful replies.
    pub async fn handle(&self, user_id: &str, input: &str) -> String {
        let session = self.session(user_id).await;
        let mut guard = session.lock().await;
        self.run_turn(&mut guard, input).await
    }

    async fn run_turn(&self, session: &mut UserSession, input: &str) -> String {
        let started = Instant::now();
        let user_id = session.user_id.clone();

        // ── Observe ──
        let turn_profile = session.profile.for_turn(input);
        let summaries = session.indexer.pattern_summaries(PATTERN_SUMMARY_LIMIT);
        let session_stats = (session.interaction_count > 0).then(|| {
            format!(
                "{} turns so far this session, {} capability runs",
                session.interaction_count,
                session.executor.metrics().executions
            )
        });
        let context = self.assembler.assemble(&RawSources {
            query: input,
            history: &session.conversation.messages,
            profile: &turn_profile,
            session_stats,
            pattern_summaries: &summaries,
            has_errors: session.indexer.has_recent_failures(RECENT_FAILURE_WINDOW),
        });
        session.conversation.push(Message::user(input));

        // ── Reason + Act ──
        let (decision, action) = match session.engine.reason(input, &context).await {
            Ok(decision) => {
                self.events.publish(DomainEvent::ReasoningCompleted {
                    user_id: user_id.clone(),
                    response_type: decision.response_type.as_str().to_string(),
                    prompt_id: decision.prompt_id.clone(),
                    cached: decision.has_tag(DecisionTag::Cached),
                    confidence: decision.confidence,
                    timestamp: Utc::now(),
                });
                let action = session.executor.act_with_recovery(&decision).await;
                (Some(decision), action)
            }
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Reasoning failed, replying with fallback");
                self.events.publish(DomainEvent::ErrorOccurred {
                    context: format!("reasoning for {user_id}"),
                    error_message: e.to_string(),
                    timestamp: Utc::now(),
                });
                (None, session.executor.recover_reasoning_failure(&e))
            }
        };

        for record in session.executor.take_executions() {
            self.events.publish(DomainEvent::CapabilityExecuted {
                user_id: user_id.clone(),
                capability: record.capability_name.clone(),
                success: record.success,
                duration_ms: record.execution_time_ms,
                timestamp: Utc::now(),
            });
            session.indexer.record_execution(record).await;
        }

        // ── Record ──
        let elapsed_ms = started.elapsed().as_millis() as u64;
        let success = decision.is_some() && action.success;
        let (steps, final_action) = match &decision {
            Some(d) => (d.steps.clone(), d.action_label()),
            None => (Vec::new(), "conversation".to_string()),
        };
        session
            .indexer
            .record_chain(ReasoningChain::new(
                &user_id,
                input,
                steps,
                final_action,
                &action.output,
                success,
                elapsed_ms,
                context.total_tokens,
            ))
            .await;

        // ── Respond ──
        session.conversation.push(Message::assistant(&action.output));
        session.interaction_count += 1;
        session.total_response_ms += elapsed_ms;
        let llm_backed = decision.as_ref().is_none_or(|d| !d.has_tag(DecisionTag::FastPath));
        if let Some(prompt_id) = decision.and_then(|d| d.prompt_id) {
            session.last_prompt = Some((prompt_id, context.signals.signature()));
        }

        let every = self.config.optimizer.optimize_every.max(1);
        if session.interaction_count % every == 0 {
            self.maintain(session).await;
        } else if llm_backed {
            self.persist_optimizer(session).await;
        }

        self.events.publish(DomainEvent::TurnCompleted {
            user_id: user_id.clone(),
            success,
            duration_ms: elapsed_ms,
            timestamp: Utc::now(),
        });
        debug!(user_id = %user_id, success, elapsed_ms, "Turn completed");
        action.output
    }

    /// Refresh patterns, retire losing variants, run experiments, and
    /// snapshot the optimizer.
    async fn maintain(&self, session: &mut UserSession) {
        let user_id = session.user_id.clone();

        let (usage, errors) = session.indexer.refresh_patterns();
        self.events.publish(DomainEvent::PatternsRefreshed {
            user_id: user_id.clone(),
            usage_patterns: usage,
            error_patterns: errors,
            timestamp: Utc::now(),
        });

        let optimizer = &session.optimizer;
        for variant_id in optimizer.archive_underperforming(self.config.optimizer.archive_threshold) {
            self.events.publish(DomainEvent::VariantArchived {
                user_id: user_id.clone(),
                variant_id,
                timestamp: Utc::now(),
            });
        }
        for experiment in optimizer.conclude_expired(Utc::now()) {
            info!(
                user_id = %user_id,
                base = %experiment.base_prompt_id,
                winner = ?experiment.winner,
                "Prompt experiment concluded"
            );
        }
        if optimizer.experiment(DECISION_PROMPT_ID).is_none() {
            let window = chrono::Duration::hours(self.config.optimizer.experiment_window_hours);
            if let Err(e) = optimizer.start_experiment(DECISION_PROMPT_ID, window) {
                debug!(user_id = %user_id, error = %e, "No prompt experiment started");
            }
        }
        if let Some(winner) = optimizer.get_winner(DECISION_PROMPT_ID) {
            info!(user_id = %user_id, winner = %winner, "Prompt variant outperforms the base prompt");
        }

        self.persist_optimizer(session).await;
    }

    /// Write the optimizer snapshot under `prompt_metrics`. Best effort.
    async fn persist_optimizer(&self, session: &UserSession) {
        let user_id = &session.user_id;
        match serde_json::to_value(session.optimizer.snapshot()) {
            Ok(snapshot) => {
                if let Err(e) = self.store.put(user_id, PROMPT_METRICS_KEY, snapshot).await {
                    warn!(user_id = %user_id, error = %e, "Failed to persist prompt metrics");
                }
            }
            Err(e) => warn!(user_id = %user_id, error = %e, "Failed to serialize prompt metrics"),
        }
    }

    // ── Profile & feedback ────────────────────────────────────────

    /// Replace the user's profile and persist it under `profile`.
    pub async fn update_profile(&self, user_id: &str, profile: UserProfile) -> Result<()> {
        let value = serde_json::to_value(&profile)?;
        self.store.put(user_id, PROFILE_KEY, value).await?;
        let session = self.session(user_id).await;
        session.lock().await.profile = profile;
        Ok(())
    }

    pub async fn profile(&self, user_id: &str) -> UserProfile {
        let session = self.session(user_id).await;
        let profile = session.lock().await.profile.clone();
        profile
    }

    /// Attach a 1–5 satisfaction score to the prompt used in the user's last
    /// LLM-backed turn. Returns `false` when there is no such turn.
    pub async fn record_feedback(&self, user_id: &str, score: u8) -> Result<bool> {
        if !(1..=5).contains(&score) {
            return Err(Error::Internal(format!("satisfaction score must be between 1 and 5, got {score}")));
        }
        let session = self.session(user_id).await;
        let session = session.lock().await;
        let Some((prompt_id, signature)) = &session.last_prompt else {
            return Ok(false);
        };
        session
            .optimizer
            .record_satisfaction(prompt_id, Some(signature), f64::from(score))
            .map_err(|e| Error::Internal(e.to_string()))?;
        debug!(user_id, prompt_id = %prompt_id, score, "Satisfaction recorded");
        self.persist_optimizer(&session).await;
        Ok(true)
    }

    // ── Inspection ────────────────────────────────────────────────

    /// Metrics for a live session; `None` if the user has no session yet.
    pub async fn session_metrics(&self, user_id: &str) -> Option<SessionMetrics> {
        let session = self.sessions.lock().await.get(user_id).cloned()?;
        let session = session.lock().await;
        Some(SessionMetrics {
            user_id: session.user_id.clone(),
            interaction_count: session.interaction_count,
            avg_response_time_ms: if session.interaction_count == 0 {
                0.0
            } else {
                session.total_response_ms as f64 / session.interaction_count as f64
            },
            reasoning_metrics: session.engine.metrics().clone(),
            execution_metrics: session.executor.metrics().clone(),
        })
    }

    pub async fn statistics(&self, user_id: &str) -> MemoryStatistics {
        let session = self.session(user_id).await;
        let statistics = session.lock().await.indexer.statistics().await;
        statistics
    }

    pub async fn usage_patterns(&self, user_id: &str, lookback_days: i64) -> Vec<UsagePattern> {
        let session = self.session(user_id).await;
        let patterns = session
            .lock()
            .await
            .indexer
            .detect_usage_patterns(chrono::Duration::days(lookback_days));
        patterns
    }

    pub async fn error_patterns(&self, user_id: &str, lookback_days: i64) -> Vec<ErrorPattern> {
        let session = self.session(user_id).await;
        let patterns = session
            .lock()
            .await
            .indexer
            .detect_error_patterns(chrono::Duration::days(lookback_days));
        patterns
    }

    /// Cached usage patterns resembling `query`.
    pub async fn similar_patterns(&self, user_id: &str, query: &str) -> Vec<SimilarPattern> {
        let session = self.session(user_id).await;
        let similar = session.lock().await.indexer.find_similar(query, None);
        similar
    }

    pub async fn prompt_report(&self, user_id: &str) -> OptimizationReport {
        let session = self.session(user_id).await;
        let report = session.lock().await.optimizer.recommendations();
        report
    }
}
