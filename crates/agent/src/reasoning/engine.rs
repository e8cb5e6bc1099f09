//! The reasoning engine: user input + assembled context → structured
//! decision.
//!
//! Order of resolution for a turn:
//!
//! 1. **Fast path**: help and short brainstorm requests, no LLM call
//! 2. **Prompt choice**: experiment allocation, else optimizer selection
//! 3. **Cache**: SHA-256 over prompt prefix, input prefix and signature
//! 4. **LLM** with exponential backoff between attempts
//! 5. **Parse** leniently, then let the selector cross-check the choice

use crate::context::RetrievedContext;
use crate::reasoning::fast_path::try_fast_path;
use crate::reasoning::parse::{ParseOutcome, parse_decision};
use crate::reasoning::prompt::{
    DECISION_PROMPT_ID, DEFAULT_DECISION_TEMPLATE, PromptRenderer, PromptVars, TemplateRenderer, cache_key,
};
use crate::reasoning::selector::{CapabilitySelector, KeywordSelector};
use inkwell_config::ReasoningConfig;
use inkwell_core::cache::BoundedCache;
use inkwell_core::capability::CapabilityRegistry;
use inkwell_core::decision::{DecisionTag, ReasoningResult, ResponseType};
use inkwell_core::error::{ProviderError, ReasoningError};
use inkwell_core::provider::{CompletionRequest, Provider};
use inkwell_core::record::ReasoningStep;
use inkwell_optimizer::{Outcome, PromptChoice, PromptOptimizer};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Counters for one session's reasoning.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReasoningMetrics {
    pub requests: u64,
    pub successes: u64,
    pub failures: u64,
    pub cache_hits: u64,
    pub fast_paths: u64,
    pub llm_calls: u64,
    pub fallbacks: u64,
    pub selector_overrides: u64,
    pub total_time_ms: u64,
}

impl ReasoningMetrics {
    pub fn avg_time_ms(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            self.total_time_ms as f64 / self.requests as f64
        }
    }
}

pub struct ReasoningEngine {
    provider: Arc<dyn Provider>,
    registry: Arc<CapabilityRegistry>,
    optimizer: Arc<PromptOptimizer>,
    renderer: Arc<dyn PromptRenderer>,
    selector: Option<Arc<dyn CapabilitySelector>>,
    config: ReasoningConfig,
    temperature: f32,
    max_tokens: Option<u32>,
    cache: BoundedCache<String, ReasoningResult>,
    metrics: ReasoningMetrics,
}

impl ReasoningEngine {
    /// Create an engine and register the default decision prompt with the
    /// optimizer (existing metrics are kept).
    pub fn new(
        provider: Arc<dyn Provider>,
        registry: Arc<CapabilityRegistry>,
        optimizer: Arc<PromptOptimizer>,
        config: ReasoningConfig,
    ) -> Self {
        optimizer.register_base(DECISION_PROMPT_ID, &config.task_type, DEFAULT_DECISION_TEMPLATE);
        let selector: Arc<dyn CapabilitySelector> = Arc::new(KeywordSelector::from_registry(&registry));
        Self {
            provider,
            optimizer,
            renderer: Arc::new(TemplateRenderer),
            selector: Some(selector),
            cache: BoundedCache::new(config.cache_capacity),
            registry,
            config,
            temperature: 0.3,
            max_tokens: None,
            metrics: ReasoningMetrics::default(),
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn PromptRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Replace the cross-check selector; `None` disables overrides.
    pub fn with_selector(mut self, selector: Option<Arc<dyn CapabilitySelector>>) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: Option<u32>) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    pub fn metrics(&self) -> &ReasoningMetrics {
        &self.metrics
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Decide what to do with `input`.
    pub async fn reason(
        &mut self,
        input: &str,
        context: &RetrievedContext,
    ) -> Result<ReasoningResult, ReasoningError> {
        let started = Instant::now();
        self.metrics.requests += 1;
        let sources = context.sources();

        // ── Fast path ──
        if let Some(mut result) = try_fast_path(input, &self.registry) {
            result.steps = vec![ReasoningStep::new(
                1,
                "Recognized a request that needs no model call",
                result.capability.clone(),
                result.confidence,
                sources,
            )];
            result.elapsed_ms = started.elapsed().as_millis() as u64;
            self.metrics.fast_paths += 1;
            self.finish(started, true);
            debug!(action = %result.action_label(), "Fast path decision");
            return Ok(result);
        }

        // ── Prompt choice ──
        let signature = context.signals.signature();
        let choice = self
            .optimizer
            .choose(DECISION_PROMPT_ID, &self.config.task_type, &context.signals)
            .unwrap_or_else(|| PromptChoice {
                prompt_id: DECISION_PROMPT_ID.to_string(),
                template: DEFAULT_DECISION_TEMPLATE.to_string(),
                score: 0.0,
                allocated: false,
            });
        let capabilities = self.describe_capabilities();
        let rendered_context = context.render();
        let prompt = self.renderer.render(
            &choice.template,
            &PromptVars {
                user_input: input,
                context: &rendered_context,
                capabilities: &capabilities,
            },
        );

        // ── Cache ──
        let key = cache_key(
            &prompt,
            self.config.prompt_prefix_chars,
            input,
            self.config.input_prefix_chars,
            &signature,
        );
        if let Some(cached) = self.cache.get(&key) {
            let mut result = cached.clone();
            result.tag(DecisionTag::Cached);
            result.elapsed_ms = started.elapsed().as_millis() as u64;
            self.metrics.cache_hits += 1;
            self.report(&choice.prompt_id, &signature, true, &result);
            self.finish(started, true);
            debug!(prompt_id = %choice.prompt_id, "Decision served from cache");
            return Ok(result);
        }

        // ── LLM ──
        let raw = match self.call_with_retry(&prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                let failed = ReasoningResult::conversation(String::new(), 0.0);
                self.report(&choice.prompt_id, &signature, false, &failed);
                self.finish(started, false);
                return Err(e);
            }
        };

        // ── Parse ──
        let mut result = match parse_decision(&raw) {
            ParseOutcome::Decision(result) => result,
            ParseOutcome::Fallback(text) => {
                self.metrics.fallbacks += 1;
                let mut result = ReasoningResult::conversation("Model replied without structure", 0.5)
                    .with_response_text(text);
                result.tag(DecisionTag::Fallback);
                result
            }
            ParseOutcome::Invalid => {
                let failed = ReasoningResult::conversation(String::new(), 0.0);
                self.report(&choice.prompt_id, &signature, false, &failed);
                self.finish(started, false);
                return Err(ReasoningError::Unparseable(raw));
            }
        };
        let structured = !result.has_tag(DecisionTag::Fallback);
        if structured {
            self.cross_check(input, &mut result);
        }

        for step in &mut result.steps {
            step.context_sources_used = sources.clone();
        }
        result.prompt_id = Some(choice.prompt_id.clone());
        result.elapsed_ms = started.elapsed().as_millis() as u64;

        if structured {
            self.cache.insert(key, result.clone());
        }
        self.report(&choice.prompt_id, &signature, structured, &result);
        self.finish(started, true);
        debug!(
            prompt_id = %choice.prompt_id,
            allocated = choice.allocated,
            action = %result.action_label(),
            confidence = result.confidence,
            "Decision reached"
        );
        Ok(result)
    }

    fn finish(&mut self, started: Instant, success: bool) {
        if success {
            self.metrics.successes += 1;
        } else {
            self.metrics.failures += 1;
        }
        self.metrics.total_time_ms += started.elapsed().as_millis() as u64;
    }

    fn report(&self, prompt_id: &str, signature: &str, success: bool, result: &ReasoningResult) {
        let outcome = Outcome {
            success,
            response_time_ms: result.elapsed_ms as f64,
            confidence: f64::from(result.confidence),
            satisfaction: None,
        };
        if let Err(e) = self.optimizer.record_use(prompt_id, signature, &outcome) {
            warn!(prompt_id, error = %e, "Failed to record prompt outcome");
        }
    }

    fn describe_capabilities(&self) -> String {
        self.registry
            .schemas()
            .into_iter()
            .map(|(name, schema)| {
                let args: Vec<String> = schema
                    .arg_types
                    .iter()
                    .map(|(arg, ty)| {
                        let required = if schema.required_args.contains(arg) { "" } else { "?" };
                        format!("{arg}{required}: {ty}")
                    })
                    .collect();
                format!("- {name}({}): {}", args.join(", "), schema.description)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Call the provider up to `max_attempts` times, sleeping
    /// `base · 2^(n−1)` after the n-th failure. Empty text counts as failure.
    async fn call_with_retry(&mut self, prompt: &str) -> Result<String, ReasoningError> {
        let attempts = self.config.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            let mut request = CompletionRequest::new(prompt);
            request.temperature = self.temperature;
            request.max_tokens = self.max_tokens;
            self.metrics.llm_calls += 1;

            match self.provider.complete(request).await {
                Ok(response) if !response.text.trim().is_empty() => return Ok(response.text),
                Ok(_) => last_error = ProviderError::EmptyResponse.to_string(),
                Err(e) => last_error = e.to_string(),
            }

            if attempt < attempts {
                let delay_ms = self
                    .config
                    .backoff_base_ms
                    .saturating_mul(2u64.saturating_pow(attempt - 1));
                warn!(
                    provider = self.provider.name(),
                    attempt,
                    max_attempts = attempts,
                    delay_ms,
                    error = %last_error,
                    "LLM call failed, retrying"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }

        warn!(provider = self.provider.name(), attempts, error = %last_error, "LLM retries exhausted");
        Err(ReasoningError::RetriesExhausted { attempts, last_error })
    }

    /// Let the selector override the LLM when it is confident about a
    /// different capability, or about one where the LLM chose none.
    fn cross_check(&mut self, input: &str, result: &mut ReasoningResult) {
        let Some(suggestion) = self.selector.as_ref().and_then(|s| s.suggest(input)) else {
            return;
        };
        if suggestion.confidence < self.config.selector_override_threshold
            || result.capability.as_deref() == Some(suggestion.capability.as_str())
            || !self.registry.has(&suggestion.capability)
        {
            return;
        }

        info!(
            from = %result.action_label(),
            to = %suggestion.capability,
            selector_confidence = suggestion.confidence,
            "Selector overrode decision"
        );
        let mut args = suggestion.args;
        if result.capability.is_none() {
            args.extend(std::mem::take(&mut result.tool_args));
        }
        result.response_type = ResponseType::ToolExecution;
        result.capability = Some(suggestion.capability.clone());
        result.tool_args = args;
        result.confidence = (result.confidence + 0.1).min(1.0);
        result.response_text = None;
        result.tag(DecisionTag::SelectorOverride);
        let step_number = result.steps.len() + 1;
        result.steps.push(ReasoningStep::new(
            step_number,
            format!("Keyword selector strongly suggested {}", suggestion.capability),
            Some(suggestion.capability),
            suggestion.confidence,
            Vec::new(),
        ));
        self.metrics.selector_overrides += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ScriptedProvider, decision_json};
    use inkwell_config::OptimizerConfig;
    use inkwell_tools::default_registry;
    use serde_json::json;

    fn engine(provider: Arc<ScriptedProvider>) -> (ReasoningEngine, Arc<PromptOptimizer>) {
        let optimizer = Arc::new(PromptOptimizer::new(OptimizerConfig::default()));
        let engine = ReasoningEngine::new(
            provider,
            Arc::new(default_registry()),
            optimizer.clone(),
            ReasoningConfig::default(),
        );
        (engine, optimizer)
    }

    #[tokio::test]
    async fn help_needs_no_llm_call() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let (mut engine, _) = engine(provider.clone());
        let result = engine.reason("help", &RetrievedContext::default()).await.unwrap();
        assert_eq!(result.response_type, ResponseType::Conversation);
        assert_eq!(result.confidence, 0.8);
        assert!(result.has_tag(DecisionTag::FastPath));
        assert_eq!(provider.calls(), 0);
        assert_eq!(engine.metrics().fast_paths, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_with_exponential_backoff() {
        let provider = Arc::new(ScriptedProvider::from_results(vec![
            Err(ProviderError::Network("reset".into())),
            Ok(String::new()),
            Ok(decision_json("conversation", None, json!({}), 0.7)),
        ]));
        let (mut engine, _) = engine(provider.clone());
        let started = Instant::now();
        let result = engine.reason("how do I start my essay", &RetrievedContext::default()).await.unwrap();
        let waited = started.elapsed();

        assert_eq!(provider.calls(), 3);
        assert!(waited >= Duration::from_secs(3), "waited {waited:?}");
        assert!(waited < Duration::from_secs(4), "waited {waited:?}");
        assert_eq!(result.response_type, ResponseType::Conversation);
        assert_eq!(engine.metrics().llm_calls, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_report_failure() {
        let provider = Arc::new(ScriptedProvider::from_results(vec![
            Err(ProviderError::Timeout("slow".into())),
            Err(ProviderError::Timeout("slow".into())),
            Err(ProviderError::Timeout("slow".into())),
        ]));
        let (mut engine, optimizer) = engine(provider.clone());
        let err = engine.reason("how do I start", &RetrievedContext::default()).await.unwrap_err();
        assert!(matches!(err, ReasoningError::RetriesExhausted { attempts: 3, .. }));
        assert_eq!(engine.metrics().failures, 1);
        let metrics = optimizer.prompt(DECISION_PROMPT_ID).unwrap().metrics;
        assert_eq!(metrics.total_uses, 1);
        assert_eq!(metrics.successful_uses, 0);
    }

    #[tokio::test]
    async fn identical_request_is_served_from_cache() {
        let provider = Arc::new(ScriptedProvider::new(vec![decision_json(
            "tool_execution",
            Some("outline"),
            json!({"topic": "my summer job"}),
            0.85,
        )]));
        let (mut engine, _) = engine(provider.clone());
        let ctx = RetrievedContext::default();

        let first = engine.reason("structure my essay on my summer job", &ctx).await.unwrap();
        let second = engine.reason("structure my essay on my summer job", &ctx).await.unwrap();

        assert_eq!(provider.calls(), 1);
        assert!(!first.has_tag(DecisionTag::Cached));
        assert!(second.has_tag(DecisionTag::Cached));
        assert_eq!(second.capability.as_deref(), Some("outline"));
        assert_eq!(engine.metrics().cache_hits, 1);
    }

    #[tokio::test]
    async fn unstructured_reply_falls_back_to_text() {
        let provider = Arc::new(ScriptedProvider::new(vec!["Keep going, you're doing great.".to_string()]));
        let (mut engine, optimizer) = engine(provider);
        let result = engine.reason("thanks for that", &RetrievedContext::default()).await.unwrap();
        assert!(result.has_tag(DecisionTag::Fallback));
        assert_eq!(result.response_text.as_deref(), Some("Keep going, you're doing great."));
        assert_eq!(engine.cache_len(), 0);
        // a structureless reply counts against the prompt
        assert_eq!(optimizer.prompt(DECISION_PROMPT_ID).unwrap().metrics.successful_uses, 0);
    }

    #[tokio::test]
    async fn selector_overrides_when_confident() {
        let provider = Arc::new(ScriptedProvider::new(vec![decision_json("conversation", None, json!({}), 0.6)]));
        let (mut engine, _) = engine(provider);
        let result = engine
            .reason("I have no ideas and I'm stuck on my essay", &RetrievedContext::default())
            .await
            .unwrap();
        assert!(result.has_tag(DecisionTag::SelectorOverride));
        assert_eq!(result.capability.as_deref(), Some("brainstorm"));
        assert!((result.confidence - 0.7).abs() < 1e-6);
        assert_eq!(result.steps.len(), 3);
        // the request itself is not a topic; argument rules fill it in later
        assert!(result.tool_args.get("topic").is_none());
    }

    #[tokio::test]
    async fn selector_does_not_override_matching_choice() {
        let provider = Arc::new(ScriptedProvider::new(vec![decision_json(
            "tool_execution",
            Some("brainstorm"),
            json!({"topic": "robots"}),
            0.9,
        )]));
        let (mut engine, _) = engine(provider);
        let result = engine
            .reason("I need ideas, stuck on robots", &RetrievedContext::default())
            .await
            .unwrap();
        assert!(!result.has_tag(DecisionTag::SelectorOverride));
        assert_eq!(result.tool_args["topic"], "robots");
    }

    #[tokio::test]
    async fn successful_decision_is_reported_to_optimizer() {
        let provider = Arc::new(ScriptedProvider::new(vec![decision_json("conversation", None, json!({}), 0.9)]));
        let (mut engine, optimizer) = engine(provider);
        let result = engine.reason("what makes a good hook", &RetrievedContext::default()).await.unwrap();
        assert_eq!(result.prompt_id.as_deref(), Some(DECISION_PROMPT_ID));
        let metrics = optimizer.prompt(DECISION_PROMPT_ID).unwrap().metrics;
        assert_eq!(metrics.successful_uses, 1);
    }
}
