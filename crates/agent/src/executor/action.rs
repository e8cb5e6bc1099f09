//! The action executor: validates a decision's arguments and runs the chosen
//! capability under a timeout.

use crate::executor::recovery::{recover, recover_as};
use crate::executor::rules::ArgumentRules;
use inkwell_config::{CategoryTimeouts, ExecutorConfig};
use inkwell_core::capability::{ArgType, CapabilityArgs, CapabilityCategory, CapabilityRegistry, CapabilitySchema};
use inkwell_core::decision::{ActionResult, FailureCategory, ReasoningResult, ResponseType};
use inkwell_core::error::{ActionExecutionError, ReasoningError};
use inkwell_core::record::ToolExecution;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Shown when a capability succeeds but returns nothing.
const EMPTY_RESULT_TEXT: &str = "Done. That didn't produce anything to show, so tell me what you'd like next.";

#[derive(Debug, Clone, Default, Serialize)]
pub struct CapabilityStats {
    pub count: u64,
    pub successes: u64,
    /// Running mean over all attempts
    pub avg_time_ms: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionMetrics {
    pub executions: u64,
    pub successes: u64,
    pub failures: u64,
    pub recoveries: u64,
    pub total_time_ms: u64,
    pub per_capability: BTreeMap<String, CapabilityStats>,
}

pub struct ActionExecutor {
    user_id: String,
    registry: Arc<CapabilityRegistry>,
    rules: ArgumentRules,
    category_timeouts: CategoryTimeouts,
    timeout_overrides: HashMap<String, u64>,
    metrics: ExecutionMetrics,
    /// Execution records not yet handed to the memory indexer
    pending: Vec<ToolExecution>,
}

impl ActionExecutor {
    pub fn new(user_id: impl Into<String>, registry: Arc<CapabilityRegistry>, config: &ExecutorConfig) -> Self {
        Self {
            user_id: user_id.into(),
            registry,
            rules: ArgumentRules::from_config(config),
            category_timeouts: config.category_timeouts.clone(),
            timeout_overrides: config.timeout_overrides.clone(),
            metrics: ExecutionMetrics::default(),
            pending: Vec::new(),
        }
    }

    pub fn metrics(&self) -> &ExecutionMetrics {
        &self.metrics
    }

    /// Drain the execution records produced since the last call.
    pub fn take_executions(&mut self) -> Vec<ToolExecution> {
        std::mem::take(&mut self.pending)
    }

    /// Timeout for a capability: schema, then config override, then category.
    pub fn timeout_for(&self, name: &str, schema: &CapabilitySchema) -> u64 {
        schema
            .timeout_secs
            .or_else(|| self.timeout_overrides.get(name).copied())
            .unwrap_or(match schema.category {
                CapabilityCategory::Generation => self.category_timeouts.generation,
                CapabilityCategory::Analysis => self.category_timeouts.analysis,
                CapabilityCategory::Lookup => self.category_timeouts.lookup,
                CapabilityCategory::Utility => self.category_timeouts.utility,
            })
    }

    /// Carry out a decision. Tool failures are returned as errors; the failed
    /// attempt is still recorded.
    pub async fn act(&mut self, decision: &ReasoningResult) -> Result<ActionResult, ActionExecutionError> {
        match (&decision.response_type, &decision.capability) {
            (ResponseType::ToolExecution, Some(name)) => self.run_capability(name, decision).await,
            _ => Ok(ActionResult::conversation(conversation_reply(decision), decision.confidence)),
        }
    }

    /// Like [`act`](Self::act) but never fails: errors become a recovery
    /// result for their failure category.
    pub async fn act_with_recovery(&mut self, decision: &ReasoningResult) -> ActionResult {
        match self.act(decision).await {
            Ok(result) => result,
            Err(e) => {
                self.metrics.recoveries += 1;
                let result = recover(&e.to_string(), Some(e.capability()), decision.confidence);
                if let Some(recovery) = &result.recovery {
                    warn!(
                        user_id = %self.user_id,
                        capability = e.capability(),
                        category = recovery.category.as_str(),
                        error = %e,
                        "Action failed, recovered"
                    );
                }
                result
            }
        }
    }

    /// Recovery for a turn whose reasoning failed outright.
    pub fn recover_reasoning_failure(&mut self, error: &ReasoningError) -> ActionResult {
        self.metrics.recoveries += 1;
        recover_as(FailureCategory::Llm, &error.to_string(), None, 0.5)
    }

    async fn run_capability(
        &mut self,
        name: &str,
        decision: &ReasoningResult,
    ) -> Result<ActionResult, ActionExecutionError> {
        let started = Instant::now();
        let args = self.rules.resolve(name, decision.tool_args.clone());
        let record = ToolExecution::begin(
            &self.user_id,
            name,
            args.clone(),
            &decision.reasoning,
            decision.confidence,
        );

        let outcome = self.invoke(name, args).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(value) => {
                let value = if value.is_null() {
                    Value::String(EMPTY_RESULT_TEXT.to_string())
                } else {
                    value
                };
                self.pending.push(record.succeeded(value.clone(), elapsed_ms));
                self.update_stats(name, true, elapsed_ms, true);
                info!(user_id = %self.user_id, capability = name, elapsed_ms, "Capability executed");

                Ok(ActionResult {
                    success: true,
                    response_type: ResponseType::ToolExecution,
                    capability: Some(name.to_string()),
                    output: render_output(&value),
                    data: value,
                    confidence: decision.confidence,
                    execution_time_ms: elapsed_ms,
                    error: None,
                    recovery: None,
                })
            }
            Err(e) => {
                self.pending.push(record.failed(e.to_string(), elapsed_ms));
                // invented names count as failures but get no stats entry
                let known = !matches!(e, ActionExecutionError::CapabilityNotFound(_));
                self.update_stats(name, false, elapsed_ms, known);
                Err(e)
            }
        }
    }

    /// Validate already-resolved arguments and run under the timeout.
    async fn invoke(&self, name: &str, args: CapabilityArgs) -> Result<Value, ActionExecutionError> {
        let capability = self
            .registry
            .get(name)
            .ok_or_else(|| ActionExecutionError::CapabilityNotFound(name.to_string()))?;
        let schema = capability.schema();
        validate(name, &schema, &args)?;

        let timeout_secs = self.timeout_for(name, &schema);
        debug!(capability = name, timeout_secs, "Invoking capability");
        match tokio::time::timeout(Duration::from_secs(timeout_secs), capability.invoke(args)).await {
            Err(_) => Err(ActionExecutionError::Timeout {
                capability: name.to_string(),
                timeout_secs,
            }),
            Ok(Err(e)) => Err(ActionExecutionError::ExecutionFailed {
                capability: name.to_string(),
                reason: e.to_string(),
            }),
            Ok(Ok(value)) => Ok(value),
        }
    }

    fn update_stats(&mut self, name: &str, success: bool, elapsed_ms: u64, per_capability: bool) {
        self.metrics.executions += 1;
        self.metrics.total_time_ms += elapsed_ms;
        if success {
            self.metrics.successes += 1;
        } else {
            self.metrics.failures += 1;
        }
        if !per_capability {
            return;
        }
        let stats = self.metrics.per_capability.entry(name.to_string()).or_default();
        stats.count += 1;
        if success {
            stats.successes += 1;
        }
        stats.avg_time_ms += (elapsed_ms as f64 - stats.avg_time_ms) / stats.count as f64;
    }
}

/// Required arguments must be present and non-null; declared types must match.
pub fn validate(name: &str, schema: &CapabilitySchema, args: &CapabilityArgs) -> Result<(), ActionExecutionError> {
    for required in &schema.required_args {
        if args.get(required).is_none_or(Value::is_null) {
            return Err(ActionExecutionError::MissingArgument {
                capability: name.to_string(),
                argument: required.clone(),
            });
        }
    }
    for (arg, value) in args {
        let Some(expected) = schema.arg_types.get(arg) else {
            continue;
        };
        if value.is_null() || matches!(expected, ArgType::Any) {
            continue;
        }
        if !expected.matches(value) {
            return Err(ActionExecutionError::InvalidArgument {
                capability: name.to_string(),
                argument: arg.clone(),
                expected: expected.to_string(),
                found: ArgType::describe(value).to_string(),
            });
        }
    }
    Ok(())
}

/// Text for a conversation decision: the model's own reply when it gave
/// one, otherwise a template keyed on the reasoning.
fn conversation_reply(decision: &ReasoningResult) -> String {
    if let Some(text) = decision.response_text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        return text.to_string();
    }
    let reasoning = decision.reasoning.to_lowercase();
    if reasoning.contains("stuck") || reasoning.contains("blocked") {
        "Feeling stuck is a normal part of writing. Let's take one small step: tell me one moment \
         from the last year that you still think about."
            .into()
    } else if reasoning.contains("question") || reasoning.contains("clarif") {
        "I want to make sure I help with the right thing. Could you tell me a little more about \
         what you're working on and where you'd like to go with it?"
            .into()
    } else {
        "That sounds like a good direction. Keep going, and tell me what you'd like to work on next: \
         ideas, structure, or polishing a draft."
            .into()
    }
}

/// User-facing text for a capability result.
fn render_output(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Object(map) => match map.get("text").and_then(Value::as_str) {
            Some(text) => text.to_string(),
            None => serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()),
        },
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{FailingCapability, NullCapability, SlowCapability};
    use inkwell_core::decision::FailureCategory;
    use inkwell_tools::default_registry;
    use serde_json::json;

    fn executor_with(extra: Vec<Arc<dyn inkwell_core::capability::Capability>>) -> ActionExecutor {
        let mut registry = default_registry();
        for capability in extra {
            registry.register(capability);
        }
        ActionExecutor::new("alice", Arc::new(registry), &ExecutorConfig::default())
    }

    fn tool(name: &str, args: Value) -> ReasoningResult {
        ReasoningResult::tool(name, args.as_object().cloned().unwrap(), 0.8).with_reasoning("needs a tool")
    }

    #[tokio::test]
    async fn unknown_capability_is_named() {
        let mut executor = executor_with(vec![]);
        let err = executor.act(&tool("teleport", json!({}))).await.unwrap_err();
        assert!(matches!(&err, ActionExecutionError::CapabilityNotFound(name) if name == "teleport"));
        let records = executor.take_executions();
        assert_eq!(records.len(), 1);
        assert!(!records[0].success);
        assert!(records[0].error_message.as_deref().unwrap().contains("teleport"));
        assert_eq!(executor.metrics().failures, 1);
        assert!(executor.metrics().per_capability.is_empty());
    }

    #[tokio::test]
    async fn missing_required_argument_is_named() {
        let mut executor = executor_with(vec![]);
        let err = executor.act(&tool("word_count", json!({}))).await.unwrap_err();
        assert!(matches!(
            &err,
            ActionExecutionError::MissingArgument { capability, argument }
                if capability == "word_count" && argument == "text"
        ));
        assert_eq!(executor.metrics().failures, 1);
        assert_eq!(executor.metrics().per_capability["word_count"].count, 1);
    }

    #[tokio::test]
    async fn failed_attempts_record_resolved_arguments() {
        let mut executor = executor_with(vec![]);
        executor
            .act(&tool("outline", json!({"subject": "my first job", "sections": "many"})))
            .await
            .unwrap_err();
        let record = &executor.take_executions()[0];
        assert!(!record.success);
        assert_eq!(record.input_params["topic"], "my first job");
        assert!(!record.input_params.contains_key("subject"));
    }

    #[tokio::test]
    async fn wrong_type_is_rejected() {
        let mut executor = executor_with(vec![]);
        let err = executor
            .act(&tool("outline", json!({"topic": "x", "sections": "many"})))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ActionExecutionError::InvalidArgument { ref argument, ref expected, .. }
                if argument == "sections" && expected == "integer"
        ));
    }

    #[tokio::test]
    async fn renamed_arguments_reach_capability() {
        let mut executor = executor_with(vec![]);
        let result = executor
            .act(&tool("word_count", json!({"essay": "one two three"})))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.data["words"], 3);
        assert_eq!(result.confidence, 0.8);
        let record = &executor.take_executions()[0];
        assert!(record.success);
        assert!(record.input_params.contains_key("text"));
        assert_eq!(executor.metrics().per_capability["word_count"].successes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_capability_times_out() {
        let mut executor = executor_with(vec![Arc::new(SlowCapability::new(Duration::from_secs(120)))]);
        let err = executor.act(&tool("slow", json!({}))).await.unwrap_err();
        // utility category default
        assert!(matches!(err, ActionExecutionError::Timeout { timeout_secs: 30, .. }));

        let recovered = executor.act_with_recovery(&tool("slow", json!({}))).await;
        assert!(!recovered.success);
        assert_eq!(recovered.recovery.unwrap().category, FailureCategory::Timeout);
        assert_eq!(executor.metrics().recoveries, 1);
        assert_eq!(executor.take_executions().len(), 2);
    }

    #[test]
    fn timeout_precedence() {
        let mut config = ExecutorConfig::default();
        config.timeout_overrides.insert("outline".into(), 5);
        let executor = ActionExecutor::new("alice", Arc::new(default_registry()), &config);

        let outline = CapabilitySchema::new("o").category(CapabilityCategory::Generation);
        assert_eq!(executor.timeout_for("outline", &outline), 5);
        assert_eq!(executor.timeout_for("other", &outline), 60);
        let pinned = outline.timeout(Duration::from_secs(2));
        assert_eq!(executor.timeout_for("outline", &pinned), 2);
        let analysis = CapabilitySchema::new("a").category(CapabilityCategory::Analysis);
        assert_eq!(executor.timeout_for("x", &analysis), 45);
    }

    #[tokio::test]
    async fn capability_error_becomes_execution_failure() {
        let mut executor = executor_with(vec![Arc::new(FailingCapability)]);
        let result = executor.act_with_recovery(&tool("failing", json!({}))).await;
        assert!(!result.success);
        assert_eq!(result.recovery.unwrap().category, FailureCategory::Execution);
    }

    #[tokio::test]
    async fn null_result_becomes_placeholder() {
        let mut executor = executor_with(vec![Arc::new(NullCapability)]);
        let result = executor.act(&tool("null", json!({}))).await.unwrap();
        assert_eq!(result.output, EMPTY_RESULT_TEXT);
    }

    #[tokio::test]
    async fn conversation_templates() {
        let mut executor = executor_with(vec![]);
        let given = ReasoningResult::conversation("", 0.7).with_response_text("Nice work!");
        assert_eq!(executor.act(&given).await.unwrap().output, "Nice work!");

        let stuck = ReasoningResult::conversation("student is stuck", 0.7);
        assert!(executor.act(&stuck).await.unwrap().output.contains("stuck"));
        let question = ReasoningResult::conversation("needs clarification", 0.7);
        assert!(executor.act(&question).await.unwrap().output.contains("tell me a little more"));
        let other = ReasoningResult::conversation("small talk", 0.7);
        assert!(executor.act(&other).await.unwrap().success);
        assert!(executor.take_executions().is_empty());
    }

    #[tokio::test]
    async fn reasoning_failure_recovers_as_conversation() {
        let mut executor = executor_with(vec![]);
        let result = executor.recover_reasoning_failure(&ReasoningError::RetriesExhausted {
            attempts: 3,
            last_error: "LLM request timeout: 60s".into(),
        });
        assert!(result.success);
        assert_eq!(result.recovery.unwrap().category, FailureCategory::Llm);
    }
}
