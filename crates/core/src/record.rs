//! Immutable, user-scoped log records.
//!
//! A [`ReasoningChain`] is written once per turn and a [`ToolExecution`]
//! after every attempted capability run. Both are append-only: the memory
//! indexer never mutates a record once logged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use crate::capability::CapabilityArgs;

/// Clamp a score into `[0, 1]`, mapping NaN to 0.
pub fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

/// One step of reasoning inside a chain. Ordering is significant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningStep {
    pub step_number: usize,
    pub thought: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability_considered: Option<String>,
    pub confidence: f32,
    #[serde(default)]
    pub context_sources_used: Vec<String>,
}

impl ReasoningStep {
    pub fn new(
        step_number: usize,
        thought: impl Into<String>,
        capability_considered: Option<String>,
        confidence: f32,
        context_sources_used: Vec<String>,
    ) -> Self {
        Self {
            step_number,
            thought: thought.into(),
            capability_considered,
            confidence: clamp_unit(confidence),
            context_sources_used,
        }
    }
}

/// The recorded reasoning and outcome of one turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningChain {
    pub id: String,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    pub user_input: String,
    pub reasoning_steps: Vec<ReasoningStep>,
    /// `conversation` or the capability name that was run
    pub final_action: String,
    pub result: String,
    pub success: bool,
    pub execution_time_ms: u64,
    pub context_token_count: usize,
}

impl ReasoningChain {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: impl Into<String>,
        user_input: impl Into<String>,
        reasoning_steps: Vec<ReasoningStep>,
        final_action: impl Into<String>,
        result: impl Into<String>,
        success: bool,
        execution_time_ms: u64,
        context_token_count: usize,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            timestamp: Utc::now(),
            user_input: user_input.into(),
            reasoning_steps,
            final_action: final_action.into(),
            result: result.into(),
            success,
            execution_time_ms,
            context_token_count,
        }
    }
}

/// The record of one attempted capability execution, success or failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolExecution {
    pub id: String,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    pub capability_name: String,
    pub input_params: CapabilityArgs,
    #[serde(default)]
    pub result: Value,
    pub execution_time_ms: u64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// The reasoning text that led to this execution
    #[serde(default)]
    pub reasoning_context: String,
    pub confidence_score: f32,
    pub token_estimate: usize,
}

impl ToolExecution {
    /// Start a record for `capability_name`; finish it with
    /// [`succeeded`](Self::succeeded) or [`failed`](Self::failed).
    pub fn begin(
        user_id: impl Into<String>,
        capability_name: impl Into<String>,
        input_params: CapabilityArgs,
        reasoning_context: impl Into<String>,
        confidence_score: f32,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            timestamp: Utc::now(),
            capability_name: capability_name.into(),
            input_params,
            result: Value::Null,
            execution_time_ms: 0,
            success: false,
            error_message: None,
            reasoning_context: reasoning_context.into(),
            confidence_score: clamp_unit(confidence_score),
            token_estimate: 0,
        }
    }

    pub fn succeeded(mut self, result: Value, execution_time_ms: u64) -> Self {
        self.token_estimate = estimate_value_tokens(&self.input_params, &result);
        self.result = result;
        self.execution_time_ms = execution_time_ms;
        self.success = true;
        self
    }

    pub fn failed(mut self, error_message: impl Into<String>, execution_time_ms: u64) -> Self {
        self.token_estimate = estimate_value_tokens(&self.input_params, &Value::Null);
        self.error_message = Some(error_message.into());
        self.execution_time_ms = execution_time_ms;
        self.success = false;
        self
    }
}

// ~4 characters per token over the serialized params and result
fn estimate_value_tokens(params: &CapabilityArgs, result: &Value) -> usize {
    let params_len = serde_json::to_string(params).map(|s| s.len()).unwrap_or(0);
    let result_len = match result {
        Value::Null => 0,
        Value::String(s) => s.len(),
        other => other.to_string().len(),
    };
    (params_len + result_len).div_ceil(4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn step_confidence_is_clamped() {
        let step = ReasoningStep::new(1, "thinking", None, 1.7, vec![]);
        assert_eq!(step.confidence, 1.0);
        let step = ReasoningStep::new(2, "thinking", None, f32::NAN, vec![]);
        assert_eq!(step.confidence, 0.0);
    }

    #[test]
    fn execution_lifecycle() {
        let mut params = CapabilityArgs::new();
        params.insert("topic".into(), json!("failure"));
        let exec = ToolExecution::begin("u1", "brainstorm", params, "wants ideas", 0.9)
            .succeeded(json!("1. Learning from loss"), 12);
        assert!(exec.success);
        assert_eq!(exec.execution_time_ms, 12);
        assert!(exec.token_estimate > 0);
        assert!(exec.error_message.is_none());
    }

    #[test]
    fn failed_execution_keeps_message() {
        let exec = ToolExecution::begin("u1", "outline", CapabilityArgs::new(), "", 0.5)
            .failed("Capability outline hit its timeout after 60s", 60_000);
        assert!(!exec.success);
        assert!(exec.error_message.unwrap().contains("timeout"));
    }
}
