//! Per-turn value objects carried from the Reason and Act phases to the
//! orchestrator. Their content is folded into log records; they are never
//! persisted directly.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::capability::CapabilityArgs;
use crate::record::{ReasoningStep, clamp_unit};

/// What the reasoning engine decided to do with the turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    ToolExecution,
    #[default]
    Conversation,
}

impl ResponseType {
    /// Parse a raw `response_type`; anything unknown becomes `Conversation`.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "tool_execution" => Self::ToolExecution,
            _ => Self::Conversation,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ToolExecution => "tool_execution",
            Self::Conversation => "conversation",
        }
    }
}

/// Provenance markers attached to a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionTag {
    /// Produced by a zero-LLM fast path
    FastPath,
    /// Reused from the prompt-response cache
    Cached,
    /// Raw LLM text used because structured parsing failed
    Fallback,
    /// The capability selector overrode the LLM's choice
    SelectorOverride,
    /// `tool_execution` without a capability name, coerced to conversation
    MissingCapability,
}

/// The structured decision for one turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningResult {
    pub response_type: ResponseType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability: Option<String>,
    #[serde(default)]
    pub tool_args: CapabilityArgs,
    pub confidence: f32,
    #[serde(default)]
    pub context_understanding: String,
    #[serde(default)]
    pub reasoning: String,
    /// Text to show the user directly (conversation replies, fallback text)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_text: Option<String>,
    #[serde(default)]
    pub context_flags: Vec<String>,
    #[serde(default)]
    pub steps: Vec<ReasoningStep>,
    #[serde(default)]
    pub tags: Vec<DecisionTag>,
    /// Decision prompt (or variant) that produced this result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_id: Option<String>,
    #[serde(default)]
    pub elapsed_ms: u64,
}

impl ReasoningResult {
    /// A conversation decision.
    pub fn conversation(reasoning: impl Into<String>, confidence: f32) -> Self {
        Self {
            response_type: ResponseType::Conversation,
            capability: None,
            tool_args: CapabilityArgs::new(),
            confidence: clamp_unit(confidence),
            context_understanding: String::new(),
            reasoning: reasoning.into(),
            response_text: None,
            context_flags: Vec::new(),
            steps: Vec::new(),
            tags: Vec::new(),
            prompt_id: None,
            elapsed_ms: 0,
        }
    }

    /// A decision to run `capability` with `args`.
    pub fn tool(capability: impl Into<String>, args: CapabilityArgs, confidence: f32) -> Self {
        Self {
            response_type: ResponseType::ToolExecution,
            capability: Some(capability.into()),
            tool_args: args,
            ..Self::conversation(String::new(), confidence)
        }
    }

    pub fn with_response_text(mut self, text: impl Into<String>) -> Self {
        self.response_text = Some(text.into());
        self
    }

    pub fn with_understanding(mut self, text: impl Into<String>) -> Self {
        self.context_understanding = text.into();
        self
    }

    pub fn with_reasoning(mut self, text: impl Into<String>) -> Self {
        self.reasoning = text.into();
        self
    }

    /// Add a tag once.
    pub fn tag(&mut self, tag: DecisionTag) {
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
    }

    pub fn has_tag(&self, tag: DecisionTag) -> bool {
        self.tags.contains(&tag)
    }

    pub fn is_tool_execution(&self) -> bool {
        self.response_type == ResponseType::ToolExecution
    }

    /// `final_action` label for the reasoning chain.
    pub fn action_label(&self) -> String {
        match (&self.response_type, &self.capability) {
            (ResponseType::ToolExecution, Some(name)) => name.clone(),
            _ => ResponseType::Conversation.as_str().to_string(),
        }
    }
}

/// Failure categories the action executor recovers from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    Timeout,
    Validation,
    Network,
    Llm,
    Execution,
}

impl FailureCategory {
    /// Classify an error message by substring.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));
        if has(&["timeout", "timed out"]) {
            Self::Timeout
        } else if has(&["validation", "missing required", "invalid", "not found", "unknown capability"]) {
            Self::Validation
        } else if has(&["network", "connection", "unreachable", "dns"]) {
            Self::Network
        } else if has(&["llm", "provider", "rate limit", "model"]) {
            Self::Llm
        } else {
            Self::Execution
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Validation => "validation",
            Self::Network => "network",
            Self::Llm => "llm",
            Self::Execution => "execution",
        }
    }
}

/// How a failure was turned into something safe to show the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recovery {
    pub category: FailureCategory,
    pub suggestion: String,
}

/// The outcome of the Act phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub response_type: ResponseType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability: Option<String>,
    /// User-facing text
    pub output: String,
    /// Raw capability result
    #[serde(default)]
    pub data: Value,
    pub confidence: f32,
    pub execution_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery: Option<Recovery>,
}

impl ActionResult {
    pub fn conversation(output: impl Into<String>, confidence: f32) -> Self {
        Self {
            success: true,
            response_type: ResponseType::Conversation,
            capability: None,
            output: output.into(),
            data: Value::Null,
            confidence: clamp_unit(confidence),
            execution_time_ms: 0,
            error: None,
            recovery: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_response_type_coerces_to_conversation() {
        assert_eq!(ResponseType::parse_lenient("tool_execution"), ResponseType::ToolExecution);
        assert_eq!(ResponseType::parse_lenient(" Tool_Execution "), ResponseType::ToolExecution);
        assert_eq!(ResponseType::parse_lenient("dance"), ResponseType::Conversation);
    }

    #[test]
    fn tags_are_deduplicated() {
        let mut decision = ReasoningResult::conversation("hi", 0.5);
        decision.tag(DecisionTag::Cached);
        decision.tag(DecisionTag::Cached);
        assert_eq!(decision.tags.len(), 1);
        assert!(decision.has_tag(DecisionTag::Cached));
    }

    #[test]
    fn action_label_uses_capability() {
        let decision = ReasoningResult::tool("brainstorm", CapabilityArgs::new(), 0.9);
        assert_eq!(decision.action_label(), "brainstorm");
        assert_eq!(ReasoningResult::conversation("", 0.5).action_label(), "conversation");
    }

    #[test]
    fn failure_classification() {
        assert_eq!(FailureCategory::classify("Capability x hit its timeout after 5s"), FailureCategory::Timeout);
        assert_eq!(FailureCategory::classify("Capability not found: foo"), FailureCategory::Validation);
        assert_eq!(FailureCategory::classify("connection refused"), FailureCategory::Network);
        assert_eq!(FailureCategory::classify("LLM rate limited"), FailureCategory::Llm);
        assert_eq!(FailureCategory::classify("division by zero"), FailureCategory::Execution);
    }
}
