//! Lenient parsing of the LLM's decision text.

use inkwell_core::capability::CapabilityArgs;
use inkwell_core::decision::{DecisionTag, ReasoningResult, ResponseType};
use inkwell_core::record::ReasoningStep;
use serde_json::{Map, Value};

const DEFAULT_CONFIDENCE: f32 = 0.5;
const REQUIRED_FIELDS: &[&str] = &["context_understanding", "reasoning", "response_type"];

/// What a raw LLM response turned into.
#[derive(Debug, Clone)]
pub enum ParseOutcome {
    /// A structured decision
    Decision(ReasoningResult),
    /// No usable structure, but text worth showing the user
    Fallback(String),
    /// Nothing usable at all
    Invalid,
}

/// Drop markdown code fences, keeping their contents.
fn strip_fences(raw: &str) -> String {
    raw.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn locate_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn text_field(obj: &Map<String, Value>, key: &str) -> String {
    match obj.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn confidence(value: Option<&Value>) -> f32 {
    value
        .and_then(Value::as_f64)
        .filter(|c| (0.0..=1.0).contains(c))
        .map(|c| c as f32)
        .unwrap_or(DEFAULT_CONFIDENCE)
}

pub fn parse_decision(raw: &str) -> ParseOutcome {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return ParseOutcome::Invalid;
    }

    let unfenced = strip_fences(trimmed);
    let parsed = locate_object(&unfenced).and_then(|json| serde_json::from_str::<Value>(json).ok());
    let Some(Value::Object(obj)) = parsed else {
        return ParseOutcome::Fallback(trimmed.to_string());
    };
    if REQUIRED_FIELDS.iter().any(|f| !obj.contains_key(*f)) {
        return ParseOutcome::Fallback(trimmed.to_string());
    }

    let response_type = obj
        .get("response_type")
        .and_then(Value::as_str)
        .map(ResponseType::parse_lenient)
        .unwrap_or_default();
    let capability = ["tool_name", "capability", "tool"]
        .iter()
        .map(|k| text_field(&obj, k))
        .find(|name| !name.is_empty());
    let tool_args: CapabilityArgs = match obj.get("tool_args") {
        Some(Value::Object(args)) => args.clone(),
        _ => CapabilityArgs::new(),
    };
    let context_flags = match obj.get("context_flags") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
            .collect(),
        _ => Vec::new(),
    };
    let confidence = confidence(obj.get("confidence"));
    let understanding = text_field(&obj, "context_understanding");
    let reasoning = text_field(&obj, "reasoning");
    let response_text = ["response", "response_text"]
        .iter()
        .map(|k| text_field(&obj, k))
        .find(|text| !text.is_empty());

    let mut result = match (response_type, capability) {
        (ResponseType::ToolExecution, Some(name)) => ReasoningResult::tool(name, tool_args, confidence),
        (ResponseType::ToolExecution, None) => {
            let mut r = ReasoningResult::conversation(String::new(), confidence);
            r.tag(DecisionTag::MissingCapability);
            r
        }
        (ResponseType::Conversation, _) => ReasoningResult::conversation(String::new(), confidence),
    }
    .with_understanding(understanding.clone())
    .with_reasoning(reasoning.clone());
    result.response_text = response_text;
    result.context_flags = context_flags;
    result.steps = vec![
        ReasoningStep::new(1, understanding, None, confidence, Vec::new()),
        ReasoningStep::new(2, reasoning, result.capability.clone(), confidence, Vec::new()),
    ];

    ParseOutcome::Decision(result)
}
