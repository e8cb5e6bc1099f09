//! Turning failures into something safe to show the student.

use inkwell_core::decision::{ActionResult, FailureCategory, Recovery, ResponseType};
use serde_json::Value;

/// Classify `error` and build the category's recovery result.
pub fn recover(error: &str, capability: Option<&str>, confidence: f32) -> ActionResult {
    recover_as(FailureCategory::classify(error), error, capability, confidence)
}

pub fn recover_as(
    category: FailureCategory,
    error: &str,
    capability: Option<&str>,
    confidence: f32,
) -> ActionResult {
    let what = capability.unwrap_or("that");
    let (success, output, suggestion) = match category {
        FailureCategory::Timeout => (
            false,
            format!("Running {what} took longer than expected. Try again with a shorter piece of text, or ask me in a moment."),
            "retry with smaller input",
        ),
        FailureCategory::Validation => (
            false,
            format!("I couldn't run {what} because some details were missing or didn't look right. Could you tell me a bit more about what you need?"),
            "provide the missing or corrected details",
        ),
        FailureCategory::Network => (
            false,
            "I'm having trouble reaching a service I rely on. Please try again shortly.".to_string(),
            "check the connection and retry",
        ),
        FailureCategory::Llm => (
            true,
            "I'm having a little trouble thinking that through right now, but let's keep going. \
             Tell me where you are with your essay and what you'd like to work on next."
                .to_string(),
            "continue the conversation; reasoning will be retried next turn",
        ),
        FailureCategory::Execution => (
            false,
            format!("Something went wrong while running {what}. Let's try a different approach."),
            "try another capability or rephrase the request",
        ),
    };

    ActionResult {
        success,
        response_type: if success { ResponseType::Conversation } else { ResponseType::ToolExecution },
        capability: capability.map(str::to_string),
        output,
        data: Value::Null,
        confidence: if success { confidence.min(0.5) } else { 0.0 },
        execution_time_ms: 0,
        error: Some(error.to_string()),
        recovery: Some(Recovery {
            category,
            suggestion: suggestion.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_category_has_user_safe_output() {
        let cases = [
            ("Capability outline hit its timeout after 60s", FailureCategory::Timeout, false),
            ("missing required argument 'topic'", FailureCategory::Validation, false),
            ("connection refused", FailureCategory::Network, false),
            ("LLM call failed after 3 attempts", FailureCategory::Llm, true),
            ("division by zero", FailureCategory::Execution, false),
        ];
        for (error, category, success) in cases {
            let result = recover(error, Some("outline"), 0.9);
            let recovery = result.recovery.as_ref().unwrap();
            assert_eq!(recovery.category, category, "{error}");
            assert_eq!(result.success, success, "{error}");
            assert!(!result.output.contains(error), "raw error leaked for {error}");
            assert_eq!(result.error.as_deref(), Some(error));
        }
    }

    #[test]
    fn llm_recovery_is_conversational() {
        let result = recover_as(FailureCategory::Llm, "provider down", None, 0.9);
        assert_eq!(result.response_type, ResponseType::Conversation);
        assert!(result.confidence <= 0.5);
    }
}
