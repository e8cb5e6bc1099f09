//! Zero-LLM decisions for requests that never need the model.

use inkwell_core::capability::{CapabilityArgs, CapabilityRegistry};
use inkwell_core::decision::{DecisionTag, ReasoningResult};
use inkwell_memory::keywords::extract_keywords;
use serde_json::Value;

pub const FAST_PATH_CONFIDENCE: f32 = 0.8;

const HELP_SYNONYMS: &[&str] = &[
    "help",
    "help me",
    "?",
    "commands",
    "menu",
    "options",
    "what can you do",
    "what do you do",
    "how does this work",
];

const BRAINSTORM_MAX_WORDS: usize = 4;
const BRAINSTORM_FILLER: &[&str] = &["ideas", "idea", "topics", "essay"];

fn normalize(input: &str) -> String {
    let lower = input.trim().to_lowercase();
    if lower == "?" {
        return lower;
    }
    lower.trim_end_matches(['?', '!', '.']).trim().to_string()
}

/// A deterministic decision for help requests and short brainstorm requests.
pub fn try_fast_path(input: &str, registry: &CapabilityRegistry) -> Option<ReasoningResult> {
    let normalized = normalize(input);

    if HELP_SYNONYMS.contains(&normalized.as_str()) {
        let mut result = ReasoningResult::conversation("help request", FAST_PATH_CONFIDENCE)
            .with_understanding("The student wants to know what I can do")
            .with_response_text(help_text(registry));
        result.tag(DecisionTag::FastPath);
        return Some(result);
    }

    let words: Vec<&str> = normalized.split_whitespace().collect();
    if registry.has("brainstorm")
        && words.len() <= BRAINSTORM_MAX_WORDS
        && words.iter().any(|w| w.starts_with("brainstorm"))
    {
        let topic: Vec<String> = extract_keywords(&normalized)
            .into_iter()
            .filter(|w| !w.starts_with("brainstorm") && !BRAINSTORM_FILLER.contains(&w.as_str()))
            .collect();
        let mut args = CapabilityArgs::new();
        if !topic.is_empty() {
            args.insert("topic".into(), Value::String(topic.join(" ")));
        }
        let mut result = ReasoningResult::tool("brainstorm", args, FAST_PATH_CONFIDENCE)
            .with_understanding("Short brainstorming request")
            .with_reasoning("Brainstorm requests map directly to the brainstorm capability");
        result.tag(DecisionTag::FastPath);
        return Some(result);
    }

    None
}

fn help_text(registry: &CapabilityRegistry) -> String {
    let mut text = String::from("I'm your essay coach. Here's what I can do:\n");
    for (name, schema) in registry.schemas() {
        text.push_str(&format!("- {name}: {}\n", schema.description));
    }
    text.push_str("Or just tell me where you are with your essay and we'll talk it through.");
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkwell_core::decision::ResponseType;
    use inkwell_tools::default_registry;

    #[test]
    fn help_synonyms_are_conversation() {
        let registry = default_registry();
        for input in ["help", "  HELP ", "?", "What can you do?", "menu"] {
            let result = try_fast_path(input, &registry).unwrap();
            assert_eq!(result.response_type, ResponseType::Conversation, "{input}");
            assert_eq!(result.confidence, FAST_PATH_CONFIDENCE);
            assert!(result.has_tag(DecisionTag::FastPath));
            assert!(result.response_text.as_deref().unwrap().contains("outline"));
        }
    }

    #[test]
    fn short_brainstorm_runs_capability() {
        let registry = default_registry();
        let result = try_fast_path("brainstorm about failure", &registry).unwrap();
        assert_eq!(result.capability.as_deref(), Some("brainstorm"));
        assert_eq!(result.tool_args["topic"], "failure");
    }

    #[test]
    fn conversational_filler_is_not_a_topic() {
        let registry = default_registry();
        for input in ["help me brainstorm", "let's brainstorm", "can you brainstorm?", "brainstorm with me"] {
            let result = try_fast_path(input, &registry).unwrap();
            assert_eq!(result.capability.as_deref(), Some("brainstorm"), "{input}");
            assert!(result.tool_args.get("topic").is_none(), "{input}: {:?}", result.tool_args);
        }
    }

    #[test]
    fn long_or_unrelated_input_falls_through() {
        let registry = default_registry();
        assert!(try_fast_path("can you brainstorm with me about my summer job at the lake", &registry).is_none());
        assert!(try_fast_path("help me fix my conclusion", &registry).is_none());
        assert!(try_fast_path("brainstorm", &CapabilityRegistry::new()).is_none());
    }

    #[test]
    fn deterministic() {
        let registry = default_registry();
        let a = try_fast_path("brainstorm", &registry).unwrap();
        let b = try_fast_path("brainstorm", &registry).unwrap();
        assert_eq!(a.tool_args, b.tool_args);
        assert_eq!(a.capability, b.capability);
    }
}
