//! Decision prompt templates, rendering, and cache keys.

use sha2::{Digest, Sha256};

/// Id the decision prompt is registered under with the optimizer.
pub const DECISION_PROMPT_ID: &str = "decision";

pub const DEFAULT_DECISION_TEMPLATE: &str = "\
You are Inkwell, a warm and practical college essay writing coach.
Decide whether to run one of the available capabilities or to reply conversationally.

Respond with a single JSON object and nothing else:
{\"context_understanding\": \"...\", \"reasoning\": \"...\", \"response_type\": \"tool_execution\" | \"conversation\", \
\"tool_name\": \"...\", \"tool_args\": {}, \"confidence\": 0.0-1.0, \"context_flags\": [], \"response\": \"...\"}

Available capabilities:
{capabilities}

Context:
{context}

Student: {user_input}
";

/// Built-in variant: shorter, pushes toward action.
pub const CONCISE_DECISION_TEMPLATE: &str = "\
Inkwell essay coach. Pick the single best next step for the student.
Prefer a capability when one clearly fits; otherwise reply briefly and kindly.

Output only JSON with keys context_understanding, reasoning, response_type \
(tool_execution or conversation), tool_name, tool_args, confidence, context_flags, response.

Capabilities:
{capabilities}

Context:
{context}

Student: {user_input}
";

/// Values substituted into a template.
pub struct PromptVars<'a> {
    pub user_input: &'a str,
    pub context: &'a str,
    pub capabilities: &'a str,
}

/// Turns a template plus variables into the final prompt text.
pub trait PromptRenderer: Send + Sync {
    fn render(&self, template: &str, vars: &PromptVars<'_>) -> String;
}

/// Replaces `{user_input}`, `{context}` and `{capabilities}` placeholders.
pub struct TemplateRenderer;

impl PromptRenderer for TemplateRenderer {
    fn render(&self, template: &str, vars: &PromptVars<'_>) -> String {
        template
            .replace("{capabilities}", vars.capabilities)
            .replace("{context}", vars.context)
            .replace("{user_input}", vars.user_input)
    }
}

fn prefix(text: &str, chars: usize) -> String {
    text.chars().take(chars).collect()
}

/// SHA-256 over the prompt prefix, the input prefix and the context
/// signature. Prefix truncation can alias long requests that only differ
/// late in the text.
pub fn cache_key(
    prompt: &str,
    prompt_prefix_chars: usize,
    user_input: &str,
    input_prefix_chars: usize,
    signature: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prefix(prompt, prompt_prefix_chars).as_bytes());
    hasher.update([0x1f]);
    hasher.update(prefix(user_input, input_prefix_chars).as_bytes());
    hasher.update([0x1f]);
    hasher.update(signature.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_all_placeholders() {
        let out = TemplateRenderer.render(
            DEFAULT_DECISION_TEMPLATE,
            &PromptVars {
                user_input: "help with my intro",
                context: "[profile] mood: calm",
                capabilities: "- outline",
            },
        );
        assert!(out.contains("Student: help with my intro"));
        assert!(out.contains("- outline"));
        assert!(!out.contains("{context}"));
    }

    #[test]
    fn cache_key_is_stable_hex() {
        let a = cache_key("prompt", 500, "input", 200, "sig");
        let b = cache_key("prompt", 500, "input", 200, "sig");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, cache_key("prompt", 500, "input", 200, "other"));
    }

    #[test]
    fn cache_key_only_sees_prefixes() {
        let a = cache_key("prompt", 3, "same start A", 10, "sig");
        let b = cache_key("proMPT", 3, "same start B", 10, "sig");
        assert_eq!(a, b);
    }
}
