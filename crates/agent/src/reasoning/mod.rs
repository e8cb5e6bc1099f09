//! Reasoning: fast paths, prompt selection, cached and retried LLM calls,
//! lenient parsing, and a selector cross-check.

pub mod engine;
pub mod fast_path;
pub mod parse;
pub mod prompt;
pub mod selector;

pub use engine::{ReasoningEngine, ReasoningMetrics};
pub use parse::{ParseOutcome, parse_decision};
pub use prompt::{
    CONCISE_DECISION_TEMPLATE, DECISION_PROMPT_ID, DEFAULT_DECISION_TEMPLATE, PromptRenderer, PromptVars,
    TemplateRenderer,
};
pub use selector::{CapabilitySelector, CapabilitySuggestion, KeywordSelector};
