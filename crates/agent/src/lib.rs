//! The Inkwell agent: a Reason-Act loop for essay coaching.
//!
//! Each user turn runs through four stages:
//!
//! 1. **Observe**: assemble a token-budgeted context from history, the
//!    user's profile, session stats and learned patterns
//! 2. **Reason**: fast paths, then an optimizer-chosen prompt sent to the
//!    LLM (cached, retried, leniently parsed, cross-checked)
//! 3. **Act**: validate and run the chosen capability under a timeout, or
//!    reply conversationally; failures become user-safe replies
//! 4. **Learn**: record the reasoning chain and executions, refresh
//!    patterns and tune prompts
//!
//! [`Orchestrator`] is the entry point.

pub mod context;
pub mod executor;
pub mod orchestrator;
pub mod profile;
pub mod reasoning;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use context::{ContextAssembler, ContextElement, ContextSource, RawSources, RetrievedContext};
pub use executor::{ActionExecutor, ArgumentRule, ArgumentRules, ExecutionMetrics};
pub use orchestrator::{Orchestrator, PROMPT_METRICS_KEY, SessionMetrics};
pub use profile::{PROFILE_KEY, UserProfile};
pub use reasoning::{CapabilitySelector, KeywordSelector, ReasoningEngine, ReasoningMetrics};
