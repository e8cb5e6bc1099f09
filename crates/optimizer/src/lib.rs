//! Prompt optimization for Inkwell.
//!
//! Tracks how each decision prompt performs (success, satisfaction,
//! latency, confidence), overall and per context signature, selects the
//! best prompt for the current context, runs A/B experiments between a
//! base prompt and its variants, and archives variants that keep losing.

pub mod engine;
pub mod model;
pub mod signature;

pub use engine::PromptOptimizer;
pub use model::{
    Experiment, MetricsSettings, OptimizationReport, OptimizerSnapshot, Outcome, PromptChoice,
    PromptPerformanceMetrics, PromptSummary, PromptVariant, SpecializationCandidate,
};
pub use signature::ContextSignals;

/// Errors from the prompt optimizer.
#[derive(Debug, thiserror::Error)]
pub enum OptimizerError {
    #[error("unknown prompt: {0}")]
    UnknownPrompt(String),

    #[error("experiment for {base} needs at least two active prompts, found {arms}")]
    NotEnoughArms { base: String, arms: usize },

    #[error("an experiment is already running for {0}")]
    ExperimentRunning(String),

    #[error("serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}
