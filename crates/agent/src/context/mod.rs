//! Context assembly: merges conversation history, the user profile,
//! session statistics and pattern summaries into a bounded context.
//!
//! | Source | Weight | Recency |
//! |--------|--------|---------|
//! | profile | 0.9 | none |
//! | history | 0.7 | newest turn first |
//! | patterns | 0.6 | none |
//! | session_stats | 0.5 | none |
//!
//! When the assembled elements exceed the token budget, the least relevant
//! ones are dropped first.

pub mod assembler;
pub mod token;

pub use assembler::{ContextAssembler, ContextElement, ContextSource, RawSources, RetrievedContext};
