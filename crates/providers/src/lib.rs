//! LLM Provider implementations for Inkwell.
//!
//! All providers implement the `inkwell_core::Provider` trait. The reasoning
//! engine only needs `prompt -> text`, so a provider here is a thin HTTP
//! client; retries live in the engine.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;
