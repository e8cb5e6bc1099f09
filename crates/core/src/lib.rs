//! # Inkwell Core
//!
//! Domain types, traits, and error definitions for the Inkwell reason-act
//! agent. This crate defines the model every other crate implements against:
//! the LLM [`Provider`], the [`CapabilityRegistry`], the [`PersistentStore`],
//! the immutable log records, and the per-turn decision objects.
//!
//! Collaborators are traits here; implementations live in their own crates
//! so they can be swapped by configuration or replaced with test doubles.

pub mod cache;
pub mod capability;
pub mod decision;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod record;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use cache::BoundedCache;
pub use capability::{
    ArgType, Capability, CapabilityArgs, CapabilityCategory, CapabilityRegistry, CapabilitySchema,
};
pub use decision::{
    ActionResult, DecisionTag, FailureCategory, ReasoningResult, Recovery, ResponseType,
};
pub use error::{
    ActionExecutionError, CapabilityError, Error, ProviderError, ReasoningError, Result, StoreError,
};
pub use event::{DomainEvent, EventBus};
pub use message::{Conversation, Message, Role};
pub use provider::{CompletionRequest, CompletionResponse, Provider, Usage};
pub use record::{ReasoningChain, ReasoningStep, ToolExecution};
pub use store::PersistentStore;
