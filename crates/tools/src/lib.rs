//! Built-in capability implementations for Inkwell.
//!
//! Capabilities give the writing coach something to do besides talk:
//! brainstorm essay angles, outline a structure, and measure a draft.
//! Each one declares its schema, category and selector keywords.

pub mod brainstorm;
pub mod outline;
pub mod word_count;

use inkwell_core::capability::CapabilityRegistry;
use std::sync::Arc;

pub use brainstorm::BrainstormCapability;
pub use outline::OutlineCapability;
pub use word_count::WordCountCapability;

/// Create a registry with all built-in capabilities.
pub fn default_registry() -> CapabilityRegistry {
    let mut registry = CapabilityRegistry::new();
    registry.register(Arc::new(BrainstormCapability));
    registry.register(Arc::new(OutlineCapability));
    registry.register(Arc::new(WordCountCapability));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_builtins() {
        let registry = default_registry();
        assert_eq!(registry.names(), vec!["brainstorm", "outline", "word_count"]);
        for (name, schema) in registry.schemas() {
            assert!(!schema.keywords.is_empty(), "{name} declares no keywords");
            assert!(!schema.required_args.is_empty(), "{name} declares no required args");
        }
    }
}
