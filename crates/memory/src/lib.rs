//! Memory system for Inkwell: persistent stores and the per-user indexer.
//!
//! The indexer keeps an append-only log of reasoning chains and tool
//! executions, mines it for usage and error patterns, and answers
//! similarity and statistics queries. Stores are swappable by config.

pub mod file_backend;
pub mod in_memory;
pub mod indexer;
pub mod keywords;
pub mod noop;
pub mod patterns;

pub use file_backend::FileStore;
pub use in_memory::InMemoryStore;
pub use indexer::{MemoryIndexer, MemoryStatistics, SimilarPattern};
pub use noop::NoopStore;
pub use patterns::{ErrorCategory, ErrorPattern, PatternType, Severity, UsagePattern};

use inkwell_config::MemoryConfig;
use inkwell_core::PersistentStore;
use std::sync::Arc;

/// Build the store selected by `memory.backend`.
pub fn create_store(config: &MemoryConfig) -> Arc<dyn PersistentStore> {
    match config.backend.as_str() {
        "none" => Arc::new(NoopStore),
        "memory" => Arc::new(InMemoryStore::new()),
        _ => Arc::new(FileStore::new(config.resolved_data_dir())),
    }
}
