//! Persistent store trait: per-user append streams plus a small keyed map.
//!
//! The memory indexer appends reasoning chains and tool executions to
//! streams, and keeps profile, statistics and prompt metrics under keys.
//! Every call is scoped by `user_id`; implementations must never mix data
//! across users. Writes are best-effort from the caller's point of view.

use async_trait::async_trait;
use serde_json::Value;
use crate::error::StoreError;

/// Stream holding serialized `ReasoningChain` records.
pub const REASONING_STREAM: &str = "reasoning_chains";

/// Stream holding serialized `ToolExecution` records.
pub const EXECUTION_STREAM: &str = "tool_executions";

/// The core PersistentStore trait.
///
/// Implementations: in-memory (testing), JSONL files, none (no-op).
#[async_trait]
pub trait PersistentStore: Send + Sync {
    /// The backend name (e.g., "file", "memory", "none").
    fn name(&self) -> &str;

    /// Append one record to a user's stream.
    async fn append(&self, user_id: &str, stream: &str, record: Value) -> std::result::Result<(), StoreError>;

    /// Read a user's stream, oldest first.
    async fn read_stream(&self, user_id: &str, stream: &str) -> std::result::Result<Vec<Value>, StoreError>;

    /// Set a keyed value for a user, replacing any previous snapshot.
    async fn put(&self, user_id: &str, key: &str, value: Value) -> std::result::Result<(), StoreError>;

    /// Get the most recent snapshot for a key.
    async fn get(&self, user_id: &str, key: &str) -> std::result::Result<Option<Value>, StoreError>;

    /// Approximate bytes held for a user.
    async fn footprint(&self, _user_id: &str) -> std::result::Result<u64, StoreError> {
        Ok(0)
    }
}
