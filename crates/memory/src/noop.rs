//! No-op store: disables persistence entirely.

use async_trait::async_trait;
use inkwell_core::error::StoreError;
use inkwell_core::store::PersistentStore;
use serde_json::Value;

/// A store that keeps nothing. Sessions still work; history is lost on exit.
pub struct NoopStore;

#[async_trait]
impl PersistentStore for NoopStore {
    fn name(&self) -> &str {
        "none"
    }

    async fn append(&self, _user_id: &str, _stream: &str, _record: Value) -> Result<(), StoreError> {
        Ok(())
    }

    async fn read_stream(&self, _user_id: &str, _stream: &str) -> Result<Vec<Value>, StoreError> {
        Ok(Vec::new())
    }

    async fn put(&self, _user_id: &str, _key: &str, _value: Value) -> Result<(), StoreError> {
        Ok(())
    }

    async fn get(&self, _user_id: &str, _key: &str) -> Result<Option<Value>, StoreError> {
        Ok(None)
    }
}
