//! In-memory store: useful for testing and ephemeral sessions.

use async_trait::async_trait;
use inkwell_core::error::StoreError;
use inkwell_core::store::PersistentStore;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

type UserScoped<T> = HashMap<(String, String), T>;

/// A store that keeps every user's streams and keys in process memory.
#[derive(Clone)]
pub struct InMemoryStore {
    streams: Arc<RwLock<UserScoped<Vec<Value>>>>,
    keys: Arc<RwLock<UserScoped<Value>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            streams: Arc::new(RwLock::new(HashMap::new())),
            keys: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn scoped(user_id: &str, name: &str) -> (String, String) {
    (user_id.to_string(), name.to_string())
}

#[async_trait]
impl PersistentStore for InMemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn append(&self, user_id: &str, stream: &str, record: Value) -> Result<(), StoreError> {
        self.streams
            .write()
            .await
            .entry(scoped(user_id, stream))
            .or_default()
            .push(record);
        Ok(())
    }

    async fn read_stream(&self, user_id: &str, stream: &str) -> Result<Vec<Value>, StoreError> {
        Ok(self
            .streams
            .read()
            .await
            .get(&scoped(user_id, stream))
            .cloned()
            .unwrap_or_default())
    }

    async fn put(&self, user_id: &str, key: &str, value: Value) -> Result<(), StoreError> {
        self.keys.write().await.insert(scoped(user_id, key), value);
        Ok(())
    }

    async fn get(&self, user_id: &str, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.keys.read().await.get(&scoped(user_id, key)).cloned())
    }

    async fn footprint(&self, user_id: &str) -> Result<u64, StoreError> {
        let streams = self.streams.read().await;
        let keys = self.keys.read().await;
        let stream_bytes: usize = streams
            .iter()
            .filter(|((user, _), _)| user == user_id)
            .flat_map(|(_, records)| records.iter())
            .map(|v| v.to_string().len() + 1)
            .sum();
        let key_bytes: usize = keys
            .iter()
            .filter(|((user, _), _)| user == user_id)
            .map(|(_, v)| v.to_string().len())
            .sum();
        Ok((stream_bytes + key_bytes) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn append_and_read_back_in_order() {
        let store = InMemoryStore::new();
        store.append("u1", "s", json!(1)).await.unwrap();
        store.append("u1", "s", json!(2)).await.unwrap();
        assert_eq!(store.read_stream("u1", "s").await.unwrap(), vec![json!(1), json!(2)]);
    }

    #[tokio::test]
    async fn users_are_isolated() {
        let store = InMemoryStore::new();
        store.append("alice", "s", json!("a")).await.unwrap();
        store.put("alice", "profile", json!({"mood": "calm"})).await.unwrap();

        assert!(store.read_stream("bob", "s").await.unwrap().is_empty());
        assert!(store.get("bob", "profile").await.unwrap().is_none());
        assert_eq!(store.footprint("bob").await.unwrap(), 0);
        assert!(store.footprint("alice").await.unwrap() > 0);
    }

    #[tokio::test]
    async fn put_replaces_previous_value() {
        let store = InMemoryStore::new();
        store.put("u1", "k", json!(1)).await.unwrap();
        store.put("u1", "k", json!(2)).await.unwrap();
        assert_eq!(store.get("u1", "k").await.unwrap(), Some(json!(2)));
    }
}
