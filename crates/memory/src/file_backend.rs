//! File-based store: persistent JSON-lines storage, one directory per user.
//!
//! Layout under the data directory:
//!
//! ```text
//! <data_dir>/<user>/reasoning_chains.jsonl
//! <data_dir>/<user>/tool_executions.jsonl
//! <data_dir>/<user>/<key>.json
//! ```
//!
//! Streams are appended line by line; keyed values are rewritten whole.
//! Unreadable lines are skipped with a warning on read.

use async_trait::async_trait;
use inkwell_core::error::StoreError;
use inkwell_core::store::PersistentStore;
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// A file-backed store using JSONL streams and JSON snapshots.
pub struct FileStore {
    root: PathBuf,
    // serializes writers within the process
    write_lock: Arc<Mutex<()>>,
}

impl FileStore {
    /// Create a store rooted at `root`; directories are created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        debug!(root = %root.display(), "File store opened");
        Self {
            root,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn user_dir(&self, user_id: &str) -> PathBuf {
        self.root.join(sanitize(user_id))
    }

    fn stream_path(&self, user_id: &str, stream: &str) -> PathBuf {
        self.user_dir(user_id).join(format!("{}.jsonl", sanitize(stream)))
    }

    fn key_path(&self, user_id: &str, key: &str) -> PathBuf {
        self.user_dir(user_id).join(format!("{}.json", sanitize(key)))
    }

    fn ensure_dir(&self, user_id: &str) -> Result<PathBuf, StoreError> {
        let dir = self.user_dir(user_id);
        std::fs::create_dir_all(&dir).map_err(|e| {
            StoreError::Storage(format!("Failed to create {}: {e}", dir.display()))
        })?;
        Ok(dir)
    }
}

/// Keep path components to a safe alphabet so a user id can never escape
/// the data directory.
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() { "_".into() } else { cleaned }
}

#[async_trait]
impl PersistentStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn append(&self, user_id: &str, stream: &str, record: Value) -> Result<(), StoreError> {
        let line = serde_json::to_string(&record)
            .map_err(|e| StoreError::Storage(format!("Failed to serialize record: {e}")))?;

        let _guard = self.write_lock.lock().await;
        self.ensure_dir(user_id)?;
        let path = self.stream_path(user_id, stream);
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| StoreError::Storage(format!("Failed to open {}: {e}", path.display())))?;
        writeln!(file, "{line}")
            .map_err(|e| StoreError::Storage(format!("Failed to write {}: {e}", path.display())))?;
        Ok(())
    }

    async fn read_stream(&self, user_id: &str, stream: &str) -> Result<Vec<Value>, StoreError> {
        let path = self.stream_path(user_id, stream);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StoreError::Storage(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )));
            }
        };

        Ok(content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<Value>(line) {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!(stream, error = %e, "Skipping corrupted record");
                    None
                }
            })
            .collect())
    }

    async fn put(&self, user_id: &str, key: &str, value: Value) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(&value)
            .map_err(|e| StoreError::Storage(format!("Failed to serialize {key}: {e}")))?;

        let _guard = self.write_lock.lock().await;
        self.ensure_dir(user_id)?;
        let path = self.key_path(user_id, key);
        std::fs::write(&path, content)
            .map_err(|e| StoreError::Storage(format!("Failed to write {}: {e}", path.display())))
    }

    async fn get(&self, user_id: &str, key: &str) -> Result<Option<Value>, StoreError> {
        let path = self.key_path(user_id, key);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StoreError::Storage(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )));
            }
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| StoreError::Corrupted {
                stream: key.to_string(),
                reason: e.to_string(),
            })
    }

    async fn footprint(&self, user_id: &str) -> Result<u64, StoreError> {
        let dir = self.user_dir(user_id);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(_) => return Ok(0),
        };
        Ok(entries
            .filter_map(|e| e.ok())
            .filter_map(|e| e.metadata().ok())
            .filter(|m| m.is_file())
            .map(|m| m.len())
            .sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn append_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store.append("u1", "tool_executions", json!({"n": 1})).await.unwrap();
        store.append("u1", "tool_executions", json!({"n": 2})).await.unwrap();

        let reopened = FileStore::new(dir.path());
        let records = reopened.read_stream("u1", "tool_executions").await.unwrap();
        assert_eq!(records, vec![json!({"n": 1}), json!({"n": 2})]);
        assert!(reopened.footprint("u1").await.unwrap() > 0);
    }

    #[tokio::test]
    async fn missing_stream_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        assert!(store.read_stream("nobody", "reasoning_chains").await.unwrap().is_empty());
        assert!(store.get("nobody", "profile").await.unwrap().is_none());
        assert_eq!(store.footprint("nobody").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn handles_corrupted_lines() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store.append("u1", "s", json!("valid")).await.unwrap();
        let path = store.stream_path("u1", "s");
        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "this is not json").unwrap();
        store.append("u1", "s", json!("also valid")).await.unwrap();

        let records = store.read_stream("u1", "s").await.unwrap();
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn keys_roundtrip_and_replace() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store.put("u1", "profile", json!({"essay_phase": "drafting"})).await.unwrap();
        store.put("u1", "profile", json!({"essay_phase": "revising"})).await.unwrap();
        let value = store.get("u1", "profile").await.unwrap().unwrap();
        assert_eq!(value["essay_phase"], "revising");
    }

    #[test]
    fn user_ids_cannot_escape_root() {
        let store = FileStore::new("/data");
        let path = store.stream_path("../../etc", "passwd");
        assert!(path.starts_with("/data"));
        assert!(!path.to_string_lossy().contains(".."));
    }
}
