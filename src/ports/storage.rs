// VidSync - Offline Video Client Core
// Copyright (C) 2026 VidSync contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Durable key→JSON storage port
//!
//! Single-key operations are atomic; there are no multi-key transactions.
//! Consumers that need cross-key consistency (the metadata store's
//! aggregate index) get it by ordering their writes, not from the engine.

use crate::error::{Result, SyncError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;

/// Key→JSON-value store with atomic single-key operations
#[async_trait]
pub trait StoragePort: Send + Sync {
    /// Read a value, `None` if the key is absent
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Write a value, replacing any existing one
    async fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Delete a key; absent keys succeed silently
    async fn remove(&self, key: &str) -> Result<()>;

    /// Enumerate all stored keys
    async fn list_keys(&self) -> Result<Vec<String>>;
}

/// In-memory storage adapter
///
/// Backs tests and ephemeral sessions; state is lost with the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StoragePort for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }
}

/// File-backed storage adapter: one JSON document per key
///
/// Writes go to a temp file in the same directory and are renamed into
/// place, so a reader never observes a half-written value.
#[derive(Debug)]
pub struct JsonFileStorage {
    root: PathBuf,
}

impl JsonFileStorage {
    /// Create the adapter, creating `root` if needed
    pub async fn new(root: PathBuf) -> Result<Self> {
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| SyncError::storage(format!("create {}: {e}", root.display())))?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }
}

#[async_trait]
impl StoragePort for JsonFileStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let path = self.path_for(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => {
                let value = serde_json::from_str(&raw)
                    .map_err(|e| SyncError::storage(format!("parse {key}: {e}")))?;
                Ok(Some(value))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SyncError::storage(format!("read {key}: {e}"))),
        }
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let path = self.path_for(key);
        let tmp = self.root.join(format!(".{key}.json.tmp"));
        let raw = serde_json::to_string(&value)?;

        tokio::fs::write(&tmp, raw)
            .await
            .map_err(|e| SyncError::storage(format!("write {key}: {e}")))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| SyncError::storage(format!("commit {key}: {e}")))?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SyncError::storage(format!("remove {key}: {e}"))),
        }
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| SyncError::storage(format!("list: {e}")))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SyncError::storage(format!("list: {e}")))?
        {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(key) = name.strip_suffix(".json") {
                if !key.starts_with('.') {
                    keys.push(key.to_string());
                }
            }
        }

        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_memory_roundtrip_and_silent_remove() {
        let store = MemoryStorage::new();
        assert!(store.get("missing").await.unwrap().is_none());

        store.set("a", json!({"n": 1})).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some(json!({"n": 1})));

        store.remove("a").await.unwrap();
        store.remove("a").await.unwrap();
        assert!(store.get("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_json_file_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStorage::new(dir.path().join("kv")).await.unwrap();

        store.set("video.3", json!({"status": "downloaded"})).await.unwrap();
        store.set("video.index", json!({"3": {}})).await.unwrap();

        let mut keys = store.list_keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["video.3", "video.index"]);

        assert_eq!(
            store.get("video.3").await.unwrap(),
            Some(json!({"status": "downloaded"}))
        );

        store.remove("video.3").await.unwrap();
        store.remove("video.3").await.unwrap();
        assert!(store.get("video.3").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_json_file_overwrite_replaces_value() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStorage::new(dir.path().to_path_buf()).await.unwrap();

        store.set("k", json!(1)).await.unwrap();
        store.set("k", json!(2)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!(2)));
    }
}
