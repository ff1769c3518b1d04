//! JSON-file memory store: one JSON object of `key: content` pairs.
//!
//! The whole object is loaded on creation and rewritten on every mutation.
//! Key order is insertion order; updating a key keeps its position.
//!
//! Storage location: `~/.capstan/memory.json` unless configured.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use capstan_core::error::MemoryError;
use capstan_core::memory::{MemoryRecord, MemoryStore};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, warn};

pub struct JsonFileMemory {
    path: PathBuf,
    entries: RwLock<Map<String, Value>>,
}

impl JsonFileMemory {
    /// Open the store at `path`.
    ///
    /// A missing file starts empty (created on first write). A file that
    /// is not a JSON object is logged and treated as empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = Self::load_from_disk(&path);
        debug!(path = %path.display(), count = entries.len(), "JSON memory loaded");
        Self {
            path,
            entries: RwLock::new(entries),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_from_disk(path: &Path) -> Map<String, Value> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Map::new(),
        };
        if content.trim().is_empty() {
            return Map::new();
        }

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                warn!(path = %path.display(), "Memory file is not a JSON object, starting empty");
                Map::new()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Corrupted memory file, starting empty");
                Map::new()
            }
        }
    }

    async fn flush(&self, entries: &Map<String, Value>) -> Result<(), MemoryError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                MemoryError::Storage(format!("Failed to create memory directory: {e}"))
            })?;
        }

        let content = serde_json::to_string_pretty(entries)
            .map_err(|e| MemoryError::Storage(format!("Failed to serialize memory: {e}")))?;

        tokio::fs::write(&self.path, content)
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to write memory file: {e}")))
    }
}

fn to_record(key: &str, value: &Value) -> MemoryRecord {
    match value {
        Value::String(s) => MemoryRecord::new(key, s.as_str()),
        other => MemoryRecord::new(key, other.to_string()),
    }
}

#[async_trait]
impl MemoryStore for JsonFileMemory {
    fn name(&self) -> &str {
        "json"
    }

    async fn remember(&self, key: &str, content: &str) -> Result<(), MemoryError> {
        let mut entries = self.entries.write().await;
        let mut updated = entries.clone();
        updated.insert(key.to_string(), Value::String(content.to_string()));
        // Only commit what reached the disk
        self.flush(&updated).await?;
        *entries = updated;
        Ok(())
    }

    async fn recall(&self, query: &str) -> Result<Vec<MemoryRecord>, MemoryError> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .map(|(k, v)| to_record(k, v))
            .filter(|r| r.matches(query))
            .collect())
    }

    async fn forget(&self, key: &str) -> Result<bool, MemoryError> {
        let mut entries = self.entries.write().await;
        let mut updated = entries.clone();
        // shift_remove keeps the remaining keys in order
        if updated.shift_remove(key).is_none() {
            return Ok(false);
        }
        self.flush(&updated).await?;
        *entries = updated;
        Ok(true)
    }

    async fn entries(&self) -> Result<Vec<MemoryRecord>, MemoryError> {
        let entries = self.entries.read().await;
        Ok(entries.iter().map(|(k, v)| to_record(k, v)).collect())
    }
}
