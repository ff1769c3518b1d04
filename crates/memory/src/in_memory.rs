//! In-memory store: useful for testing and ephemeral sessions.

use async_trait::async_trait;
use capstan_core::error::MemoryError;
use capstan_core::memory::{MemoryRecord, MemoryStore};
use tokio::sync::RwLock;

/// Keeps records in a Vec, in insertion order. Nothing is persisted.
#[derive(Default)]
pub struct InMemoryStore {
    records: RwLock<Vec<MemoryRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn remember(&self, key: &str, content: &str) -> Result<(), MemoryError> {
        let mut records = self.records.write().await;
        match records.iter_mut().find(|r| r.key == key) {
            Some(existing) => existing.content = content.to_string(),
            None => records.push(MemoryRecord::new(key, content)),
        }
        Ok(())
    }

    async fn recall(&self, query: &str) -> Result<Vec<MemoryRecord>, MemoryError> {
        let records = self.records.read().await;
        Ok(records.iter().filter(|r| r.matches(query)).cloned().collect())
    }

    async fn forget(&self, key: &str) -> Result<bool, MemoryError> {
        let mut records = self.records.write().await;
        let len_before = records.len();
        records.retain(|r| r.key != key);
        Ok(records.len() < len_before)
    }

    async fn entries(&self) -> Result<Vec<MemoryRecord>, MemoryError> {
        Ok(self.records.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn remember_and_recall() {
        let mem = InMemoryStore::new();
        mem.remember("project", "capstan agent").await.unwrap();
        mem.remember("editor", "helix").await.unwrap();

        let hits = mem.recall("AGENT").await.unwrap();
        assert_eq!(hits, vec![MemoryRecord::new("project", "capstan agent")]);
    }

    #[tokio::test]
    async fn remember_replaces_existing_key() {
        let mem = InMemoryStore::new();
        mem.remember("k", "old").await.unwrap();
        mem.remember("k", "new").await.unwrap();
        assert_eq!(mem.entries().await.unwrap(), vec![MemoryRecord::new("k", "new")]);
    }

    #[tokio::test]
    async fn forget_reports_removal() {
        let mem = InMemoryStore::new();
        mem.remember("k", "v").await.unwrap();
        assert!(mem.forget("k").await.unwrap());
        assert!(!mem.forget("k").await.unwrap());
        assert!(mem.entries().await.unwrap().is_empty());
    }
}
