//! Memory trait: long-term key/value facts that survive across sessions.
//!
//! The agent stores facts under a topic key with `remember` and finds them
//! again with a case-insensitive substring `recall` over keys and values.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::MemoryError;

/// A single stored fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub key: String,
    pub content: String,
}

impl MemoryRecord {
    pub fn new(key: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            content: content.into(),
        }
    }

    /// Case-insensitive substring match on key or content.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.key.to_lowercase().contains(&query) || self.content.to_lowercase().contains(&query)
    }
}

/// The core MemoryStore trait.
///
/// Implementations: JSON file, in-memory (for testing).
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// The backend name (e.g., "json", "in_memory").
    fn name(&self) -> &str;

    /// Store `content` under `key`, replacing any previous value.
    async fn remember(&self, key: &str, content: &str) -> std::result::Result<(), MemoryError>;

    /// All records whose key or content contains `query`, in storage order.
    async fn recall(&self, query: &str) -> std::result::Result<Vec<MemoryRecord>, MemoryError>;

    /// Delete a key. Returns whether anything was removed.
    async fn forget(&self, key: &str) -> std::result::Result<bool, MemoryError>;

    /// Every record, in storage order.
    async fn entries(&self) -> std::result::Result<Vec<MemoryRecord>, MemoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_key_or_content_ignoring_case() {
        let rec = MemoryRecord::new("User Name", "Chen");
        assert!(rec.matches("name"));
        assert!(rec.matches("CHEN"));
        assert!(!rec.matches("birthday"));
    }
}
