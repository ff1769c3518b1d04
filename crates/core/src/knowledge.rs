//! Retriever trait: lexical lookup over a local knowledge corpus.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::MemoryError;

/// A scored passage from the knowledge corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeChunk {
    /// File the passage came from
    pub source: String,

    pub content: String,

    /// Number of distinct query words found in the passage
    #[serde(default)]
    pub score: usize,
}

#[async_trait]
pub trait Retriever: Send + Sync {
    /// Best-matching passages for `query`, highest score first.
    async fn retrieve(&self, query: &str)
    -> std::result::Result<Vec<KnowledgeChunk>, MemoryError>;
}
