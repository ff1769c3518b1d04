//! Keyword retriever over a directory of `.txt` files.
//!
//! Files are split into chunks on blank lines. A chunk's score is the number
//! of distinct query words it contains (case-insensitive); only chunks with
//! a positive score are returned, best first, ties in load order.

use std::collections::BTreeSet;
use std::path::Path;

use async_trait::async_trait;
use capstan_core::error::MemoryError;
use capstan_core::knowledge::{KnowledgeChunk, Retriever};
use tracing::{debug, warn};

/// Maximum number of chunks returned per query.
pub const DEFAULT_TOP_K: usize = 3;

pub struct KeywordRetriever {
    chunks: Vec<KnowledgeChunk>,
}

impl KeywordRetriever {
    /// Load every `*.txt` file directly under `dir`, in file-name order.
    ///
    /// A missing directory yields an empty corpus. Unreadable files are
    /// skipped.
    pub fn load(dir: &Path) -> Self {
        let mut files: Vec<_> = match std::fs::read_dir(dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "txt"))
                .collect(),
            Err(_) => {
                debug!(dir = %dir.display(), "Knowledge directory not found");
                Vec::new()
            }
        };
        files.sort();

        let mut chunks = Vec::new();
        for path in files {
            let text = match std::fs::read_to_string(&path) {
                Ok(t) => t,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable knowledge file");
                    continue;
                }
            };
            let source = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            chunks.extend(split_chunks(&text).map(|content| KnowledgeChunk {
                source: source.clone(),
                content,
                score: 0,
            }));
        }

        debug!(dir = %dir.display(), chunks = chunks.len(), "Knowledge base indexed");
        Self::from_chunks(chunks)
    }

    pub fn from_chunks(chunks: Vec<KnowledgeChunk>) -> Self {
        Self { chunks }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Scored search. Synchronous core of [`Retriever::retrieve`].
    pub fn search(&self, query: &str) -> Vec<KnowledgeChunk> {
        let words = query_words(query);
        if words.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<KnowledgeChunk> = self
            .chunks
            .iter()
            .filter_map(|chunk| {
                let haystack = chunk.content.to_lowercase();
                let score = words.iter().filter(|w| haystack.contains(w.as_str())).count();
                (score > 0).then(|| KnowledgeChunk {
                    score,
                    ..chunk.clone()
                })
            })
            .collect();

        // sort_by is stable: equal scores keep load order
        scored.sort_by(|a, b| b.score.cmp(&a.score));
        scored.truncate(DEFAULT_TOP_K);
        scored
    }
}

#[async_trait]
impl Retriever for KeywordRetriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<KnowledgeChunk>, MemoryError> {
        Ok(self.search(query))
    }
}

fn split_chunks(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split("\n\n")
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(String::from)
}

/// Distinct lowercase word tokens (letters, digits, underscore).
fn query_words(query: &str) -> BTreeSet<String> {
    query
        .to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
        .map(String::from)
        .collect()
}
