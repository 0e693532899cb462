//! Chunk store trait for storing and searching chunk embeddings.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::{Chunk, SearchResult};
use crate::error::Result;

/// An equality filter over chunk metadata.
///
/// A chunk matches when every condition holds. The reserved key
/// [`DOCUMENT_ID`](MetadataFilter::DOCUMENT_ID) is compared against
/// [`Chunk::document_id`] rather than the metadata map.
///
/// # Example
///
/// ```rust
/// use ragchat_rag::MetadataFilter;
///
/// let filter = MetadataFilter::document("report.txt").equals("lang", "en");
/// assert_eq!(filter.conditions().len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataFilter {
    conditions: BTreeMap<String, String>,
}

impl MetadataFilter {
    /// Key that selects chunks by parent document.
    pub const DOCUMENT_ID: &'static str = "document_id";

    /// Create an empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter on the parent document id.
    pub fn document(document_id: impl Into<String>) -> Self {
        Self::new().equals(Self::DOCUMENT_ID, document_id)
    }

    /// Add an equality condition.
    pub fn equals(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.conditions.insert(key.into(), value.into());
        self
    }

    /// The conditions, keyed by metadata field.
    pub fn conditions(&self) -> &BTreeMap<String, String> {
        &self.conditions
    }

    /// Whether the filter has no conditions.
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Whether `chunk` satisfies every condition.
    pub fn matches(&self, chunk: &Chunk) -> bool {
        self.conditions.iter().all(|(key, value)| {
            if key == Self::DOCUMENT_ID {
                &chunk.document_id == value
            } else {
                chunk.metadata.get(key) == Some(value)
            }
        })
    }
}

/// A storage backend for chunks with vector similarity search.
///
/// One store handle is one collection. Handles are constructed by the caller
/// and passed into the pipeline; the pipeline never creates global state.
///
/// # Example
///
/// ```rust,ignore
/// use ragchat_rag::{ChunkStore, InMemoryChunkStore};
///
/// let store = InMemoryChunkStore::new();
/// store.add(&chunks).await?;
/// let results = store.query(&[query_embedding], 5).await?;
/// ```
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Add chunks. Every chunk must carry an embedding. An existing chunk with
    /// the same id is replaced.
    async fn add(&self, chunks: &[Chunk]) -> Result<()>;

    /// Delete every chunk matching `filter`. An empty filter is rejected.
    async fn delete_where(&self, filter: &MetadataFilter) -> Result<()>;

    /// Search with each query embedding, returning one list per query ordered
    /// by descending similarity, each holding at most `top_k` results.
    async fn query(&self, embeddings: &[Vec<f32>], top_k: usize)
    -> Result<Vec<Vec<SearchResult>>>;

    /// Number of chunks currently stored.
    async fn count(&self) -> Result<usize>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_key_matches_parent_id() {
        let chunk = Chunk::new("a_0", "text", "a").with_metadata("document_id", "other");
        assert!(MetadataFilter::document("a").matches(&chunk));
        assert!(!MetadataFilter::document("other").matches(&chunk));
    }

    #[test]
    fn all_conditions_must_hold() {
        let chunk = Chunk::new("a_0", "text", "a").with_metadata("lang", "en");
        assert!(MetadataFilter::document("a").equals("lang", "en").matches(&chunk));
        assert!(!MetadataFilter::document("a").equals("lang", "fr").matches(&chunk));
        assert!(!MetadataFilter::new().equals("missing", "x").matches(&chunk));
    }
}
