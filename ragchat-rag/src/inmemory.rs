//! In-memory chunk store using cosine similarity.
//!
//! This module provides [`InMemoryChunkStore`], a dependency-free store backed
//! by a `HashMap` protected by a `tokio::sync::RwLock`. It is suitable for
//! development, testing, small corpora, and as the scratch index used when
//! re-ranking deduplicated retrieval results.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::document::{Chunk, SearchResult};
use crate::error::{RagError, Result};
use crate::store::{ChunkStore, MetadataFilter};

const BACKEND: &str = "InMemory";

/// An in-memory chunk store using cosine similarity for search.
///
/// Chunks are keyed by id, so re-adding an id replaces the stored chunk.
///
/// # Example
///
/// ```rust,ignore
/// use ragchat_rag::{ChunkStore, InMemoryChunkStore};
///
/// let store = InMemoryChunkStore::new();
/// store.add(&chunks).await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryChunkStore {
    chunks: RwLock<HashMap<String, Chunk>>,
}

impl InMemoryChunkStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude or the lengths differ.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl ChunkStore for InMemoryChunkStore {
    async fn add(&self, chunks: &[Chunk]) -> Result<()> {
        if let Some(missing) = chunks.iter().find(|c| c.embedding.is_none()) {
            return Err(RagError::VectorStoreError {
                backend: BACKEND.to_string(),
                message: format!("chunk '{}' has no embedding", missing.id),
            });
        }

        let mut store = self.chunks.write().await;
        for chunk in chunks {
            store.insert(chunk.id.clone(), chunk.clone());
        }
        Ok(())
    }

    async fn delete_where(&self, filter: &MetadataFilter) -> Result<()> {
        if filter.is_empty() {
            return Err(RagError::VectorStoreError {
                backend: BACKEND.to_string(),
                message: "refusing to delete with an empty filter".to_string(),
            });
        }

        let mut store = self.chunks.write().await;
        store.retain(|_, chunk| !filter.matches(chunk));
        Ok(())
    }

    async fn query(
        &self,
        embeddings: &[Vec<f32>],
        top_k: usize,
    ) -> Result<Vec<Vec<SearchResult>>> {
        let store = self.chunks.read().await;

        let results = embeddings
            .iter()
            .map(|embedding| {
                let mut scored: Vec<SearchResult> = store
                    .values()
                    .filter_map(|chunk| {
                        let stored = chunk.embedding.as_deref()?;
                        let score = cosine_similarity(stored, embedding);
                        Some(SearchResult { chunk: chunk.clone(), score })
                    })
                    .collect();

                // Ties are broken by id so equal scores rank deterministically.
                scored.sort_by(|a, b| {
                    b.score
                        .partial_cmp(&a.score)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| a.chunk.id.cmp(&b.chunk.id))
                });
                scored.truncate(top_k);
                scored
            })
            .collect();

        Ok(results)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.chunks.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = [0.3, 0.4, 0.5];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_handles_zero_and_mismatched_vectors() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn add_rejects_chunks_without_embeddings() {
        let store = InMemoryChunkStore::new();
        let err = store.add(&[Chunk::new("a", "text", "d")]).await.unwrap_err();
        assert!(matches!(err, RagError::VectorStoreError { .. }));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn delete_where_removes_only_matching_document() {
        let store = InMemoryChunkStore::new();
        store
            .add(&[
                Chunk::new("a_0", "alpha", "a").with_embedding(vec![1.0, 0.0]),
                Chunk::new("a_1", "alpha two", "a").with_embedding(vec![0.9, 0.1]),
                Chunk::new("b_0", "beta", "b").with_embedding(vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        store.delete_where(&MetadataFilter::document("a")).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        let results = store.query(&[vec![1.0, 0.0]], 10).await.unwrap();
        assert_eq!(results[0].len(), 1);
        assert_eq!(results[0][0].chunk.id, "b_0");
    }

    #[tokio::test]
    async fn empty_filter_is_rejected() {
        let store = InMemoryChunkStore::new();
        assert!(store.delete_where(&MetadataFilter::new()).await.is_err());
    }

    #[tokio::test]
    async fn query_returns_one_list_per_embedding() {
        let store = InMemoryChunkStore::new();
        store
            .add(&[
                Chunk::new("x", "x", "d").with_embedding(vec![1.0, 0.0]),
                Chunk::new("y", "y", "d").with_embedding(vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let results = store.query(&[vec![1.0, 0.0], vec![0.0, 1.0]], 1).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0][0].chunk.id, "x");
        assert_eq!(results[1][0].chunk.id, "y");
    }
}
