//! Text-level similarity search over a [`ChunkStore`].

use std::sync::Arc;

use tracing::debug;

use crate::document::{Chunk, SearchResult};
use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::inmemory::InMemoryChunkStore;
use crate::store::ChunkStore;

/// A [`ChunkStore`] paired with the [`EmbeddingProvider`] that feeds it.
///
/// Adds missing embeddings on insert and embeds query text before searching,
/// so callers work with text only.
#[derive(Clone)]
pub struct SimilarityIndex {
    store: Arc<dyn ChunkStore>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl SimilarityIndex {
    /// Pair `store` with `embedder`.
    pub fn new(store: Arc<dyn ChunkStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, embedder }
    }

    /// A fresh, empty in-memory index sharing `embedder`.
    pub fn scratch(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self::new(Arc::new(InMemoryChunkStore::new()), embedder)
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn ChunkStore> {
        &self.store
    }

    /// The embedding provider.
    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    /// Embed the chunks that lack an embedding, then add all of them.
    ///
    /// Returns the chunks as stored.
    pub async fn add_chunks(&self, mut chunks: Vec<Chunk>) -> Result<Vec<Chunk>> {
        let missing: Vec<usize> = chunks
            .iter()
            .enumerate()
            .filter(|(_, c)| c.embedding.is_none())
            .map(|(i, _)| i)
            .collect();

        if !missing.is_empty() {
            let texts: Vec<&str> = missing.iter().map(|&i| chunks[i].text.as_str()).collect();
            let embeddings = self.embedder.embed_documents(&texts).await?;
            for (i, embedding) in missing.iter().zip(embeddings) {
                chunks[*i].embedding = Some(embedding);
            }
            debug!(embedded = missing.len(), total = chunks.len(), "embedded chunks for index");
        }

        self.store.add(&chunks).await?;
        Ok(chunks)
    }

    /// The `k` chunks most similar to `text`, best first.
    pub async fn similarity_search(&self, text: &str, k: usize) -> Result<Vec<SearchResult>> {
        let embedding = self.embedder.embed(text).await?;
        let mut results = self.store.query(&[embedding], k).await?;
        Ok(results.pop().unwrap_or_default())
    }
}
