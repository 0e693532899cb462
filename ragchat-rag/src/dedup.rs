//! Unique-union of per-sub-query results, re-ranked against the original question.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{Instrument, debug, info_span};

use crate::document::Chunk;
use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::index::SimilarityIndex;

/// Merges retrieval result sets into unique chunks and keeps the best `top_k`.
///
/// Fan-out retrieval ranks each sub-query's results separately, so their
/// union has no meaningful order. After deduplication the union is loaded
/// into a scratch in-memory index and searched with the original question.
#[derive(Clone)]
pub struct Deduplicator {
    embedder: Arc<dyn EmbeddingProvider>,
    top_k: usize,
}

impl Deduplicator {
    /// Re-rank with `embedder`, keeping at most `top_k` chunks.
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, top_k: usize) -> Self {
        Self { embedder, top_k }
    }

    /// Number of chunks kept after re-ranking.
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Union of `results` without duplicates.
    ///
    /// Chunks are the same when their [`Chunk::canonical_form`] is equal. The
    /// output happens to follow first occurrence, but callers must treat it
    /// as an unordered set.
    pub fn dedupe(results: &[Vec<Chunk>]) -> Vec<Chunk> {
        let mut seen = HashSet::new();
        results
            .iter()
            .flatten()
            .filter(|chunk| seen.insert(chunk.canonical_form()))
            .cloned()
            .collect()
    }

    /// The `top_k` chunks of `unique` most similar to `question`, best first.
    ///
    /// Chunks that already carry an embedding are not re-embedded.
    pub async fn rerank(&self, question: &str, unique: Vec<Chunk>) -> Result<Vec<Chunk>> {
        if unique.is_empty() {
            return Ok(unique);
        }

        let candidates = unique.len();
        let span = info_span!("rag.rerank", candidates, top_k = self.top_k);
        async move {
            // Scratch ids are positional so chunks sharing an id cannot overwrite each other.
            let mut originals: HashMap<String, Chunk> = HashMap::with_capacity(unique.len());
            let mut scratch = Vec::with_capacity(unique.len());
            for (i, chunk) in unique.into_iter().enumerate() {
                let key = i.to_string();
                scratch.push(Chunk { id: key.clone(), ..chunk.clone() });
                originals.insert(key, chunk);
            }

            let index = SimilarityIndex::scratch(self.embedder.clone());
            index.add_chunks(scratch).await?;
            let ranked = index.similarity_search(question, self.top_k).await?;

            let kept: Vec<Chunk> =
                ranked.into_iter().filter_map(|r| originals.remove(&r.chunk.id)).collect();
            debug!(kept = kept.len(), "re-ranked unique chunks");
            Ok(kept)
        }
        .instrument(span)
        .await
    }

    /// [`dedupe`](Self::dedupe) then [`rerank`](Self::rerank).
    pub async fn dedupe_and_rerank(
        &self,
        question: &str,
        results: &[Vec<Chunk>],
    ) -> Result<Vec<Chunk>> {
        let unique = Self::dedupe(results);
        debug!(
            retrieved = results.iter().map(Vec::len).sum::<usize>(),
            unique = unique.len(),
            "deduplicated retrieval results"
        );
        self.rerank(question, unique).await
    }
}
