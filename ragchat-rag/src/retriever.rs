//! Fan-out retrieval: one similarity search per sub-query.

use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream;
use tracing::{Instrument, debug, info_span, warn};

use crate::config::RagConfig;
use crate::document::Chunk;
use crate::error::{RagError, Result};
use crate::index::SimilarityIndex;

/// Runs every sub-query against a [`SimilarityIndex`].
///
/// Sub-queries are independent, so their searches run concurrently (up to
/// `max_concurrency` at a time). Results are kept in sub-query order no matter
/// which search finishes first, and a failing search never aborts its
/// siblings.
///
/// # Example
///
/// ```rust,ignore
/// use ragchat_rag::MultiRetriever;
///
/// let retriever = MultiRetriever::new(index, 4, 4);
/// let per_query = retriever.retrieve_all(&sub_queries).await;
/// assert_eq!(per_query.len(), sub_queries.len());
/// ```
#[derive(Clone)]
pub struct MultiRetriever {
    index: SimilarityIndex,
    fetch_k: usize,
    max_concurrency: usize,
}

impl MultiRetriever {
    /// Search `index`, fetching `fetch_k` chunks per sub-query.
    pub fn new(index: SimilarityIndex, fetch_k: usize, max_concurrency: usize) -> Self {
        Self { index, fetch_k, max_concurrency: max_concurrency.max(1) }
    }

    /// Search `index` with the fetch width and concurrency of `config`.
    pub fn from_config(index: SimilarityIndex, config: &RagConfig) -> Self {
        Self::new(index, config.fetch_k, config.max_concurrent_retrievals)
    }

    /// Chunks fetched per sub-query.
    pub fn fetch_k(&self) -> usize {
        self.fetch_k
    }

    /// Retrieve the best chunks for one sub-query, best first.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::RetrievalError`] naming `sub_query` if embedding or
    /// search fails.
    pub async fn retrieve(&self, sub_query: &str) -> Result<Vec<Chunk>> {
        let results = self.index.similarity_search(sub_query, self.fetch_k).await.map_err(|e| {
            RagError::RetrievalError { query: sub_query.to_string(), message: e.to_string() }
        })?;
        Ok(results.into_iter().map(|r| r.chunk).collect())
    }

    /// Retrieve for every sub-query, keeping each outcome.
    ///
    /// The output has one entry per input, in input order.
    pub async fn try_retrieve_all(&self, sub_queries: &[String]) -> Vec<Result<Vec<Chunk>>> {
        let searches: Vec<BoxFuture<'static, Result<Vec<Chunk>>>> = sub_queries
            .iter()
            .enumerate()
            .map(|(i, sub_query)| -> BoxFuture<'static, Result<Vec<Chunk>>> {
                let retriever = self.clone();
                let sub_query = sub_query.clone();
                Box::pin(
                    async move { retriever.retrieve(&sub_query).await }
                        .instrument(info_span!("rag.retrieve", sub_query.index = i)),
                )
            })
            .collect();

        stream::iter(searches).buffered(self.max_concurrency).collect().await
    }

    /// Retrieve for every sub-query, substituting an empty list for failures.
    ///
    /// Each failure is logged as a warning and does not affect the other
    /// sub-queries.
    pub async fn retrieve_all(&self, sub_queries: &[String]) -> Vec<Vec<Chunk>> {
        self.try_retrieve_all(sub_queries)
            .await
            .into_iter()
            .enumerate()
            .map(|(i, outcome)| match outcome {
                Ok(chunks) => {
                    debug!(sub_query.index = i, retrieved = chunks.len(), "sub-query retrieved");
                    chunks
                }
                Err(e) => {
                    warn!(sub_query.index = i, error = %e, "sub-query retrieval failed");
                    Vec::new()
                }
            })
            .collect()
    }
}
