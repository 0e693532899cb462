//! RAG pipeline orchestrator.
//!
//! The [`RagPipeline`] wires every stage together. Ingestion runs
//! chunk → embed → store. Answering runs
//! rewrite → fan-out retrieval → dedupe and re-rank → streamed generation.
//!
//! # Example
//!
//! ```rust,ignore
//! use ragchat_rag::{InMemoryChunkStore, RagConfig, RagPipeline};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .model(Arc::new(model))
//!     .embedding_provider(Arc::new(embedder))
//!     .chunk_store(Arc::new(InMemoryChunkStore::new()))
//!     .build()?;
//!
//! pipeline.ingest(&document).await?;
//! let mut answer = pipeline.answer("What does the report conclude?", "");
//! ```

use std::sync::Arc;

use tracing::{error, info, info_span};

use ragchat_model::LanguageModel;

use crate::chunking::{Chunker, RecursiveChunker};
use crate::config::RagConfig;
use crate::dedup::Deduplicator;
use crate::document::{Chunk, Document};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generator::{AnswerGenerator, AnswerStream, FragmentStream, with_fallback};
use crate::index::SimilarityIndex;
use crate::retriever::MultiRetriever;
use crate::rewriter::QueryRewriter;
use crate::store::{ChunkStore, MetadataFilter};

/// The RAG pipeline orchestrator.
///
/// Holds only shared handles, so cloning is cheap and clones share the same
/// store. Conversation history is not kept here; pass the rendered window
/// of the caller's session, or use [`ChatSession`](crate::ChatSession).
/// Construct one via [`RagPipeline::builder()`].
#[derive(Clone)]
pub struct RagPipeline {
    config: Arc<RagConfig>,
    chunker: Arc<dyn Chunker>,
    index: SimilarityIndex,
    rewriter: QueryRewriter,
    retriever: MultiRetriever,
    deduplicator: Deduplicator,
    generator: AnswerGenerator,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the chunk store.
    pub fn chunk_store(&self) -> &Arc<dyn ChunkStore> {
        self.index.store()
    }

    /// Ingest a single document: chunk → embed → store.
    ///
    /// Chunks left by an earlier ingestion of the same document id are
    /// removed first, so the store only holds the latest version. Returns the
    /// chunks that were stored (with embeddings attached). A document without
    /// text stores nothing.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PipelineError`] if embedding or storage fails,
    /// including the document ID in the error message.
    pub async fn ingest(&self, document: &Document) -> Result<Vec<Chunk>> {
        self.index.store().delete_where(&MetadataFilter::document(&document.id)).await.map_err(
            |e| {
                error!(document.id = %document.id, error = %e, "clearing previous chunks failed");
                RagError::PipelineError(format!(
                    "failed to replace document '{}': {e}",
                    document.id
                ))
            },
        )?;

        let chunks = self.chunker.chunk(document);
        if chunks.is_empty() {
            info!(document.id = %document.id, chunk_count = 0, "ingested document (empty)");
            return Ok(chunks);
        }

        let chunks = self.index.add_chunks(chunks).await.map_err(|e| {
            error!(document.id = %document.id, error = %e, "ingestion failed");
            RagError::PipelineError(format!("ingestion failed for document '{}': {e}", document.id))
        })?;

        info!(document.id = %document.id, chunk_count = chunks.len(), "ingested document");
        Ok(chunks)
    }

    /// Ingest several documents in order.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PipelineError`] on the first document that fails.
    /// Documents before it stay stored.
    pub async fn ingest_batch(&self, documents: &[Document]) -> Result<Vec<Chunk>> {
        let mut all_chunks = Vec::new();
        for document in documents {
            all_chunks.extend(self.ingest(document).await?);
        }
        Ok(all_chunks)
    }

    /// Delete every chunk that came from `document_id`.
    ///
    /// Removing an unknown document is not an error.
    pub async fn remove_document(&self, document_id: &str) -> Result<()> {
        self.index.store().delete_where(&MetadataFilter::document(document_id)).await.map_err(
            |e| {
                error!(document.id = document_id, error = %e, "document removal failed");
                RagError::PipelineError(format!("failed to remove document '{document_id}': {e}"))
            },
        )?;
        info!(document.id = document_id, "removed document");
        Ok(())
    }

    /// The context chunks for `question`, best first.
    ///
    /// Rewrites the question into sub-queries, retrieves for each, merges the
    /// results without duplicates and keeps the `top_k` most similar to the
    /// original question. Sub-queries whose retrieval fails contribute nothing.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::GenerationError`] if rewriting fails, or the
    /// embedding/store error raised while re-ranking.
    pub async fn retrieve_context(&self, question: &str) -> Result<Vec<Chunk>> {
        let sub_queries = self.rewriter.rewrite(question).await?;
        let per_query = self.retriever.retrieve_all(&sub_queries).await;
        let context = self.deduplicator.dedupe_and_rerank(question, &per_query).await?;
        info!(
            sub_query_count = sub_queries.len(),
            context_chunks = context.len(),
            "retrieved context"
        );
        Ok(context)
    }

    /// Retrieve context and start streaming the answer, surfacing every failure.
    ///
    /// `conversation` is the rendered [`ConversationWindow`](crate::ConversationWindow)
    /// of the caller, possibly empty.
    pub async fn try_answer(&self, question: &str, conversation: &str) -> Result<FragmentStream> {
        let context = self.retrieve_context(question).await?;
        self.generator.try_generate(question, &context, conversation).await
    }

    /// Answer `question` as a stream of text fragments.
    ///
    /// Never fails: any error from rewriting through generation is logged and
    /// turns into the fallback answer, so the stream always yields at least
    /// one fragment. Nothing runs until the stream is first polled.
    pub fn answer(&self, question: &str, conversation: &str) -> AnswerStream {
        let pipeline = self.clone();
        let question = question.to_string();
        let conversation = conversation.to_string();
        let span = info_span!("rag.answer", question_chars = question.len());
        with_fallback(async move { pipeline.try_answer(&question, &conversation).await }, span)
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// The model, embedding provider and chunk store are required. Without a
/// config the defaults apply; without a chunker a [`RecursiveChunker`] sized
/// from the config is used.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = RagPipeline::builder()
///     .config(RagConfig::default())
///     .model(Arc::new(model))
///     .embedding_provider(Arc::new(embedder))
///     .chunk_store(Arc::new(store))
///     .chunker(Arc::new(FixedSizeChunker::new(256, 32)))  // optional
///     .build()?;
/// ```
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    model: Option<Arc<dyn LanguageModel>>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    chunk_store: Option<Arc<dyn ChunkStore>>,
    chunker: Option<Arc<dyn Chunker>>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the language model used for rewriting and answering.
    pub fn model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.model = Some(model);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the chunk store backend.
    pub fn chunk_store(mut self, store: Arc<dyn ChunkStore>) -> Self {
        self.chunk_store = Some(store);
        self
    }

    /// Set the document chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Build the [`RagPipeline`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required field is missing or the
    /// config is invalid.
    pub fn build(self) -> Result<RagPipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let model =
            self.model.ok_or_else(|| RagError::ConfigError("model is required".to_string()))?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let chunk_store = self
            .chunk_store
            .ok_or_else(|| RagError::ConfigError("chunk_store is required".to_string()))?;
        let chunker = self.chunker.unwrap_or_else(|| {
            Arc::new(RecursiveChunker::new(config.chunk_size, config.chunk_overlap))
        });

        let index = SimilarityIndex::new(chunk_store, embedding_provider.clone());
        Ok(RagPipeline {
            chunker,
            rewriter: QueryRewriter::new(model.clone(), &config),
            retriever: MultiRetriever::from_config(index.clone(), &config),
            deduplicator: Deduplicator::new(embedding_provider, config.top_k),
            generator: AnswerGenerator::new(model, &config),
            index,
            config: Arc::new(config),
        })
    }
}
