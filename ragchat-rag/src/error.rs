//! Error types for the `ragchat-rag` crate.

use thiserror::Error;

/// Errors that can occur in retrieval and answer generation.
#[derive(Debug, Error)]
pub enum RagError {
    /// A language model call failed or returned unusable output.
    #[error("Generation error: {0}")]
    GenerationError(String),

    /// Retrieval for a single sub-query failed.
    #[error("Retrieval error for '{query}': {message}")]
    RetrievalError {
        /// The sub-query whose retrieval failed.
        query: String,
        /// A description of the failure.
        message: String,
    },

    /// The answer prompt could not be assembled.
    #[error("Context assembly error: {0}")]
    ContextAssemblyError(String),

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the chunk store backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStoreError {
        /// The store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during document chunking.
    #[error("Chunking error: {0}")]
    ChunkingError(String),

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An error in the pipeline orchestration (ingestion, removal).
    #[error("Pipeline error: {0}")]
    PipelineError(String),
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
