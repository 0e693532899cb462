//! # ragchat-rag
//!
//! Conversational retrieval-augmented generation.
//!
//! ## Overview
//!
//! A question travels through four stages:
//!
//! 1. [`QueryRewriter`] restates it as a broader step-back query and
//!    decomposes that into a few simpler sub-queries.
//! 2. [`MultiRetriever`] runs one similarity search per sub-query,
//!    concurrently, isolating failures per sub-query.
//! 3. [`Deduplicator`] merges the results into unique chunks and re-ranks
//!    them against the original question.
//! 4. [`AnswerGenerator`] streams the answer from the question, the context
//!    and the rendered [`ConversationWindow`], degrading to
//!    [`FALLBACK_ANSWER`] when anything fails.
//!
//! [`RagPipeline`] wires the stages together and handles ingestion;
//! [`ChatSession`] adds per-conversation history.
//!
//! ## Features
//!
//! - `ollama` - [`OllamaEmbeddingProvider`]
//! - `chroma` - [`ChromaChunkStore`](chroma::ChromaChunkStore)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ragchat_rag::{ChatSession, Document, InMemoryChunkStore, RagConfig, RagPipeline};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .model(Arc::new(model))
//!     .embedding_provider(Arc::new(embedder))
//!     .chunk_store(Arc::new(InMemoryChunkStore::new()))
//!     .build()?;
//!
//! pipeline.ingest(&Document::new("notes.txt", text)).await?;
//!
//! let mut session = ChatSession::new(pipeline)?;
//! session.ask("What do my notes say about tides?", |f| print!("{f}")).await;
//! ```

pub mod chunking;
pub mod config;
pub mod dedup;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generator;
pub mod index;
pub mod inmemory;
pub mod pipeline;
pub mod retriever;
pub mod rewriter;
pub mod session;
pub mod store;
pub mod window;

#[cfg(feature = "chroma")]
pub mod chroma;
#[cfg(feature = "ollama")]
pub mod ollama;

pub use chunking::{Chunker, FixedSizeChunker, RecursiveChunker};
pub use config::{RagConfig, RagConfigBuilder};
pub use dedup::Deduplicator;
pub use document::{Chunk, Document, SearchResult};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use generator::{AnswerGenerator, AnswerStream, FALLBACK_ANSWER, FragmentStream};
pub use index::SimilarityIndex;
pub use inmemory::InMemoryChunkStore;
pub use pipeline::{RagPipeline, RagPipelineBuilder};
pub use retriever::MultiRetriever;
pub use rewriter::{QueryRewriter, SUB_QUERY_HEADER, parse_sub_queries};
pub use session::ChatSession;
pub use store::{ChunkStore, MetadataFilter};
pub use window::{ConversationWindow, QaPair};

#[cfg(feature = "chroma")]
pub use chroma::{ChromaChunkStore, ChromaConfig};
#[cfg(feature = "ollama")]
pub use ollama::OllamaEmbeddingProvider;
