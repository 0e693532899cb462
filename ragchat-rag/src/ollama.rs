//! Ollama embedding provider.
//!
//! Calls the `/api/embed` endpoint through `ollama-rs`, which accepts several
//! inputs per request. The dimensionality is learned from the first response.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use ollama_rs::Ollama;
use ollama_rs::generation::embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest};
use ragchat_model::OllamaConfig;
use tracing::debug;

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

const PROVIDER: &str = "Ollama";

/// Inputs sent per embed request.
const MAX_BATCH_SIZE: usize = 64;

/// An [`EmbeddingProvider`] backed by an Ollama embedding model.
///
/// # Example
///
/// ```rust,ignore
/// use ragchat_model::OllamaConfig;
/// use ragchat_rag::OllamaEmbeddingProvider;
///
/// let embedder = OllamaEmbeddingProvider::new(&OllamaConfig::default(), "llama3.2");
/// let vector = embedder.embed("hello").await?;
/// ```
pub struct OllamaEmbeddingProvider {
    client: Ollama,
    model: String,
    endpoint: String,
    dimensions: AtomicUsize,
}

impl OllamaEmbeddingProvider {
    /// Embed with `model` on the server described by `config`.
    pub fn new(config: &OllamaConfig, model: impl Into<String>) -> Self {
        Self {
            client: Ollama::new(config.host_url(), config.port),
            model: model.into(),
            endpoint: config.endpoint(),
            dimensions: AtomicUsize::new(0),
        }
    }

    /// Name of the embedding model.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn map_err(&self, err: ollama_rs::error::OllamaError) -> RagError {
        RagError::EmbeddingError {
            provider: PROVIDER.to_string(),
            message: format!("{} ({}): {err}", self.model, self.endpoint),
        }
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let input = EmbeddingsInput::from(texts.to_vec());
        let request = GenerateEmbeddingsRequest::new(self.model.clone(), input);
        let response =
            self.client.generate_embeddings(request).await.map_err(|e| self.map_err(e))?;

        if response.embeddings.len() != texts.len() {
            return Err(RagError::EmbeddingError {
                provider: PROVIDER.to_string(),
                message: format!(
                    "expected {} embeddings but Ollama returned {}",
                    texts.len(),
                    response.embeddings.len()
                ),
            });
        }
        if let Some(first) = response.embeddings.first().filter(|e| !e.is_empty()) {
            self.dimensions.store(first.len(), Ordering::Relaxed);
        }
        Ok(response.embeddings)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text]).await?.pop().ok_or_else(|| RagError::EmbeddingError {
            provider: PROVIDER.to_string(),
            message: "Ollama returned no embedding".to_string(),
        })
    }

    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(MAX_BATCH_SIZE) {
            embeddings.extend(self.embed_batch(batch).await?);
        }
        debug!(model = %self.model, count = embeddings.len(), "embedded texts");
        Ok(embeddings)
    }

    /// Zero until the first successful call.
    fn dimensions(&self) -> usize {
        self.dimensions.load(Ordering::Relaxed)
    }
}
