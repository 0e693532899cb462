//! Ollama client implementation.

use async_stream::try_stream;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use ollama_rs::Ollama;
use ollama_rs::generation::chat::ChatMessage;
use ollama_rs::generation::chat::request::ChatMessageRequest;
use ollama_rs::models::ModelOptions;
use tracing::debug;

use super::config::OllamaConfig;
use crate::error::{ModelError, Result};
use crate::llm::{LanguageModel, LlmRequest, TextStream};

/// A [`LanguageModel`] served by Ollama.
///
/// The prompt is sent as a single user message on the chat endpoint. The
/// model name comes from each request's [`GenerationParams`](crate::GenerationParams),
/// so one client can serve several models.
pub struct OllamaModel {
    client: Ollama,
    endpoint: String,
}

impl OllamaModel {
    /// Create a client for the server described by `config`.
    pub fn new(config: OllamaConfig) -> Result<Self> {
        if config.host.trim().is_empty() {
            return Err(ModelError::Config("Ollama host must not be empty".to_string()));
        }
        let client = Ollama::new(config.host_url(), config.port);
        Ok(Self { client, endpoint: config.endpoint() })
    }

    /// Wrap an existing `ollama-rs` client.
    pub fn from_client(client: Ollama, endpoint: impl Into<String>) -> Self {
        Self { client, endpoint: endpoint.into() }
    }

    fn build_request(request: &LlmRequest) -> Result<ChatMessageRequest> {
        let messages = vec![ChatMessage::user(request.prompt.clone())];
        let mut options = ModelOptions::default().temperature(request.params.temperature);
        if let Some(max_tokens) = request.params.max_tokens {
            let num_predict = i32::try_from(max_tokens).map_err(|_| {
                ModelError::Config(format!("max_tokens {max_tokens} exceeds what Ollama accepts"))
            })?;
            options = options.num_predict(num_predict);
        }
        Ok(ChatMessageRequest::new(request.params.model.clone(), messages).options(options))
    }

    fn map_err(&self, model: &str, err: ollama_rs::error::OllamaError) -> ModelError {
        let message = err.to_string();
        if message.contains("connect") || message.contains("Connection refused") {
            ModelError::Unavailable { endpoint: self.endpoint.clone(), message }
        } else {
            ModelError::Request { model: model.to_string(), message }
        }
    }
}

#[async_trait]
impl LanguageModel for OllamaModel {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn invoke(&self, request: LlmRequest) -> Result<String> {
        let model = request.params.model.clone();
        let chat_request = Self::build_request(&request)?;

        debug!(model = %model, prompt_chars = request.prompt.len(), "ollama invoke");
        let response = self
            .client
            .send_chat_messages(chat_request)
            .await
            .map_err(|e| self.map_err(&model, e))?;

        Ok(response.message.content)
    }

    async fn stream(&self, request: LlmRequest) -> Result<TextStream> {
        let model = request.params.model.clone();
        let chat_request = Self::build_request(&request)?;

        debug!(model = %model, prompt_chars = request.prompt.len(), "ollama stream");
        let upstream = self
            .client
            .send_chat_messages_stream(chat_request)
            .await
            .map_err(|e| self.map_err(&model, e))?;

        let upstream =
            upstream.map(|chunk| chunk.map(|r| (r.message.content, r.done)).map_err(|_| ()));
        Ok(relay(model, upstream))
    }
}

/// Forward `(content, done)` chunks as text fragments until `done`.
///
/// An upstream error becomes [`ModelError::Stream`]; an upstream that ends
/// without signalling `done` becomes [`ModelError::InvalidResponse`].
fn relay<S>(model: String, mut upstream: S) -> TextStream
where
    S: Stream<Item = std::result::Result<(String, bool), ()>> + Send + Unpin + 'static,
{
    Box::pin(try_stream! {
        let mut finished = false;
        while let Some(chunk) = upstream.next().await {
            let (content, done) = chunk.map_err(|()| {
                ModelError::Stream(format!("stream from {model} ended with an error"))
            })?;
            if !content.is_empty() {
                yield content;
            }
            if done {
                finished = true;
                break;
            }
        }
        if !finished {
            Err::<(), _>(ModelError::InvalidResponse(format!(
                "stream from {model} closed before the model finished"
            )))?;
        }
    })
}
