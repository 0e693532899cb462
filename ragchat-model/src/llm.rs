//! The [`LanguageModel`] trait and its request types.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A stream of text fragments produced by a streaming model call.
///
/// Fragments are yielded in emission order. The stream has a single consumer
/// and performs no buffering of its own.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Sampling parameters sent with every model call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationParams {
    /// Model identifier understood by the backend (e.g. `llama3.2`).
    pub model: String,
    /// Sampling temperature. `0.0` makes output as deterministic as the backend allows.
    pub temperature: f32,
    /// Upper bound on generated tokens, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl GenerationParams {
    /// Create parameters for `model` with temperature `0.0` and no token cap.
    pub fn new(model: impl Into<String>) -> Self {
        Self { model: model.into(), temperature: 0.0, max_tokens: None }
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Cap the number of generated tokens.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// A fully rendered prompt plus the parameters to run it with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmRequest {
    /// The prompt text, sent as a single user turn.
    pub prompt: String,
    /// Sampling parameters.
    pub params: GenerationParams,
}

impl LlmRequest {
    /// Create a request for `prompt` using `params`.
    pub fn new(prompt: impl Into<String>, params: GenerationParams) -> Self {
        Self { prompt: prompt.into(), params }
    }
}

/// A text generation backend.
///
/// Implementations wrap a specific service (Ollama, a mock, ...) behind a
/// unified async interface with a single-shot and a streaming mode.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Human-readable backend name, used in logs.
    fn name(&self) -> &str;

    /// Run the request to completion and return the full text.
    async fn invoke(&self, request: LlmRequest) -> Result<String>;

    /// Run the request in streaming mode.
    ///
    /// Errors that happen before the first fragment are returned directly;
    /// later failures surface as an `Err` item inside the stream.
    async fn stream(&self, request: LlmRequest) -> Result<TextStream>;
}
