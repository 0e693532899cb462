//! Configuration for the retrieval pipeline.

use serde::{Deserialize, Serialize};

use ragchat_model::GenerationParams;

use crate::error::{RagError, Result};
use crate::window::ConversationWindow;

/// Configuration parameters for the retrieval pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Results fetched per sub-query before deduplication and re-ranking.
    pub fetch_k: usize,
    /// Number of chunks kept after re-ranking against the original question.
    pub top_k: usize,
    /// Maximum number of sub-query retrievals in flight at once.
    pub max_concurrent_retrievals: usize,
    /// Number of question/answer pairs remembered per conversation.
    pub history_size: usize,
    /// Character budget for the rendered conversation, wrapper included.
    pub history_max_chars: usize,
    /// Upper bound on the assembled answer prompt, in characters.
    pub max_prompt_chars: usize,
    /// Model used for rewriting and answering.
    pub model: String,
    /// Sampling temperature for every model call.
    pub temperature: f32,
    /// Token cap for the sub-query decomposition call.
    pub decomposition_max_tokens: Option<u32>,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 250,
            fetch_k: 4,
            top_k: 5,
            max_concurrent_retrievals: 4,
            history_size: 3,
            history_max_chars: 5000,
            max_prompt_chars: 32_000,
            model: "llama3.2".to_string(),
            temperature: 0.0,
            decomposition_max_tokens: Some(4000),
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Parameters for the step-back call and the answer call.
    pub fn generation_params(&self) -> GenerationParams {
        GenerationParams::new(&self.model).with_temperature(self.temperature)
    }

    /// Parameters for the sub-query decomposition call.
    pub fn decomposition_params(&self) -> GenerationParams {
        let params = self.generation_params();
        match self.decomposition_max_tokens {
            Some(max_tokens) => params.with_max_tokens(max_tokens),
            None => params,
        }
    }

    /// Check that the parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `chunk_overlap >= chunk_size`
    /// - `top_k`, `fetch_k`, `history_size` or `max_concurrent_retrievals` is zero
    /// - `history_max_chars` cannot fit one segment per remembered pair
    /// - `model` is empty
    pub fn validate(&self) -> Result<()> {
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        if self.fetch_k == 0 {
            return Err(RagError::ConfigError("fetch_k must be greater than zero".to_string()));
        }
        if self.max_concurrent_retrievals == 0 {
            return Err(RagError::ConfigError(
                "max_concurrent_retrievals must be greater than zero".to_string(),
            ));
        }
        ConversationWindow::check_limits(self.history_size, self.history_max_chars)?;
        if self.model.trim().is_empty() {
            return Err(RagError::ConfigError("model must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of results fetched per sub-query.
    pub fn fetch_k(mut self, k: usize) -> Self {
        self.config.fetch_k = k;
        self
    }

    /// Set the number of chunks kept after re-ranking.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Bound the number of concurrent sub-query retrievals.
    pub fn max_concurrent_retrievals(mut self, n: usize) -> Self {
        self.config.max_concurrent_retrievals = n;
        self
    }

    /// Set how many question/answer pairs a conversation remembers.
    pub fn history_size(mut self, n: usize) -> Self {
        self.config.history_size = n;
        self
    }

    /// Set the character budget of the rendered conversation.
    pub fn history_max_chars(mut self, max_chars: usize) -> Self {
        self.config.history_max_chars = max_chars;
        self
    }

    /// Set the maximum answer prompt length in characters.
    pub fn max_prompt_chars(mut self, max_chars: usize) -> Self {
        self.config.max_prompt_chars = max_chars;
        self
    }

    /// Set the model name.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    /// Set the sampling temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    /// Set or clear the token cap of the decomposition call.
    pub fn decomposition_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.config.decomposition_max_tokens = max_tokens;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RagConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.top_k, 5);
        assert_eq!(config.history_size, 3);
        assert_eq!(config.history_max_chars, 5000);
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        let err = RagConfig::builder().chunk_size(100).chunk_overlap(100).build().unwrap_err();
        assert!(matches!(err, RagError::ConfigError(_)));
    }

    #[test]
    fn rejects_zero_top_k_and_fetch_k() {
        assert!(RagConfig::builder().top_k(0).build().is_err());
        assert!(RagConfig::builder().fetch_k(0).build().is_err());
        assert!(RagConfig::builder().max_concurrent_retrievals(0).build().is_err());
    }

    #[test]
    fn rejects_history_budget_too_small() {
        assert!(RagConfig::builder().history_max_chars(40).build().is_err());
        assert!(RagConfig::builder().history_size(0).build().is_err());
    }

    #[test]
    fn decomposition_params_carry_token_cap() {
        let config = RagConfig::default();
        assert_eq!(config.decomposition_params().max_tokens, Some(4000));
        assert_eq!(config.generation_params().max_tokens, None);
        assert_eq!(config.generation_params().model, "llama3.2");
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: RagConfig = serde_json::from_str(r#"{"top_k": 8}"#).unwrap();
        assert_eq!(config.top_k, 8);
        assert_eq!(config.chunk_size, 500);
    }
}
