//! # ragchat-model
//!
//! Language model integrations for ragchat.
//!
//! ## Overview
//!
//! This crate defines the [`LanguageModel`] seam used by the retrieval
//! pipeline and ships two implementations:
//!
//! - [`OllamaModel`] - models served by a local or remote Ollama instance
//! - [`MockLlm`] - scripted model for tests and offline demos
//!
//! A model is used in two modes: single-shot [`invoke`](LanguageModel::invoke),
//! which returns the full completion, and [`stream`](LanguageModel::stream),
//! which yields text fragments as the backend produces them.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ragchat_model::{GenerationParams, LanguageModel, LlmRequest};
//! use ragchat_model::ollama::{OllamaConfig, OllamaModel};
//!
//! let model = OllamaModel::new(OllamaConfig::new("http://localhost", 11434))?;
//! let request = LlmRequest::new("Why is the sky blue?", GenerationParams::new("llama3.2"));
//! let text = model.invoke(request).await?;
//! ```

pub mod error;
pub mod llm;
pub mod mock;
#[cfg(feature = "ollama")]
pub mod ollama;

pub use error::{ModelError, Result};
pub use llm::{GenerationParams, LanguageModel, LlmRequest, TextStream};
pub use mock::MockLlm;
#[cfg(feature = "ollama")]
pub use ollama::{OllamaConfig, OllamaModel};
