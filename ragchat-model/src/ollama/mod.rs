//! Ollama provider implementation.
//!
//! This module talks to an [Ollama](https://ollama.com) server through the
//! `ollama-rs` SDK using the chat endpoint for both single-shot and
//! streaming calls.
//!
//! # Example
//!
//! ```rust,ignore
//! use ragchat_model::ollama::{OllamaConfig, OllamaModel};
//!
//! let model = OllamaModel::new(OllamaConfig::new("http://localhost", 11434))?;
//! ```

mod client;
mod config;

pub use client::OllamaModel;
pub use config::{DEFAULT_OLLAMA_HOST, DEFAULT_OLLAMA_PORT, OllamaConfig};
