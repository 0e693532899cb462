//! Error types for the `ragchat-model` crate.

use thiserror::Error;

/// Errors raised by a [`LanguageModel`](crate::LanguageModel) backend.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The request could not be sent or the backend rejected it.
    #[error("Model request failed ({model}): {message}")]
    Request {
        /// The model the request was addressed to.
        model: String,
        /// A description of the failure.
        message: String,
    },

    /// The backend failed after streaming had started.
    #[error("Model stream error: {0}")]
    Stream(String),

    /// The backend could not be reached.
    #[error("Model backend unavailable at {endpoint}: {message}")]
    Unavailable {
        /// The endpoint that was contacted.
        endpoint: String,
        /// A description of the failure.
        message: String,
    },

    /// The backend answered with something that is not usable text.
    #[error("Invalid model response: {0}")]
    InvalidResponse(String),

    /// The model client was configured incorrectly.
    #[error("Model configuration error: {0}")]
    Config(String),
}

/// A convenience result type for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;
