//! Tests for the `LanguageModel` trait surface.

use std::sync::Arc;

use futures::StreamExt;
use ragchat_model::{GenerationParams, LanguageModel, LlmRequest, MockLlm, ModelError};

/// Verify the shipped models implement `LanguageModel` (compile-time check)
fn _assert_model_impl<T: LanguageModel>() {}

#[test]
fn test_models_implement_language_model() {
    _assert_model_impl::<MockLlm>();
    #[cfg(feature = "ollama")]
    _assert_model_impl::<ragchat_model::OllamaModel>();
}

#[test]
fn test_generation_params_builder() {
    let params = GenerationParams::new("llama3.2").with_temperature(0.2).with_max_tokens(4000);

    assert_eq!(params.model, "llama3.2");
    assert_eq!(params.temperature, 0.2);
    assert_eq!(params.max_tokens, Some(4000));
}

#[test]
fn test_params_skip_missing_max_tokens_when_serialized() {
    let json = serde_json::to_string(&GenerationParams::new("m")).unwrap();
    assert!(!json.contains("max_tokens"));
}

#[tokio::test]
async fn test_trait_object_streams_fragments_in_order() {
    let model: Arc<dyn LanguageModel> = Arc::new(MockLlm::new().with_stream(["a", "b", "c"]));
    let request = LlmRequest::new("prompt", GenerationParams::new("m"));

    let fragments: Vec<String> =
        model.stream(request).await.unwrap().map(|f| f.unwrap()).collect().await;

    assert_eq!(fragments, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_failure_before_stream_is_returned_directly() {
    let model = MockLlm::new().with_failure("model not found");
    let request = LlmRequest::new("prompt", GenerationParams::new("missing"));

    let err = model.stream(request).await.err().unwrap();
    match err {
        ModelError::Request { model, message } => {
            assert_eq!(model, "missing");
            assert_eq!(message, "model not found");
        }
        other => panic!("unexpected error: {other}"),
    }
}
