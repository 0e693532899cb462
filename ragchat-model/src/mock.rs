//! Scripted language model for tests and offline demos.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_stream::stream;
use async_trait::async_trait;

use crate::error::{ModelError, Result};
use crate::llm::{LanguageModel, LlmRequest, TextStream};

/// One scripted reply.
#[derive(Debug, Clone)]
enum Reply {
    /// Return the fragments (joined for `invoke`).
    Text(Vec<String>),
    /// Fail the call before any output.
    Fail(String),
    /// Emit the fragments, then fail mid-stream.
    FailAfter(Vec<String>, String),
}

/// A [`LanguageModel`] that replays scripted replies in order.
///
/// Each call to [`invoke`](LanguageModel::invoke) or
/// [`stream`](LanguageModel::stream) pops the next reply. When the script
/// runs out the fallback reply is used, which by default echoes nothing and
/// fails. Every request is recorded for later inspection.
///
/// # Example
///
/// ```rust
/// use ragchat_model::MockLlm;
///
/// let model = MockLlm::new()
///     .with_response("A broader question?")
///     .with_stream(["Hello", ", ", "world"]);
/// ```
#[derive(Debug, Default)]
pub struct MockLlm {
    replies: Mutex<VecDeque<Reply>>,
    fallback: Option<Reply>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl MockLlm {
    /// Create an empty mock. Calls fail until replies are scripted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a single-fragment reply.
    pub fn with_response(self, text: impl Into<String>) -> Self {
        self.push(Reply::Text(vec![text.into()]))
    }

    /// Queue a multi-fragment reply.
    pub fn with_stream<I, S>(self, fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(Reply::Text(fragments.into_iter().map(Into::into).collect()))
    }

    /// Queue a reply that fails before producing output.
    pub fn with_failure(self, message: impl Into<String>) -> Self {
        self.push(Reply::Fail(message.into()))
    }

    /// Queue a reply that emits `fragments` and then fails.
    pub fn with_stream_failure<I, S>(self, fragments: I, message: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(Reply::FailAfter(
            fragments.into_iter().map(Into::into).collect(),
            message.into(),
        ))
    }

    /// Reply with `text` whenever the script is exhausted.
    pub fn with_default_response(mut self, text: impl Into<String>) -> Self {
        self.fallback = Some(Reply::Text(vec![text.into()]));
        self
    }

    /// Fail every call once the script is exhausted (the default).
    pub fn always_failing(mut self, message: impl Into<String>) -> Self {
        self.fallback = Some(Reply::Fail(message.into()));
        self
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn push(self, reply: Reply) -> Self {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
        self
    }

    fn next_reply(&self, request: LlmRequest) -> Reply {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        let scripted = self.replies.lock().ok().and_then(|mut r| r.pop_front());
        scripted.or_else(|| self.fallback.clone()).unwrap_or_else(|| {
            Reply::Fail("mock script exhausted".to_string())
        })
    }
}

#[async_trait]
impl LanguageModel for MockLlm {
    fn name(&self) -> &str {
        "mock"
    }

    async fn invoke(&self, request: LlmRequest) -> Result<String> {
        let model = request.params.model.clone();
        match self.next_reply(request) {
            Reply::Text(fragments) => Ok(fragments.concat()),
            Reply::Fail(message) | Reply::FailAfter(_, message) => {
                Err(ModelError::Request { model, message })
            }
        }
    }

    async fn stream(&self, request: LlmRequest) -> Result<TextStream> {
        let model = request.params.model.clone();
        let (fragments, failure) = match self.next_reply(request) {
            Reply::Text(fragments) => (fragments, None),
            Reply::Fail(message) => return Err(ModelError::Request { model, message }),
            Reply::FailAfter(fragments, message) => (fragments, Some(message)),
        };

        let output = stream! {
            for fragment in fragments {
                yield Ok(fragment);
            }
            if let Some(message) = failure {
                yield Err(ModelError::Stream(message));
            }
        };
        Ok(Box::pin(output))
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;
    use crate::llm::GenerationParams;

    fn request(prompt: &str) -> LlmRequest {
        LlmRequest::new(prompt, GenerationParams::new("test-model"))
    }

    #[tokio::test]
    async fn replays_script_in_order() {
        let model = MockLlm::new().with_response("first").with_stream(["se", "cond"]);

        assert_eq!(model.invoke(request("a")).await.unwrap(), "first");
        assert_eq!(model.invoke(request("b")).await.unwrap(), "second");
        assert!(model.invoke(request("c")).await.is_err());
        assert_eq!(model.requests().len(), 3);
        assert_eq!(model.requests()[1].prompt, "b");
    }

    #[tokio::test]
    async fn stream_yields_fragments_then_error() {
        let model = MockLlm::new().with_stream_failure(["partial"], "connection reset");

        let items: Vec<_> = model.stream(request("q")).await.unwrap().collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "partial");
        assert!(matches!(items[1], Err(ModelError::Stream(_))));
    }

    #[tokio::test]
    async fn default_response_used_after_script() {
        let model = MockLlm::new().with_default_response("again");
        assert_eq!(model.invoke(request("x")).await.unwrap(), "again");
        assert_eq!(model.invoke(request("y")).await.unwrap(), "again");
    }
}
