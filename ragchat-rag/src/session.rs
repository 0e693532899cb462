//! One conversation: a pipeline plus the history of that conversation.

use futures::StreamExt;
use tracing::debug;

use crate::error::Result;
use crate::pipeline::RagPipeline;
use crate::window::ConversationWindow;

/// A conversation with its own [`ConversationWindow`].
///
/// Questions are answered one at a time (`ask` takes `&mut self`), so the
/// window is only updated after an answer has been fully streamed. Sessions
/// built from clones of one pipeline share the store but never their history.
///
/// # Example
///
/// ```rust,ignore
/// use ragchat_rag::ChatSession;
///
/// let mut session = ChatSession::new(pipeline)?;
/// let answer = session.ask("What is a tide?", |fragment| print!("{fragment}")).await;
/// ```
pub struct ChatSession {
    pipeline: RagPipeline,
    window: ConversationWindow,
}

impl ChatSession {
    /// Start a session with an empty window sized from the pipeline config.
    pub fn new(pipeline: RagPipeline) -> Result<Self> {
        let config = pipeline.config();
        let window = ConversationWindow::new(config.history_size, config.history_max_chars)?;
        Ok(Self::with_window(pipeline, window))
    }

    /// Start a session with an explicit window.
    pub fn with_window(pipeline: RagPipeline, window: ConversationWindow) -> Self {
        Self { pipeline, window }
    }

    /// The pipeline answering for this session.
    pub fn pipeline(&self) -> &RagPipeline {
        &self.pipeline
    }

    /// The exchanges remembered so far.
    pub fn window(&self) -> &ConversationWindow {
        &self.window
    }

    /// Forget the conversation so far.
    pub fn clear_history(&mut self) {
        self.window.clear();
    }

    /// Answer `question`, handing each fragment to `on_fragment` as it arrives.
    ///
    /// Returns the full answer after recording it in the window. A fallback
    /// answer is recorded like any other.
    pub async fn ask<F>(&mut self, question: &str, mut on_fragment: F) -> String
    where
        F: FnMut(&str),
    {
        let mut fragments = self.pipeline.answer(question, &self.window.render());
        let mut answer = String::new();
        while let Some(fragment) = fragments.next().await {
            on_fragment(&fragment);
            answer.push_str(&fragment);
        }

        self.window.add(question, answer.clone());
        debug!(answer_chars = answer.len(), history = self.window.len(), "recorded exchange");
        answer
    }
}
