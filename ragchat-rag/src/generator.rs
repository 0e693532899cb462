//! Answer prompt assembly and streamed generation with a fallback answer.

use std::pin::Pin;
use std::sync::Arc;

use async_stream::stream;
use futures::{Stream, StreamExt};
use tracing::{Instrument, Span, debug, info_span, warn};

use ragchat_model::{GenerationParams, LanguageModel, LlmRequest};

use crate::config::RagConfig;
use crate::document::Chunk;
use crate::error::{RagError, Result};

/// The single fragment streamed when no answer can be produced.
pub const FALLBACK_ANSWER: &str =
    "I don't know what to answer to that ! Would you want to know something else ?";

/// Fragments of an answer that may fail part way through.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Fragments of an answer. Never fails and never ends without a fragment.
pub type AnswerStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// Streams answers to a question from retrieved context and recent history.
///
/// # Example
///
/// ```rust,ignore
/// use futures::StreamExt;
/// use ragchat_rag::{AnswerGenerator, RagConfig};
///
/// let generator = AnswerGenerator::new(model, &RagConfig::default());
/// let mut answer = generator.generate("What is a tide?", &context, &window.render());
/// while let Some(fragment) = answer.next().await {
///     print!("{fragment}");
/// }
/// ```
#[derive(Clone)]
pub struct AnswerGenerator {
    model: Arc<dyn LanguageModel>,
    params: GenerationParams,
    max_prompt_chars: usize,
}

impl AnswerGenerator {
    /// Create a generator using the model settings and prompt limit of `config`.
    pub fn new(model: Arc<dyn LanguageModel>, config: &RagConfig) -> Self {
        Self::with_params(model, config.generation_params(), config.max_prompt_chars)
    }

    /// Create a generator with explicit parameters.
    pub fn with_params(
        model: Arc<dyn LanguageModel>,
        params: GenerationParams,
        max_prompt_chars: usize,
    ) -> Self {
        Self { model, params, max_prompt_chars }
    }

    /// Assemble the answer prompt.
    ///
    /// The question appears twice: once before the context and once as the
    /// closing instruction. `conversation` is the rendered
    /// [`ConversationWindow`](crate::ConversationWindow) and may be empty.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ContextAssemblyError`] if the question is blank or
    /// the prompt exceeds the configured character limit.
    pub fn build_prompt(
        &self,
        question: &str,
        context: &[Chunk],
        conversation: &str,
    ) -> Result<String> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RagError::ContextAssemblyError("question is empty".to_string()));
        }

        let prompt = format!(
            "Here is the question you need to answer:\n\n --- \n {question} \n --- \n\n\
             Here is additional context relevant to the question:\n\n --- \n {context} \n --- \n\n\
             {conversation}\n\
             Use the above context to answer the question: \n {question}\n",
            context = render_context(context),
        );

        let chars = prompt.chars().count();
        if chars > self.max_prompt_chars {
            return Err(RagError::ContextAssemblyError(format!(
                "prompt of {chars} characters exceeds the limit of {}",
                self.max_prompt_chars
            )));
        }
        Ok(prompt)
    }

    /// Start streaming the answer, surfacing every failure.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ContextAssemblyError`] if the prompt cannot be
    /// built and [`RagError::GenerationError`] if the model refuses the
    /// request. Failures after the first fragment arrive as stream items.
    pub async fn try_generate(
        &self,
        question: &str,
        context: &[Chunk],
        conversation: &str,
    ) -> Result<FragmentStream> {
        let prompt = self.build_prompt(question, context, conversation)?;
        let span = info_span!(
            "rag.generate",
            backend = self.model.name(),
            model = %self.params.model,
            context_chunks = context.len(),
            prompt_chars = prompt.len()
        );

        let mut fragments = self
            .model
            .stream(LlmRequest::new(prompt, self.params.clone()))
            .instrument(span.clone())
            .await
            .map_err(|e| RagError::GenerationError(e.to_string()))?;

        Ok(Box::pin(stream! {
            while let Some(item) = fragments.next().instrument(span.clone()).await {
                yield item.map_err(|e| RagError::GenerationError(e.to_string()));
            }
        }))
    }

    /// Stream the answer, degrading to [`FALLBACK_ANSWER`] on failure.
    ///
    /// Fragments are forwarded as the model produces them. If generation
    /// cannot start, or starts but produces nothing, the stream holds only the
    /// fallback. If it fails part way, the fallback follows the fragments
    /// already sent. Failures are logged as warnings.
    pub fn generate(&self, question: &str, context: &[Chunk], conversation: &str) -> AnswerStream {
        let generator = self.clone();
        let question = question.to_string();
        let context = context.to_vec();
        let conversation = conversation.to_string();
        let span = info_span!("rag.answer", question_chars = question.len());
        with_fallback(
            async move { generator.try_generate(&question, &context, &conversation).await },
            span,
        )
    }
}

/// Drive `start` and forward its fragments, substituting [`FALLBACK_ANSWER`]
/// wherever an answer cannot be produced.
///
/// Every poll of `start` and of the fragments, and every event logged here,
/// happens inside `span`.
pub(crate) fn with_fallback<F>(start: F, span: Span) -> AnswerStream
where
    F: Future<Output = Result<FragmentStream>> + Send + 'static,
{
    Box::pin(stream! {
        let mut fragments = match start.instrument(span.clone()).await {
            Ok(fragments) => fragments,
            Err(e) => {
                span.in_scope(|| {
                    warn!(error = %e, "answer generation failed, sending fallback answer")
                });
                yield FALLBACK_ANSWER.to_string();
                return;
            }
        };

        let mut emitted = 0usize;
        while let Some(item) = fragments.next().instrument(span.clone()).await {
            match item {
                Ok(fragment) if fragment.is_empty() => {}
                Ok(fragment) => {
                    emitted += 1;
                    yield fragment;
                }
                Err(e) => {
                    span.in_scope(|| {
                        warn!(error = %e, emitted, "answer stream failed, sending fallback answer")
                    });
                    yield FALLBACK_ANSWER.to_string();
                    return;
                }
            }
        }

        if emitted == 0 {
            span.in_scope(|| warn!("model produced an empty answer, sending fallback answer"));
            yield FALLBACK_ANSWER.to_string();
        } else {
            span.in_scope(|| debug!(fragments = emitted, "answer streamed"));
        }
    })
}

/// Serialize context chunks for the prompt, one numbered block per chunk.
fn render_context(context: &[Chunk]) -> String {
    context
        .iter()
        .enumerate()
        .map(|(i, chunk)| format!("[{}] ({}) {}", i + 1, chunk.document_id, chunk.text.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}
