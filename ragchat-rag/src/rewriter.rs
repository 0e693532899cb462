//! Query expansion: step-back restatement followed by sub-query decomposition.
//!
//! The user's question is first rewritten into a broader "step-back" query,
//! which is then decomposed into a handful of simpler sub-queries. Only the
//! sub-queries leave this module; the step-back query is an intermediate.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{Instrument, debug, info, info_span};

use ragchat_model::{GenerationParams, LanguageModel, LlmRequest};

use crate::config::RagConfig;
use crate::error::{RagError, Result};

/// Header line the decomposition prompt ends with; dropped from model output.
pub const SUB_QUERY_HEADER: &str = "Sub-queries:";

const STEP_BACK_TEMPLATE: &str = "\
You are an AI assistant tasked with generating broader, more general queries to improve context retrieval in a RAG system.
Given the original query, generate a step-back query that is more general and can help retrieve relevant background information.

Original query: {query}

Step-back query:";

const DECOMPOSITION_TEMPLATE: &str = "\
You are an AI assistant tasked with breaking down complex queries into simpler sub-queries for a RAG system.
Given the original query, decompose it into 2-4 simpler sub-queries that, when answered together, would provide a comprehensive response to the original query.

Original query: {query}

example: What are the impacts of climate change on the environment?

Sub-queries:
1. What are the impacts of climate change on biodiversity?
2. How does climate change affect the oceans?
3. What are the effects of climate change on agriculture?
4. What are the impacts of climate change on human health?";

/// Leading list markers such as `1.`, `2)`, `-` or `*`.
static LIST_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\d+[.)]|[-*•])(?:\s+|$)")
        .expect("unreachable error: failed to compile list marker pattern")
});

/// Turns one question into a small set of retrieval sub-queries.
///
/// # Example
///
/// ```rust,ignore
/// use ragchat_rag::{QueryRewriter, RagConfig};
///
/// let rewriter = QueryRewriter::new(model, &RagConfig::default());
/// let sub_queries = rewriter.rewrite("How do tides work?").await?;
/// ```
#[derive(Clone)]
pub struct QueryRewriter {
    model: Arc<dyn LanguageModel>,
    step_back_params: GenerationParams,
    decomposition_params: GenerationParams,
}

impl QueryRewriter {
    /// Create a rewriter using the model settings of `config`.
    pub fn new(model: Arc<dyn LanguageModel>, config: &RagConfig) -> Self {
        Self::with_params(model, config.generation_params(), config.decomposition_params())
    }

    /// Create a rewriter with explicit parameters for each call.
    pub fn with_params(
        model: Arc<dyn LanguageModel>,
        step_back_params: GenerationParams,
        decomposition_params: GenerationParams,
    ) -> Self {
        Self { model, step_back_params, decomposition_params }
    }

    /// Rewrite `question` into sub-queries, in the order the model emitted them.
    ///
    /// The list is never empty. Its length usually falls between two and four
    /// but is accepted as produced.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::GenerationError`] if either model call fails or the
    /// decomposition yields no usable line.
    pub async fn rewrite(&self, question: &str) -> Result<Vec<String>> {
        let span =
            info_span!("rag.rewrite", backend = self.model.name(), question_chars = question.len());
        async move {
            let step_back = self.step_back(question).await?;
            let sub_queries = self.decompose(&step_back).await?;
            info!(sub_query_count = sub_queries.len(), "rewrote question");
            Ok(sub_queries)
        }
        .instrument(span)
        .await
    }

    /// Restate `question` as a broader query.
    pub async fn step_back(&self, question: &str) -> Result<String> {
        let prompt = STEP_BACK_TEMPLATE.replace("{query}", question);
        let raw = self
            .model
            .invoke(LlmRequest::new(prompt, self.step_back_params.clone()))
            .await
            .map_err(|e| RagError::GenerationError(format!("step-back query failed: {e}")))?;

        let step_back = raw.trim();
        if step_back.is_empty() {
            return Err(RagError::GenerationError("model returned an empty step-back query".into()));
        }
        debug!(step_back, "generated step-back query");
        Ok(step_back.to_string())
    }

    /// Decompose `query` into simpler sub-queries.
    pub async fn decompose(&self, query: &str) -> Result<Vec<String>> {
        let prompt = DECOMPOSITION_TEMPLATE.replace("{query}", query);
        let raw = self
            .model
            .invoke(LlmRequest::new(prompt, self.decomposition_params.clone()))
            .await
            .map_err(|e| {
                RagError::GenerationError(format!("sub-query decomposition failed: {e}"))
            })?;

        let sub_queries = parse_sub_queries(&raw);
        if sub_queries.is_empty() {
            return Err(RagError::GenerationError(
                "model returned no usable sub-queries".to_string(),
            ));
        }
        Ok(sub_queries)
    }
}

/// Extract sub-queries from raw decomposition output.
///
/// Lines are trimmed; blank lines and the [`SUB_QUERY_HEADER`] line are
/// dropped, and a leading list marker (`1.`, `2)`, `-`, `*`) is removed.
pub fn parse_sub_queries(raw: &str) -> Vec<String> {
    raw.lines()
        .map(|line| LIST_MARKER.replace(line.trim(), "").trim().to_string())
        .filter(|line| !line.is_empty() && !line.eq_ignore_ascii_case(SUB_QUERY_HEADER))
        .collect()
}
