//! Retrieval-augmented QA orchestration for the sales assistant.

use super::{format_context, QaResult, SimilarityIndex};
use crate::completion::{ChatCompletion, CompletionInput};
use crate::error::{CopilotoError, Result};
use crate::prompt::PromptTemplate;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Answers sales questions from retrieved context.
///
/// Stateless per call: one retrieval, one template render and one completion.
pub struct QaOrchestrator {
    index: std::result::Result<Arc<dyn SimilarityIndex>, String>,
    completion: Arc<dyn ChatCompletion>,
    template: PromptTemplate,
    top_k: usize,
}

impl QaOrchestrator {
    /// Create an orchestrator over a loaded index.
    pub fn new(
        index: Arc<dyn SimilarityIndex>,
        completion: Arc<dyn ChatCompletion>,
        template: PromptTemplate,
        top_k: usize,
    ) -> Self {
        Self {
            index: Ok(index),
            completion,
            template,
            top_k,
        }
    }

    /// Create an orchestrator whose index failed to load. Every `answer` fails fast.
    pub fn without_index(
        reason: impl Into<String>,
        completion: Arc<dyn ChatCompletion>,
        template: PromptTemplate,
    ) -> Self {
        Self {
            index: Err(reason.into()),
            completion,
            template,
            top_k: 0,
        }
    }

    /// Whether an index is loaded and questions can be answered.
    pub fn is_available(&self) -> bool {
        self.index.is_ok()
    }

    /// Reason the index is unavailable, if it is.
    pub fn unavailable_reason(&self) -> Option<&str> {
        self.index.as_ref().err().map(String::as_str)
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Answer one question.
    #[instrument(skip(self), fields(question = %question))]
    pub async fn answer(&self, question: &str) -> Result<QaResult> {
        let index = self
            .index
            .as_ref()
            .map_err(|reason| CopilotoError::IndexUnavailable(reason.clone()))?;

        info!("Processing question");

        let sources = index.search(question, self.top_k).await?;
        debug!("Retrieved {} context chunks", sources.len());

        let context = format_context(&sources);
        let prompt = self.template.render(&context, question)?;

        let answer = self
            .completion
            .complete(CompletionInput::RenderedPrompt(prompt))
            .await?;

        Ok(QaResult { answer, sources })
    }
}
