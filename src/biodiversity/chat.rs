//! Free-text biodiversity questions with explicit conversation history.

use crate::completion::{ChatCompletion, ChatMessage, CompletionInput};
use crate::error::Result;
use crate::history::recent_window;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Answers nature questions in the context of the recent conversation.
pub struct BiodiversityChat {
    completion: Arc<dyn ChatCompletion>,
    max_turns: usize,
}

impl BiodiversityChat {
    /// `completion` must already carry the biodiversity chat system prompt.
    pub fn new(completion: Arc<dyn ChatCompletion>, max_turns: usize) -> Self {
        Self {
            completion,
            max_turns,
        }
    }

    /// Answer `question` given the prior messages of the session, oldest first.
    #[instrument(skip(self, history), fields(history_len = history.len()))]
    pub async fn ask(&self, question: &str, history: &[ChatMessage]) -> Result<String> {
        let mut messages = recent_window(history, self.max_turns);
        messages.push(ChatMessage::user(question));
        debug!("Sending {} messages of conversation", messages.len());

        self.completion
            .complete(CompletionInput::MessageList(messages))
            .await
    }
}
