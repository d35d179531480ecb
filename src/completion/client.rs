//! HTTP client for OpenAI-compatible `/chat/completions` endpoints.

use super::{normalize, ChatCompletion, ChatMessage, CompletionInput};
use crate::config::CompletionSettings;
use crate::error::{CopilotoError, Result};
use crate::openai::http_client;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

/// Chat completion adapter with a fixed system prompt and generation parameters.
///
/// Each call is a single request: no retries, no caching.
#[derive(Clone)]
pub struct ChatCompletionAdapter {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    system_prompt: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl ChatCompletionAdapter {
    /// Create an adapter for the endpoint described by `settings`.
    pub fn new(
        settings: &CompletionSettings,
        api_key: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            http: http_client(settings.timeout())?,
            endpoint: format!("{}/chat/completions", settings.api_base.trim_end_matches('/')),
            api_key: api_key.into(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            system_prompt: system_prompt.into(),
        })
    }

    /// Create an adapter reading the API key from the configured environment variable.
    pub fn from_settings(
        settings: &CompletionSettings,
        system_prompt: impl Into<String>,
    ) -> Result<Self> {
        let api_key = settings.api_key()?;
        Self::new(settings, api_key, system_prompt)
    }

    /// Same endpoint and HTTP client, different system prompt.
    pub fn with_system_prompt(&self, system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            ..self.clone()
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ChatCompletion for ChatCompletionAdapter {
    #[instrument(skip(self, input), fields(model = %self.model))]
    async fn complete(&self, input: CompletionInput) -> Result<String> {
        let messages = normalize(&self.system_prompt, input);
        debug!("Sending {} messages to {}", messages.len(), self.endpoint);

        let request = ChatCompletionRequest {
            model: &self.model,
            messages: &messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Completion transport error: {}", e);
                CopilotoError::CompletionRequest {
                    status: None,
                    body: e.to_string(),
                }
            })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| CopilotoError::CompletionRequest {
                status: Some(status),
                body: e.to_string(),
            })?;

        if !(200..300).contains(&status) {
            error!(status, body = %body, "Completion endpoint returned an error");
            return Err(CopilotoError::CompletionRequest {
                status: Some(status),
                body,
            });
        }

        let answer = extract_answer(status, &body)?;
        debug!("Received completion ({} chars)", answer.len());
        Ok(answer)
    }
}

/// Take the first choice's message text.
fn extract_answer(status: u16, body: &str) -> Result<String> {
    let parsed: ChatCompletionResponse =
        serde_json::from_str(body).map_err(|e| CopilotoError::CompletionRequest {
            status: Some(status),
            body: format!("undecodable response ({}): {}", e, body),
        })?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| CopilotoError::CompletionRequest {
            status: Some(status),
            body: "response contained no message content".to_string(),
        })
}
