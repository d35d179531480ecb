//! Chat completion over OpenAI-compatible APIs.
//!
//! Every caller goes through [`ChatCompletion::complete`], which accepts any of the
//! [`CompletionInput`] shapes and returns the first choice's text.

mod client;

pub use client::ChatCompletionAdapter;

use crate::error::{CopilotoError, Result};
use crate::prompt::RenderedPrompt;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single part of a multimodal message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    /// Usually a `data:<mime>;base64,...` URL.
    pub url: String,
}

/// Message content: plain text or an ordered list of parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// One message of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: MessageContent::Text(content.into()),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// A user message carrying an instruction and one image.
    pub fn user_with_image(text: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Parts(vec![
                ContentPart::Text { text: text.into() },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: image_url.into(),
                    },
                },
            ]),
        }
    }

    /// The textual part of the content, with text parts joined by spaces.
    pub fn text(&self) -> String {
        match &self.content {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join(" ")
                .trim()
                .to_string(),
        }
    }

    pub fn has_image(&self) -> bool {
        matches!(
            &self.content,
            MessageContent::Parts(parts) if parts.iter().any(|p| matches!(p, ContentPart::ImageUrl { .. }))
        )
    }
}

/// The input shapes accepted by a completion call.
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionInput {
    /// A conversation; roles are reduced to user/assistant.
    MessageList(Vec<ChatMessage>),
    /// Output of a prompt template, sent as one user message.
    RenderedPrompt(RenderedPrompt),
    /// A raw string, sent verbatim as one user message.
    RawString(String),
}

impl CompletionInput {
    /// Interpret a JSON value as a completion input.
    ///
    /// Arrays of `{role, content}` are message lists, strings are raw strings and
    /// `{"prompt": "..."}` is a rendered prompt. Anything else is rejected.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::String(text) => Ok(Self::RawString(text)),
            Value::Array(items) => items
                .into_iter()
                .map(serde_json::from_value::<ChatMessage>)
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(Self::MessageList)
                .map_err(|e| {
                    CopilotoError::UnsupportedInput(format!("array with non-message items ({})", e))
                }),
            Value::Object(map) => match map.get("prompt") {
                Some(Value::String(text)) if map.len() == 1 => {
                    Ok(Self::RenderedPrompt(RenderedPrompt::from(text.clone())))
                }
                _ => Err(CopilotoError::UnsupportedInput("object".to_string())),
            },
            Value::Null => Err(CopilotoError::UnsupportedInput("null".to_string())),
            Value::Bool(_) => Err(CopilotoError::UnsupportedInput("boolean".to_string())),
            Value::Number(_) => Err(CopilotoError::UnsupportedInput("number".to_string())),
        }
    }
}

impl From<Vec<ChatMessage>> for CompletionInput {
    fn from(messages: Vec<ChatMessage>) -> Self {
        Self::MessageList(messages)
    }
}

impl From<RenderedPrompt> for CompletionInput {
    fn from(prompt: RenderedPrompt) -> Self {
        Self::RenderedPrompt(prompt)
    }
}

impl From<String> for CompletionInput {
    fn from(text: String) -> Self {
        Self::RawString(text)
    }
}

impl From<&str> for CompletionInput {
    fn from(text: &str) -> Self {
        Self::RawString(text.to_string())
    }
}

/// Build the outgoing message sequence: one system message, then the input.
///
/// In a message list only messages authored as `user` stay `user`; every other
/// role becomes `assistant`.
pub fn normalize(system_prompt: &str, input: CompletionInput) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::system(system_prompt)];

    match input {
        CompletionInput::MessageList(list) => {
            messages.extend(list.into_iter().map(|message| ChatMessage {
                role: match message.role {
                    Role::User => Role::User,
                    Role::System | Role::Assistant => Role::Assistant,
                },
                content: message.content,
            }));
        }
        CompletionInput::RenderedPrompt(prompt) => {
            messages.push(ChatMessage::user(prompt.into_text()));
        }
        CompletionInput::RawString(text) => {
            messages.push(ChatMessage::user(text));
        }
    }

    messages
}

/// A remote chat completion service.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    /// Run one completion and return the first choice's text.
    async fn complete(&self, input: CompletionInput) -> Result<String>;
}

/// Stands in for an endpoint whose API key is not configured.
///
/// Every call fails with the configuration error, and no request is made.
pub struct UnconfiguredCompletion {
    reason: String,
}

impl UnconfiguredCompletion {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

#[async_trait]
impl ChatCompletion for UnconfiguredCompletion {
    async fn complete(&self, _input: CompletionInput) -> Result<String> {
        Err(CopilotoError::Config(self.reason.clone()))
    }
}
