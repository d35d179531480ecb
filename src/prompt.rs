//! Prompt templates with `{{name}}` placeholders.

use crate::error::{CopilotoError, Result};
use std::collections::HashMap;
use std::fmt;

/// Placeholder for retrieved context in question-answering templates.
pub const CONTEXT_VAR: &str = "context";
/// Placeholder for the user question in question-answering templates.
pub const QUESTION_VAR: &str = "question";

/// An immutable prompt template with a fixed set of required placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    template: String,
    input_variables: Vec<String>,
}

impl PromptTemplate {
    /// Create a template, checking that every required placeholder appears in the text.
    pub fn new(template: impl Into<String>, input_variables: &[&str]) -> Result<Self> {
        let template = template.into();
        let present = placeholders(&template);

        if let Some(missing) = input_variables.iter().find(|name| !present.contains(*name)) {
            return Err(CopilotoError::MissingPlaceholder {
                placeholder: missing.to_string(),
            });
        }

        Ok(Self {
            template,
            input_variables: input_variables.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Create a question-answering template requiring `{{context}}` and `{{question}}`.
    pub fn qa(template: impl Into<String>) -> Result<Self> {
        Self::new(template, &[CONTEXT_VAR, QUESTION_VAR])
    }

    /// The raw template text.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Required placeholder names, in declaration order.
    pub fn input_variables(&self) -> &[String] {
        &self.input_variables
    }

    /// Render a question-answering template.
    pub fn render(&self, context: &str, question: &str) -> Result<RenderedPrompt> {
        let vars = HashMap::from([(CONTEXT_VAR, context), (QUESTION_VAR, question)]);
        self.format(&vars)
    }

    /// Render with arbitrary variables. Every required variable must be supplied.
    pub fn format(&self, vars: &HashMap<&str, &str>) -> Result<RenderedPrompt> {
        if let Some(missing) = self
            .input_variables
            .iter()
            .find(|name| !vars.contains_key(name.as_str()))
        {
            return Err(CopilotoError::MissingPlaceholder {
                placeholder: missing.clone(),
            });
        }

        Ok(RenderedPrompt {
            text: substitute(&self.template, vars),
        })
    }
}

/// Output of rendering a [`PromptTemplate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    text: String,
}

impl RenderedPrompt {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

impl From<String> for RenderedPrompt {
    fn from(text: String) -> Self {
        Self { text }
    }
}

impl fmt::Display for RenderedPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// The next `{{name}}` token in `text`: its byte range and trimmed name.
///
/// An unmatched `{{` earlier in the text stays literal and does not swallow the token.
fn next_token(text: &str) -> Option<(usize, usize, &str)> {
    let first_open = text.find("{{")?;
    let close = first_open + 2 + text[first_open + 2..].find("}}")?;
    let open = first_open + text[first_open..close].rfind("{{").unwrap_or(0);
    Some((open, close + 2, text[open + 2..close].trim()))
}

/// Names of all `{{name}}` tokens in a template.
fn placeholders(template: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = template;

    while let Some((_, end, name)) = next_token(rest) {
        names.push(name);
        rest = &rest[end..];
    }

    names
}

/// Single-pass substitution. Inserted values are never rescanned.
fn substitute(template: &str, vars: &HashMap<&str, &str>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some((start, end, name)) = next_token(rest) {
        out.push_str(&rest[..start]);
        match vars.get(name) {
            Some(value) => out.push_str(value),
            None => out.push_str(&rest[start..end]),
        }
        rest = &rest[end..];
    }

    out.push_str(rest);
    out
}
