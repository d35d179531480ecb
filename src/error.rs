//! Error types for Copiloto.

use thiserror::Error;

/// Library-level error type for Copiloto operations.
#[derive(Error, Debug)]
pub enum CopilotoError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Prompt template is missing the {{{{{placeholder}}}}} placeholder")]
    MissingPlaceholder { placeholder: String },

    #[error("Unsupported completion input: {0}")]
    UnsupportedInput(String),

    #[error("Completion request failed{}: {body}", status_suffix(.status))]
    CompletionRequest { status: Option<u16>, body: String },

    #[error("Similarity index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Interaction log error: {0}")]
    InteractionLog(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status
        .map(|code| format!(" with status {}", code))
        .unwrap_or_default()
}

/// Result type alias for Copiloto operations.
pub type Result<T> = std::result::Result<T, CopilotoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_error_display() {
        let err = CopilotoError::CompletionRequest {
            status: Some(500),
            body: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "Completion request failed with status 500: boom");

        let err = CopilotoError::CompletionRequest {
            status: None,
            body: "connection refused".to_string(),
        };
        assert_eq!(err.to_string(), "Completion request failed: connection refused");
    }

    #[test]
    fn test_missing_placeholder_display() {
        let err = CopilotoError::MissingPlaceholder {
            placeholder: "context".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Prompt template is missing the {{context}} placeholder"
        );
    }
}
