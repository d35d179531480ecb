//! Pre-flight checks before commands that call remote APIs.
//!
//! Validates that the API keys an operation needs are present before any
//! request is made, so a missing key fails with a clear message.

use crate::config::Settings;
use crate::error::Result;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Sales QA needs the completion and embedding keys.
    Sales,
    /// Image identification and nature Q&A need the vision key.
    Biodiversity,
    /// Index building and search need the embedding key.
    Embedding,
    /// The HTTP API needs at least one of the two completion keys.
    Serve,
}

/// Run pre-flight checks for the given operation.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::Sales => {
            settings.completion.api_key()?;
            settings.embedding.api_key()?;
        }
        Operation::Biodiversity => {
            settings.vision.endpoint().api_key()?;
        }
        Operation::Embedding => {
            settings.embedding.api_key()?;
        }
        Operation::Serve => {
            // Either assistant is enough; the other one answers with its configuration error.
            if let Err(e) = settings.completion.api_key() {
                settings.vision.endpoint().api_key().map_err(|_| e)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CopilotoError;

    #[test]
    fn test_missing_key_fails_before_any_request() {
        let mut settings = Settings::default();
        settings.embedding.api_key_env = "COPILOTO_TEST_UNSET_EMBEDDING_KEY".to_string();

        let err = check(Operation::Embedding, &settings).unwrap_err();
        assert!(matches!(err, CopilotoError::Config(ref msg) if msg.contains("COPILOTO_TEST_UNSET_EMBEDDING_KEY")));
    }

    #[test]
    fn test_biodiversity_only_needs_vision_key() {
        std::env::set_var("COPILOTO_TEST_PREFLIGHT_VISION_KEY", "sk-vision");
        let mut settings = Settings::default();
        settings.completion.api_key_env = "COPILOTO_TEST_PREFLIGHT_UNSET_SALES_KEY".to_string();
        settings.vision.api_key_env = "COPILOTO_TEST_PREFLIGHT_VISION_KEY".to_string();

        assert!(check(Operation::Biodiversity, &settings).is_ok());
        assert!(check(Operation::Serve, &settings).is_ok());
        assert!(check(Operation::Sales, &settings).is_err());
    }
}
