//! Classify-then-describe image identification.

use crate::completion::{ChatCompletion, ChatCompletionAdapter, ChatMessage, CompletionInput};
use crate::config::BiodiversityPrompts;
use crate::error::{CopilotoError, Result};
use base64::Engine as _;
use image::ImageFormat;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Result of the classification step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrganismLabel {
    Animal,
    Planta,
    Hongo,
    NoOrganismo,
    /// Anything outside the closed vocabulary, as received.
    Other(String),
}

impl OrganismLabel {
    /// Parse a classifier reply. Only surrounding whitespace and case are normalized.
    pub fn parse(reply: &str) -> Self {
        match reply.trim().to_lowercase().as_str() {
            "animal" => Self::Animal,
            "planta" => Self::Planta,
            "hongo" => Self::Hongo,
            "no organismo" => Self::NoOrganismo,
            _ => Self::Other(reply.trim().to_string()),
        }
    }

    /// Whether the label warrants the descriptive step.
    pub fn is_organism(&self) -> bool {
        matches!(self, Self::Animal | Self::Planta | Self::Hongo)
    }
}

impl fmt::Display for OrganismLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Animal => write!(f, "animal"),
            Self::Planta => write!(f, "planta"),
            Self::Hongo => write!(f, "hongo"),
            Self::NoOrganismo => write!(f, "No organismo"),
            Self::Other(raw) => write!(f, "{}", raw),
        }
    }
}

impl Serialize for OrganismLabel {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Outcome of identifying one image.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Identification {
    /// The image shows an organism; `description` is the model's identification.
    Described {
        label: OrganismLabel,
        description: String,
    },
    /// The image was not accepted; `message` is the fixed rejection text.
    Rejected { label: OrganismLabel, message: String },
}

impl Identification {
    pub fn label(&self) -> &OrganismLabel {
        match self {
            Self::Described { label, .. } | Self::Rejected { label, .. } => label,
        }
    }

    /// Text to show the user.
    pub fn message(&self) -> &str {
        match self {
            Self::Described { description, .. } => description,
            Self::Rejected { message, .. } => message,
        }
    }
}

/// Encode image bytes as a `data:` URL, sniffing the format from its magic bytes.
pub fn image_data_url(bytes: &[u8]) -> Result<String> {
    let format = image::guess_format(bytes)
        .map_err(|e| CopilotoError::InvalidInput(format!("unrecognized image data: {}", e)))?;

    match format {
        ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Gif | ImageFormat::WebP => {}
        other => {
            return Err(CopilotoError::InvalidInput(format!(
                "unsupported image format {:?}",
                other
            )))
        }
    }

    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    Ok(format!("data:{};base64,{}", format.to_mime_type(), encoded))
}

/// Two-step identifier: a closed-vocabulary classification, then a description.
pub struct ImageIdentifier {
    classifier: Arc<dyn ChatCompletion>,
    describer: Arc<dyn ChatCompletion>,
    instruction: String,
    rejection: String,
}

impl ImageIdentifier {
    pub fn new(
        classifier: Arc<dyn ChatCompletion>,
        describer: Arc<dyn ChatCompletion>,
        prompts: &BiodiversityPrompts,
    ) -> Self {
        Self {
            classifier,
            describer,
            instruction: prompts.image_instruction.clone(),
            rejection: prompts.rejection.clone(),
        }
    }

    /// Build both steps from one vision endpoint, each with its own system prompt.
    pub fn from_adapter(vision: &ChatCompletionAdapter, prompts: &BiodiversityPrompts) -> Self {
        Self::new(
            Arc::new(vision.with_system_prompt(prompts.classify_system.clone())),
            Arc::new(vision.with_system_prompt(prompts.identify_system.clone())),
            prompts,
        )
    }

    /// Classify the image and, if it shows an organism, describe it.
    #[instrument(skip(self, image_bytes), fields(bytes = image_bytes.len()))]
    pub async fn identify(&self, image_bytes: &[u8]) -> Result<Identification> {
        let url = image_data_url(image_bytes)?;
        let message = ChatMessage::user_with_image(self.instruction.clone(), url);

        let reply = self
            .classifier
            .complete(CompletionInput::MessageList(vec![message.clone()]))
            .await?;
        let label = OrganismLabel::parse(&reply);
        info!(label = %label, "Classified image");

        if !label.is_organism() {
            return Ok(Identification::Rejected {
                label,
                message: self.rejection.clone(),
            });
        }

        let description = self
            .describer
            .complete(CompletionInput::MessageList(vec![message]))
            .await?;
        debug!("Described organism ({} chars)", description.len());

        Ok(Identification::Described { label, description })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::testing::ScriptedCompletion;

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];
    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10, b'J', b'F', b'I', b'F'];

    fn identifier(
        classifier: &Arc<ScriptedCompletion>,
        describer: &Arc<ScriptedCompletion>,
    ) -> ImageIdentifier {
        ImageIdentifier::new(
            classifier.clone(),
            describer.clone(),
            &BiodiversityPrompts::default(),
        )
    }

    #[test]
    fn test_label_parsing() {
        assert_eq!(OrganismLabel::parse("animal"), OrganismLabel::Animal);
        assert_eq!(OrganismLabel::parse("  Planta\n"), OrganismLabel::Planta);
        assert_eq!(OrganismLabel::parse("HONGO"), OrganismLabel::Hongo);
        assert_eq!(OrganismLabel::parse("No organismo"), OrganismLabel::NoOrganismo);
        assert_eq!(OrganismLabel::parse("NO ORGANISMO"), OrganismLabel::NoOrganismo);
        assert_eq!(
            OrganismLabel::parse("Planta."),
            OrganismLabel::Other("Planta.".to_string())
        );
        assert!(!OrganismLabel::parse("mineral").is_organism());
    }

    #[test]
    fn test_data_url() {
        let url = image_data_url(PNG).unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
        assert!(image_data_url(JPEG).unwrap().starts_with("data:image/jpeg;base64,"));

        let err = image_data_url(b"not an image").unwrap_err();
        assert!(matches!(err, CopilotoError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_non_organism_makes_one_call() {
        for reply in ["No organismo", "no organismo", "  NO ORGANISMO  "] {
            let classifier = Arc::new(ScriptedCompletion::replying(&[reply]));
            let describer = Arc::new(ScriptedCompletion::replying(&[]));

            let result = identifier(&classifier, &describer).identify(PNG).await.unwrap();

            assert_eq!(
                result,
                Identification::Rejected {
                    label: OrganismLabel::NoOrganismo,
                    message: BiodiversityPrompts::default().rejection,
                }
            );
            assert_eq!(classifier.call_count() + describer.call_count(), 1);
        }
    }

    #[tokio::test]
    async fn test_organisms_make_two_calls() {
        for (reply, label) in [
            ("animal", OrganismLabel::Animal),
            ("Planta", OrganismLabel::Planta),
            ("hongo\n", OrganismLabel::Hongo),
        ] {
            let classifier = Arc::new(ScriptedCompletion::replying(&[reply]));
            let describer = Arc::new(ScriptedCompletion::replying(&["Probablemente un **guayacán amarillo**."]));

            let result = identifier(&classifier, &describer).identify(JPEG).await.unwrap();

            assert_eq!(result.label(), &label);
            assert_eq!(result.message(), "Probablemente un **guayacán amarillo**.");
            assert_eq!(classifier.call_count(), 1);
            assert_eq!(describer.call_count(), 1);
        }
    }

    #[tokio::test]
    async fn test_both_steps_send_instruction_and_image() {
        let classifier = Arc::new(ScriptedCompletion::replying(&["animal"]));
        let describer = Arc::new(ScriptedCompletion::replying(&["Un colibrí."]));

        identifier(&classifier, &describer).identify(PNG).await.unwrap();

        let first = classifier.calls().remove(0);
        let second = describer.calls().remove(0);
        assert_eq!(first, second);

        let CompletionInput::MessageList(messages) = first else {
            panic!("expected a message list");
        };
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text(), "Identify the organism in the picture.");
        assert!(messages[0].has_image());
    }

    #[tokio::test]
    async fn test_unknown_label_is_rejected_not_error() {
        let classifier = Arc::new(ScriptedCompletion::replying(&["Es un paisaje"]));
        let describer = Arc::new(ScriptedCompletion::replying(&[]));

        let result = identifier(&classifier, &describer).identify(PNG).await.unwrap();
        assert!(matches!(result, Identification::Rejected { .. }));
        assert_eq!(result.label(), &OrganismLabel::Other("Es un paisaje".to_string()));
        assert_eq!(describer.call_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_image_makes_no_call() {
        let classifier = Arc::new(ScriptedCompletion::replying(&["animal"]));
        let describer = Arc::new(ScriptedCompletion::replying(&[]));

        let err = identifier(&classifier, &describer)
            .identify(b"GIF? no")
            .await
            .unwrap_err();
        assert!(matches!(err, CopilotoError::InvalidInput(_)));
        assert_eq!(classifier.call_count(), 0);
    }

    #[tokio::test]
    async fn test_classifier_failure_propagates() {
        let classifier = Arc::new(ScriptedCompletion::failing(502));
        let describer = Arc::new(ScriptedCompletion::replying(&[]));

        let err = identifier(&classifier, &describer).identify(PNG).await.unwrap_err();
        assert!(matches!(err, CopilotoError::CompletionRequest { status: Some(502), .. }));
        assert_eq!(describer.call_count(), 0);
    }

    #[test]
    fn test_identification_json() {
        let value = serde_json::to_value(Identification::Rejected {
            label: OrganismLabel::NoOrganismo,
            message: "Lo siento".to_string(),
        })
        .unwrap();
        assert_eq!(value["outcome"], "rejected");
        assert_eq!(value["label"], "No organismo");
        assert_eq!(value["message"], "Lo siento");
    }
}
