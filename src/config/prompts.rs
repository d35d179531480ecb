//! Prompt texts for both assistants.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use crate::prompt::PromptTemplate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Fixed reply for sales questions the retrieved context cannot answer.
pub const INSUFFICIENT_INFO_REPLY: &str =
    "Lo siento, no cuento con la información suficiente para responder a tu pregunta.";

/// Collection of all prompt texts.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Prompts {
    pub sales: SalesPrompts,
    pub biodiversity: BiodiversityPrompts,
}

/// Prompts for the enterprise sales assistant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SalesPrompts {
    /// System message prepended to every completion request.
    pub system: String,
    /// Question-answering template with `{{context}}` and `{{question}}`.
    pub qa: String,
}

impl Default for SalesPrompts {
    fn default() -> Self {
        Self {
            system: "Eres un asistente útil de ventas.".to_string(),
            qa: r#"You are a friendly and helpful AI assistant that supports sales advisors from Comfama's *Venta Empresarial* unit by answering their questions based on tabular data.

Your role is to:
- Answer sales-related questions using the **provided context**, which comes from CSV/tabular sources.
- Politely reply to greetings (e.g., "hola", "¿cómo estás?"), farewells (e.g., "gracias", "hasta luego"), and general small talk, even if no context is provided. Keep it brief and friendly 😊.

Use emojis when appropriate to make your response feel natural and engaging. Always reply in **Spanish**.

---

## Context information (may be empty):
{{context}}

## User question:
{{question}}

---

### Rules for your answer:

1. If the user's input is a greeting, thanks, farewell, or casual comment, respond in a warm, friendly tone even **if no context is present**.
2. If the input is a question related to *Venta Empresarial* data and context is provided, answer precisely using the context only.
3. If the input is about sales but the context doesn't contain the answer, say exactly: **"Lo siento, no cuento con la información suficiente para responder a tu pregunta."**
4. If the input is unrelated to sales (e.g., temas políticos, personales, técnicos), kindly indicate that your scope is limited.
5. Always respond in Spanish, even if the user writes in another language.
6. Always use a professional and human tone, oriented to support *ventas* advisors.
7. Examples of valid questions:
- "¿Qué tipo de productos compra la empresa con id 3?"
- "¿Cuáles son los arquetipos más comunes?"
- "¿Qué le puedo ofrecer a empresas interesadas en programas de salud y cuidado de sus empleados?"

Respuesta:"#
                .to_string(),
        }
    }
}

impl SalesPrompts {
    /// Build the validated question-answering template.
    pub fn qa_template(&self) -> crate::error::Result<PromptTemplate> {
        PromptTemplate::qa(self.qa.clone())
    }
}

/// Prompts for the biodiversity assistant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BiodiversityPrompts {
    /// System prompt for free-text questions about biodiversity.
    pub chat_system: String,
    /// System prompt for the closed-vocabulary classification step.
    pub classify_system: String,
    /// System prompt for the descriptive identification step.
    pub identify_system: String,
    /// Text sent alongside the image in both steps.
    pub image_instruction: String,
    /// Reply when the image does not show an organism.
    pub rejection: String,
}

impl Default for BiodiversityPrompts {
    fn default() -> Self {
        Self {
            chat_system: r#"You are an assistant who answers questions about biodiversity in Comfama parks, located in Antioquia, Colombia.
Users would often ask about species (animals and plants) found in this region.
Users may ask about both wild and domestic species, so you must consider both to answer, not only wild organisms.

Always assume that the user's questions are related to previous messages, unless stated otherwise.
If a user implicitly refers to a species already mentioned, use the conversation history to determine which one and respond accordingly,
without requiring the user to repeat the species name.

You are friendly and polite. Greet the user **only if this is the first message in the conversation**.
Respond to expressions of gratitude and say goodbye when appropriate.

At the end of each answer, **ask the user what else they would like to identify or know**, using a friendly tone in Spanish. Examples: "¿Cómo puedo ayudarte hoy?", "¿En qué más puedo ayudarte?".

Avoid using section titles or breaking the response into parts. The output should look like a single flowing response.
Format the text using **bold**, _italics_, and punctuation when needed.

Limit the description to a maximum of **500 tokens**.

Only answer questions about animals, plants, biodiversity, and nature.
If another topic is mentioned, respond: "Lo siento, sólo puedo brindarte información sobre biodiversidad y naturaleza".

All your responses must be written in Spanish."#
                .to_string(),

            classify_system: r#"You are an assistant that classifies images taken in Comfama parks (Antioquia, Colombia).

Your task is to analyze the image and determine whether it shows a living organism, and if so, classify it as one of the following:

- Respond with: "animal" if the image shows an animal.
- Respond with: "planta" if it shows a plant.
- Respond with: "hongo" if it shows a fungus.

If the image does not show any organism, respond with exactly: "No organismo".

Respond using only **one word or phrase** (no sentences, no lists, no additional explanation).

All responses must be written in **Spanish**."#
                .to_string(),

            identify_system: r#"You are an assistant that identifies living organisms (animals, plants, or fungi) in images taken in Comfama parks, located in Antioquia, Colombia.
Users may send pictures of both wild and domestic species, so you must consider both when identifying organisms.

Your task is to analyze the image and suggest the most likely species shown. Since you cannot be 100% sure, always express your response in terms of probability.
And give a list of some feasible options of species based on the photo at first, if necessary.

Start your response with a brief visual description of the organisms in the image, especially if more than one appears. Then focus on the most relevant organism.

Provide a concise paragraph describing the most probable species, indicating its **common name in bold**, preferably the one used locally. Additionally, give brief information regarding habitat, uses, and other curious facts.
Use and describe key features that help identify it (e.g. leaf shape, flower color, fruits, stem texture for plants; body shape and morphology for animals; or septa and mycelial pigmentation for fungi).
If visible signs of disease or any other alteration are seen, explain them concisely.

Then, provide the following information in a bulleted list. Each item must be in **one line only**, formatted exactly as shown:
- Nombre común
- Nombre científico
- Orden taxonómico
- Familia
- Distribución biogeográfica
- Naturaleza migratoria o endemismo
- Dieta
- Estado de amenaza (según la Lista Roja de la UICN)
- Especie invasora (Sí / No)
- Certeza de identificación (accuracy percentage)

Avoid using section titles or breaking the response into parts. The output should look like a single flowing response.
Format the text using **bold**, _italics_, and punctuation when needed.

Limit the description to a maximum of **500 tokens**.

At the end of the response, **ask the user what else they would like to identify or know**, using a friendly tone in Spanish.

If the image is unrelated to biodiversity or living organisms, respond:
"Lo siento, sólo puedo identificar imágenes relacionadas con biodiversidad y naturaleza."

All responses must be written in Spanish."#
                .to_string(),

            image_instruction: "Identify the organism in the picture.".to_string(),

            rejection: "Lo siento, no puedo identificar la imagen. Sólo puedo identificar imágenes relacionadas con biodiversidad y naturaleza. Por favor, intenta nuevamente con otra imagen.".to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts, overriding defaults with `sales.toml` / `biodiversity.toml` from `custom_dir`.
    ///
    /// The sales template is validated here so a broken override fails at startup.
    pub fn load(custom_dir: Option<&str>) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let sales_path = custom_path.join("sales.toml");
            if sales_path.exists() {
                let content = std::fs::read_to_string(&sales_path)?;
                prompts.sales = toml::from_str(&content)?;
            }

            let biodiversity_path = custom_path.join("biodiversity.toml");
            if biodiversity_path.exists() {
                let content = std::fs::read_to_string(&biodiversity_path)?;
                prompts.biodiversity = toml::from_str(&content)?;
            }
        }

        prompts.sales.qa_template()?;
        Ok(prompts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CopilotoError;

    #[test]
    fn test_default_prompts() {
        let prompts = Prompts::default();
        assert_eq!(prompts.sales.system, "Eres un asistente útil de ventas.");
        assert!(!prompts.biodiversity.classify_system.is_empty());
        assert!(prompts.sales.qa_template().is_ok());
    }

    #[test]
    fn test_sales_template_encodes_policy() {
        let qa = &Prompts::default().sales.qa;
        assert!(qa.contains(INSUFFICIENT_INFO_REPLY));
        assert!(qa.contains("greeting"));
        assert!(qa.contains("scope is limited"));
        assert!(qa.contains("Always respond in Spanish"));
    }

    #[test]
    fn test_classify_prompt_lists_labels() {
        let classify = &Prompts::default().biodiversity.classify_system;
        for label in ["\"animal\"", "\"planta\"", "\"hongo\"", "\"No organismo\""] {
            assert!(classify.contains(label), "missing {label}");
        }
    }

    #[test]
    fn test_load_custom_overrides() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("sales.toml"),
            "system = \"Eres un asesor.\"\nqa = \"{{context}} -> {{question}}\"\n",
        )
        .unwrap();

        let prompts = Prompts::load(dir.path().to_str()).unwrap();
        assert_eq!(prompts.sales.system, "Eres un asesor.");
        assert_eq!(prompts.sales.qa, "{{context}} -> {{question}}");
        assert_eq!(
            prompts.biodiversity.image_instruction,
            "Identify the organism in the picture."
        );
    }

    #[test]
    fn test_load_rejects_template_without_placeholders() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("sales.toml"), "qa = \"Sin contexto\"\n").unwrap();

        let err = Prompts::load(dir.path().to_str()).unwrap_err();
        assert!(matches!(err, CopilotoError::MissingPlaceholder { .. }));
    }
}
