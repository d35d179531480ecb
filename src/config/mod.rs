//! Configuration module for Copiloto.
//!
//! Handles loading and managing application settings and prompt texts.

mod prompts;
mod settings;

pub use prompts::{BiodiversityPrompts, Prompts, SalesPrompts, INSUFFICIENT_INFO_REPLY};
pub use settings::{
    CompletionSettings, EmbeddingSettings, GeneralSettings, HistorySettings, IndexSettings,
    InteractionSettings, PromptSettings, RagSettings, Settings, VisionSettings,
};
