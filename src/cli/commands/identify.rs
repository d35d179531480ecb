//! Identify command implementation.

use super::build_services;
use crate::biodiversity::Identification;
use crate::cli::preflight::Operation;
use crate::cli::{user_message, Output};
use crate::config::Settings;
use anyhow::{Context, Result};

/// Run the identify command.
pub async fn run_identify(image: &str, settings: Settings) -> Result<()> {
    let bytes = std::fs::read(image).with_context(|| format!("Failed to read {}", image))?;
    let services = build_services(Operation::Biodiversity, settings)?;

    let spinner = Output::spinner("Analizando la imagen...");
    let result = services.identify(image, &bytes).await;
    spinner.finish_and_clear();

    match result {
        Ok(identification) => {
            Output::kv("Clasificación", &identification.label().to_string());
            match &identification {
                Identification::Described { description, .. } => println!("\n{}\n", description),
                Identification::Rejected { message, .. } => Output::warning(message),
            }
            Ok(())
        }
        Err(e) => {
            Output::error(&user_message(&e));
            Err(e.into())
        }
    }
}
