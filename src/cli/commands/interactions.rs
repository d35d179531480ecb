//! Interactions command implementation.

use crate::cli::output::content_preview;
use crate::cli::Output;
use crate::config::Settings;
use crate::interactions::InteractionLog;
use anyhow::Result;
use console::style;

/// Show the most recent logged interactions.
pub fn run_interactions(limit: usize, settings: Settings) -> Result<()> {
    let path = settings.interactions_path();
    if !path.exists() {
        Output::warning(&format!("No interaction log at {}", path.display()));
        return Ok(());
    }

    let log = InteractionLog::open(&path)?;
    let interactions = log.recent(limit)?;

    if interactions.is_empty() {
        Output::info("No interactions recorded yet.");
        return Ok(());
    }

    Output::header(&format!("Last {} interactions", interactions.len()));
    for interaction in &interactions {
        println!(
            "\n{} {} {}",
            style(interaction.interaction_date.format("%Y-%m-%d %H:%M:%S")).dim(),
            style(interaction.kind).cyan().bold(),
            style(interaction.id).dim()
        );
        Output::kv("Entrada", &content_preview(&interaction.user_input, 120));
        Output::kv("Respuesta", &content_preview(&interaction.ai_response, 200));
    }

    Ok(())
}
