//! Ask command implementation.

use super::build_services;
use crate::cli::preflight::Operation;
use crate::cli::{user_message, Output};
use crate::config::Settings;
use anyhow::Result;

/// Run the ask command.
pub async fn run_ask(question: &str, settings: Settings) -> Result<()> {
    let services = build_services(Operation::Sales, settings)?;

    if let Some(reason) = services.qa().unavailable_reason() {
        Output::error(&format!("Sales index unavailable: {}", reason));
        Output::info("Build it with 'copiloto index <files>'.");
        anyhow::bail!("sales index unavailable");
    }

    let spinner = Output::spinner("Buscando en la base de conocimiento...");
    let result = services.ask(question).await;
    spinner.finish_and_clear();

    match result {
        Ok(result) => {
            println!("\n{}\n", result.answer);

            if !result.sources.is_empty() {
                Output::header("Fuentes");
                for source in &result.sources {
                    Output::search_result(&source.source, source.row_index, source.score, &source.content);
                }
            }
            Ok(())
        }
        Err(e) => {
            Output::error(&user_message(&e));
            Err(e.into())
        }
    }
}
