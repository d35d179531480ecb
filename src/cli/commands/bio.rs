//! Interactive biodiversity session.

use super::build_services;
use super::chat::is_exit;
use crate::biodiversity::image_data_url;
use crate::cli::preflight::Operation;
use crate::cli::{user_message, Output};
use crate::completion::ChatMessage;
use crate::config::Settings;
use anyhow::Result;
use console::style;
use std::io::{self, BufRead, Write};
use std::path::Path;

/// Run the interactive biodiversity session.
///
/// The conversation lives here; every question is sent with the history so far.
pub async fn run_bio(settings: Settings) -> Result<()> {
    let services = build_services(Operation::Biodiversity, settings)?;
    let instruction = services.prompts().biodiversity.image_instruction.clone();

    println!("\n{}", style("Copiloto Biodiversidad").bold().cyan());
    println!(
        "{}\n",
        style("Pregunta sobre fauna y flora, usa '/imagen <ruta>' para identificar una foto, 'limpiar' para reiniciar o 'salir' para terminar.").dim()
    );

    let mut history: Vec<ChatMessage> = Vec::new();
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{} ", style("Tú:").green().bold());
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        if is_exit(input) {
            Output::info("¡Hasta luego!");
            break;
        }

        if input.eq_ignore_ascii_case("limpiar") || input.eq_ignore_ascii_case("clear") {
            history.clear();
            Output::info("Conversación reiniciada.");
            continue;
        }

        if let Some(path) = input.strip_prefix("/imagen") {
            let path = Path::new(path.trim());
            let bytes = match std::fs::read(path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    Output::error(&format!("No se pudo leer {}: {}", path.display(), e));
                    continue;
                }
            };

            let spinner = Output::spinner("Analizando la imagen...");
            let name = path.display().to_string();
            let result = services.identify(&name, &bytes).await;
            spinner.finish_and_clear();

            match result {
                Ok(identification) => {
                    Output::reply("Copiloto", identification.message());
                    if identification.label().is_organism() {
                        if let Ok(url) = image_data_url(&bytes) {
                            history.push(ChatMessage::user_with_image(instruction.clone(), url));
                            history.push(ChatMessage::assistant(identification.message()));
                        }
                    }
                }
                Err(e) => Output::error(&user_message(&e)),
            }
            continue;
        }

        match services.ask_biodiversity(input, &history).await {
            Ok(answer) => {
                Output::reply("Copiloto", &answer);
                history.push(ChatMessage::user(input));
                history.push(ChatMessage::assistant(answer));
            }
            Err(e) => Output::error(&user_message(&e)),
        }
    }

    Ok(())
}
