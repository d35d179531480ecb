//! Interactive sales session.

use super::build_services;
use crate::cli::preflight::Operation;
use crate::cli::{user_message, Output};
use crate::config::Settings;
use anyhow::Result;
use console::style;
use std::io::{self, BufRead, Write};

/// Run the interactive sales session. Each question is answered independently.
pub async fn run_chat(settings: Settings) -> Result<()> {
    let services = build_services(Operation::Sales, settings)?;

    println!("\n{}", style("Copiloto Venta Empresarial").bold().cyan());
    if let Some(reason) = services.qa().unavailable_reason() {
        Output::error(&format!("Sales index unavailable: {}", reason));
        Output::info("Questions are disabled until the index is built with 'copiloto index <files>'.");
        return Ok(());
    }
    println!(
        "{}\n",
        style("Escribe tu pregunta, o 'salir' para terminar.").dim()
    );

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

        match services.ask(input).await {
            Ok(result) => Output::reply("Copiloto", &result.answer),
            Err(e) => Output::error(&user_message(&e)),
        }
    }

    Ok(())
}

pub(super) fn is_exit(input: &str) -> bool {
    ["salir", "exit", "quit"]
        .iter()
        .any(|word| input.eq_ignore_ascii_case(word))
}
