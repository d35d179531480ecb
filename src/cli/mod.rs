//! CLI module for Copiloto.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use crate::error::CopilotoError;
use clap::{Parser, Subcommand};

/// Shown when a completion call fails; details go to the log.
pub const APOLOGY_REPLY: &str =
    "Lo siento, ocurrió un error al generar la respuesta. Por favor, intenta nuevamente.";

/// Copiloto - sales and biodiversity assistants
///
/// Answers enterprise sales questions from an indexed knowledge base and identifies
/// organisms in photos taken in the parks.
#[derive(Parser, Debug)]
#[command(name = "copiloto")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask the sales assistant one question
    Ask {
        /// The question to ask
        question: String,
    },

    /// Start an interactive sales session
    Chat,

    /// Start an interactive biodiversity session (use /imagen <path> to identify a photo)
    Bio,

    /// Identify the organism in an image
    Identify {
        /// Path to a PNG, JPEG, GIF or WebP image
        image: String,
    },

    /// Build the sales index from JSON/JSONL row files
    Index {
        /// Files to index (.json array of objects, or .jsonl)
        #[arg(required = true)]
        files: Vec<String>,

        /// Re-index files that are already in the index
        #[arg(short, long)]
        force: bool,
    },

    /// Show the rows retrieved for a query
    Search {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(short, long, default_value = "5")]
        limit: usize,
    },

    /// Show recently logged interactions
    Interactions {
        /// Maximum number of interactions
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Start HTTP API server for integration with other systems
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Check configuration, API keys and the index
    Doctor,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}

/// Text to show the user for a failed turn.
pub fn user_message(error: &CopilotoError) -> String {
    match error {
        CopilotoError::IndexUnavailable(_) => {
            "El asistente de ventas no está disponible: no se pudo cargar el índice. Ejecuta 'copiloto index <archivos>' para crearlo.".to_string()
        }
        CopilotoError::CompletionRequest { .. } => APOLOGY_REPLY.to_string(),
        CopilotoError::InvalidInput(msg) => format!("Entrada inválida: {}", msg),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_index_command() {
        let cli = Cli::try_parse_from(["copiloto", "-vv", "index", "a.json", "b.jsonl", "--force"]).unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Index { files, force } => {
                assert_eq!(files, vec!["a.json", "b.jsonl"]);
                assert!(force);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_user_message_hides_completion_details() {
        let err = CopilotoError::CompletionRequest {
            status: Some(500),
            body: "internal stack trace".to_string(),
        };
        assert_eq!(user_message(&err), APOLOGY_REPLY);

        let err = CopilotoError::IndexUnavailable("missing".to_string());
        assert!(user_message(&err).contains("copiloto index"));
    }
}
