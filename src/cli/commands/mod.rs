//! CLI command implementations.

mod ask;
mod bio;
mod chat;
mod config;
mod doctor;
mod identify;
mod index;
mod interactions;
mod search;
mod serve;

pub use ask::run_ask;
pub use bio::run_bio;
pub use chat::run_chat;
pub use config::run_config;
pub use doctor::run_doctor;
pub use identify::run_identify;
pub use index::run_index;
pub use interactions::run_interactions;
pub use search::run_search;
pub use serve::run_serve;

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Services;

/// Run pre-flight checks, then build the services.
fn build_services(operation: Operation, settings: Settings) -> anyhow::Result<Services> {
    if let Err(e) = preflight::check(operation, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'copiloto doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    Ok(Services::new(settings)?)
}
