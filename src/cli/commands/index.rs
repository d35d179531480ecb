//! Index command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Indexer;
use anyhow::Result;
use std::path::Path;

/// Run the index command.
pub async fn run_index(files: &[String], force: bool, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Embedding, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let indexer = Indexer::from_settings(&settings)?;
    Output::info(&format!("Indexing into {}", settings.index_path().display()));

    let pb = Output::progress_bar(files.len() as u64, "Indexing...");
    let mut indexed = 0;
    let mut skipped = 0;
    let mut failed = 0;

    for file in files {
        pb.set_message(file.clone());
        match indexer.index_file(Path::new(file), force).await {
            Ok(result) if result.skipped => {
                skipped += 1;
                pb.println(format!("  {} already indexed (use --force to re-index)", result.source));
            }
            Ok(result) => {
                indexed += result.rows_indexed;
                pb.println(format!("  {}: {} rows", result.source, result.rows_indexed));
            }
            Err(e) => {
                failed += 1;
                pb.println(format!("  {} failed: {}", file, e));
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();

    let total = indexer.store().document_count().await?;
    Output::success(&format!(
        "Indexed {} rows ({} skipped, {} failed). Index now holds {} rows.",
        indexed, skipped, failed, total
    ));

    if failed > 0 {
        anyhow::bail!("{} file(s) failed to index", failed);
    }
    Ok(())
}
