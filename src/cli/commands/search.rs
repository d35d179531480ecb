//! Search command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::embedding::OpenAIEmbedder;
use crate::rag::{EmbeddedIndex, SimilarityIndex};
use crate::vector_store::SqliteVectorStore;
use anyhow::Result;
use std::sync::Arc;

/// Run the search command.
pub async fn run_search(query: &str, limit: usize, settings: Settings) -> Result<()> {
    preflight::check(Operation::Embedding, &settings)?;

    let store = SqliteVectorStore::open_existing(
        &settings.index_path(),
        settings.embedding.dimensions as usize,
    )?;
    let embedder = OpenAIEmbedder::from_settings(&settings.embedding)?;
    let index = EmbeddedIndex::new(Arc::new(store), Arc::new(embedder));

    let spinner = Output::spinner("Searching...");
    let results = index.search(query, limit).await;
    spinner.finish_and_clear();

    match results {
        Ok(chunks) => {
            if chunks.is_empty() {
                Output::warning("No results found matching your query.");
            } else {
                Output::success(&format!("Found {} results", chunks.len()));

                for chunk in &chunks {
                    Output::search_result(&chunk.source, chunk.row_index, chunk.score, &chunk.content);
                }
            }
        }
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
