//! Retrieval-augmented question answering over the indexed sales rows.

mod engine;
mod index;

pub use engine::QaOrchestrator;
pub use index::{EmbeddedIndex, SimilarityIndex};

use crate::vector_store::SearchResult;
use serde::Serialize;

/// A chunk returned by the similarity index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedChunk {
    pub content: String,
    /// Originating file or document id.
    pub source: String,
    /// Approximate row marker within the source.
    pub row_index: Option<u32>,
    pub score: f32,
}

impl From<SearchResult> for RetrievedChunk {
    fn from(result: SearchResult) -> Self {
        Self {
            content: result.document.content,
            source: result.document.source,
            row_index: result.document.row_index,
            score: result.score,
        }
    }
}

/// Answer to a sales question with the chunks it was grounded on, in rank order.
#[derive(Debug, Clone, Serialize)]
pub struct QaResult {
    pub answer: String,
    pub sources: Vec<RetrievedChunk>,
}

impl QaResult {
    /// Format the result for terminal display.
    pub fn format_for_display(&self) -> String {
        let mut output = self.answer.clone();

        if !self.sources.is_empty() {
            output.push_str("\n\n--- Fuentes ---\n");
            output.push_str(&format_sources(&self.sources));
        }

        output
    }
}

/// Join chunk contents, in rank order, separated by a blank line.
pub fn format_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|chunk| chunk.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// One line per chunk: source, row marker and score.
pub fn format_sources(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|chunk| {
            let row = chunk
                .row_index
                .map(|r| format!(" fila {}", r))
                .unwrap_or_default();
            format!("{}{} (score: {:.2})", chunk.source, row, chunk.score)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(content: &str, row: Option<u32>) -> RetrievedChunk {
        RetrievedChunk {
            content: content.to_string(),
            source: "empresas.json".to_string(),
            row_index: row,
            score: 0.8,
        }
    }

    #[test]
    fn test_format_context_keeps_rank_order() {
        let chunks = vec![chunk("id: 3", Some(2)), chunk("id: 1", Some(0))];
        assert_eq!(format_context(&chunks), "id: 3\n\nid: 1");
        assert_eq!(format_context(&[]), "");
    }

    #[test]
    fn test_display_lists_sources() {
        let result = QaResult {
            answer: "Compra productos de salud.".to_string(),
            sources: vec![chunk("id: 3", Some(2)), chunk("id: 9", None)],
        };
        let display = result.format_for_display();
        assert!(display.starts_with("Compra productos de salud."));
        assert!(display.contains("empresas.json fila 2 (score: 0.80)"));
        assert!(display.contains("empresas.json (score: 0.80)"));
    }
}
