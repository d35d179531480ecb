//! Similarity search over the embedded rows.

use super::RetrievedChunk;
use crate::embedding::Embedder;
use crate::error::{CopilotoError, Result};
use crate::vector_store::VectorStore;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Top-k retrieval by similarity to a query.
#[async_trait]
pub trait SimilarityIndex: Send + Sync {
    /// Up to `k` chunks, most similar first. Ties keep insertion order.
    async fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>>;
}

/// Index that embeds the query and ranks stored documents by cosine similarity.
pub struct EmbeddedIndex {
    vector_store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
}

impl EmbeddedIndex {
    pub fn new(vector_store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            vector_store,
            embedder,
        }
    }
}

#[async_trait]
impl SimilarityIndex for EmbeddedIndex {
    #[instrument(skip(self, query))]
    async fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self
            .embedder
            .embed(query)
            .await
            .map_err(|e| CopilotoError::IndexUnavailable(format!("query embedding failed: {}", e)))?;

        let results = self
            .vector_store
            .search(&query_embedding, k)
            .await
            .map_err(|e| match e {
                CopilotoError::VectorStore(msg) => CopilotoError::IndexUnavailable(msg),
                CopilotoError::Database(err) => CopilotoError::IndexUnavailable(err.to_string()),
                other => other,
            })?;

        debug!("Retrieved {} chunks", results.len());
        Ok(results.into_iter().map(RetrievedChunk::from).collect())
    }
}
