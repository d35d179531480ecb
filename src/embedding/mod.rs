//! Embedding generation for indexing rows and retrieving context.

mod openai;

pub use openai::OpenAIEmbedder;

use crate::error::Result;
use async_trait::async_trait;

/// Trait for embedding generation.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get the embedding dimensions.
    fn dimensions(&self) -> usize;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::error::CopilotoError;

    /// Deterministic embedder: counts occurrences of each keyword.
    ///
    /// Texts sharing keywords end up close under cosine similarity.
    pub struct KeywordEmbedder {
        keywords: Vec<String>,
        fail: bool,
    }

    impl KeywordEmbedder {
        pub fn new(keywords: &[&str]) -> Self {
            Self {
                keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
                fail: false,
            }
        }

        pub fn failing() -> Self {
            Self {
                keywords: vec!["x".to_string()],
                fail: true,
            }
        }

        fn vector(&self, text: &str) -> Vec<f32> {
            let lower = text.to_lowercase();
            let mut v: Vec<f32> = self
                .keywords
                .iter()
                .map(|k| lower.matches(k.as_str()).count() as f32)
                .collect();
            // Keep every vector non-zero so cosine similarity is defined.
            v.push(0.01);
            v
        }
    }

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if self.fail {
                return Err(CopilotoError::Embedding("embedder offline".to_string()));
            }
            Ok(self.vector(text))
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            if self.fail {
                return Err(CopilotoError::Embedding("embedder offline".to_string()));
            }
            Ok(texts.iter().map(|t| self.vector(t)).collect())
        }

        fn dimensions(&self) -> usize {
            self.keywords.len() + 1
        }
    }
}
