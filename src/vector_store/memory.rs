//! In-memory vector store implementation.
//!
//! Useful for testing and small datasets.

use super::{rank, Document, IndexedSource, SearchResult, VectorStore};
use crate::error::{CopilotoError, Result};
use async_trait::async_trait;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// In-memory vector store. Documents are kept in insertion order.
pub struct MemoryVectorStore {
    documents: RwLock<Vec<Document>>,
}

impl MemoryVectorStore {
    /// Create a new in-memory vector store.
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(Vec::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<Document>>> {
        self.documents
            .read()
            .map_err(|e| CopilotoError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<Document>>> {
        self.documents
            .write()
            .map_err(|e| CopilotoError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }
}

impl Default for MemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert_batch(&self, docs: &[Document]) -> Result<usize> {
        let mut store = self.write()?;
        for doc in docs {
            let next_seq = store.last().map(|d| d.seq + 1).unwrap_or(1);
            match store.iter_mut().find(|d| d.id == doc.id) {
                Some(existing) => {
                    let seq = existing.seq;
                    *existing = Document { seq, ..doc.clone() };
                }
                None => store.push(Document {
                    seq: next_seq,
                    ..doc.clone()
                }),
            }
        }
        Ok(docs.len())
    }

    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        let docs = self.read()?;
        Ok(rank(query_embedding, docs.iter().cloned(), limit))
    }

    async fn delete_by_source(&self, source: &str) -> Result<usize> {
        let mut docs = self.write()?;
        let initial_len = docs.len();
        docs.retain(|doc| doc.source != source);
        Ok(initial_len - docs.len())
    }

    async fn list_sources(&self) -> Result<Vec<IndexedSource>> {
        let docs = self.read()?;
        let mut sources: Vec<IndexedSource> = Vec::new();

        for doc in docs.iter() {
            match sources.iter_mut().find(|s| s.source == doc.source) {
                Some(entry) => {
                    entry.chunk_count += 1;
                    entry.indexed_at = entry.indexed_at.max(doc.indexed_at);
                }
                None => sources.push(IndexedSource {
                    source: doc.source.clone(),
                    chunk_count: 1,
                    indexed_at: doc.indexed_at,
                }),
            }
        }

        sources.sort_by(|a, b| b.indexed_at.cmp(&a.indexed_at));
        Ok(sources)
    }

    async fn is_source_indexed(&self, source: &str) -> Result<bool> {
        Ok(self.read()?.iter().any(|doc| doc.source == source))
    }

    async fn document_count(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryVectorStore::new();

        let docs = vec![
            Document::new("empresas.json", Some(0), "id: 1", vec![1.0, 0.0]),
            Document::new("empresas.json", Some(1), "id: 2", vec![0.0, 1.0]),
            Document::new("arquetipos.jsonl", Some(0), "arquetipo: A", vec![1.0, 1.0]),
        ];
        assert_eq!(store.upsert_batch(&docs).await.unwrap(), 3);
        assert_eq!(store.document_count().await.unwrap(), 3);

        let results = store.search(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].document.content, "id: 1");
        assert_eq!(results[1].document.content, "arquetipo: A");
        assert!(results[0].score >= results[1].score);

        assert!(store.is_source_indexed("empresas.json").await.unwrap());
        assert_eq!(store.list_sources().await.unwrap().len(), 2);

        assert_eq!(store.delete_by_source("empresas.json").await.unwrap(), 2);
        assert!(!store.is_source_indexed("empresas.json").await.unwrap());
        assert_eq!(store.document_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_insertion_order_is_assigned() {
        let store = MemoryVectorStore::new();
        store
            .upsert_batch(&[Document::new("a.json", Some(0), "uno", vec![1.0])])
            .await
            .unwrap();
        store
            .upsert_batch(&[Document::new("a.json", Some(1), "dos", vec![1.0])])
            .await
            .unwrap();

        let results = store.search(&[1.0], 10).await.unwrap();
        assert_eq!(results[0].document.content, "uno");
        assert!(results[0].document.seq < results[1].document.seq);
    }
}
