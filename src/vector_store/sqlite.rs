//! SQLite-based vector store implementation.
//!
//! Cosine similarity is computed in Rust over all stored rows. The index file carries an
//! `index_meta` table with the schema version and embedding dimensions so a stale or foreign
//! file is rejected at startup instead of producing meaningless scores.

use super::{rank, Document, IndexedSource, SearchResult, VectorStore};
use crate::error::{CopilotoError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};
use uuid::Uuid;

const SCHEMA_VERSION: &str = "1";

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS index_meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS documents (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        source TEXT NOT NULL,
        row_index INTEGER,
        content TEXT NOT NULL,
        embedding BLOB NOT NULL,
        indexed_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_documents_source ON documents(source);
"#;

/// SQLite-based vector store.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
    dimensions: usize,
}

impl SqliteVectorStore {
    /// Open a persisted index for querying. Never creates the file.
    ///
    /// Fails with `IndexUnavailable` when the file is missing, is not an index of this
    /// schema version, or was built with different embedding dimensions.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn open_existing(path: &Path, dimensions: usize) -> Result<Self> {
        if !path.exists() {
            return Err(CopilotoError::IndexUnavailable(format!(
                "index file {} not found",
                path.display()
            )));
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| unavailable(path, e))?;

        Self::check_meta(&conn, path, dimensions)?;

        let store = Self {
            conn: Mutex::new(conn),
            dimensions,
        };
        info!("Loaded similarity index from {:?}", path);
        Ok(store)
    }

    /// Create an index file, or open one for writing.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn create(path: &Path, dimensions: usize) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::init(conn, dimensions)
    }

    /// Create an in-memory SQLite vector store (useful for testing).
    pub fn in_memory(dimensions: usize) -> Result<Self> {
        Self::init(Connection::open_in_memory()?, dimensions)
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn init(conn: Connection, dimensions: usize) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;

        let stored = read_meta(&conn, "dimensions")?;
        match stored {
            Some(value) if value != dimensions.to_string() => {
                return Err(CopilotoError::VectorStore(format!(
                    "index was built with {} dimensions, configured {}",
                    value, dimensions
                )));
            }
            Some(_) => {}
            None => {
                conn.execute(
                    "INSERT INTO index_meta (key, value) VALUES ('schema_version', ?1), ('dimensions', ?2)",
                    params![SCHEMA_VERSION, dimensions.to_string()],
                )?;
            }
        }

        Ok(Self {
            conn: Mutex::new(conn),
            dimensions,
        })
    }

    fn check_meta(conn: &Connection, path: &Path, dimensions: usize) -> Result<()> {
        let has_meta: bool = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'index_meta'",
                [],
                |row| row.get::<_, i64>(0),
            )
            .map(|count| count > 0)
            .map_err(|e| unavailable(path, e))?;

        if !has_meta {
            return Err(CopilotoError::IndexUnavailable(format!(
                "{} is not a copiloto index",
                path.display()
            )));
        }

        let version = read_meta(conn, "schema_version").map_err(|e| unavailable(path, e))?;
        if version.as_deref() != Some(SCHEMA_VERSION) {
            return Err(CopilotoError::IndexUnavailable(format!(
                "unsupported index schema version {:?}",
                version
            )));
        }

        let stored = read_meta(conn, "dimensions").map_err(|e| unavailable(path, e))?;
        if stored.as_deref() != Some(dimensions.to_string().as_str()) {
            return Err(CopilotoError::IndexUnavailable(format!(
                "index has {} dimensions, configured {}",
                stored.unwrap_or_else(|| "unknown".to_string()),
                dimensions
            )));
        }

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| CopilotoError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }

    fn row_to_document(row: &Row<'_>) -> rusqlite::Result<Document> {
        let id_str: String = row.get(1)?;
        let embedding_bytes: Vec<u8> = row.get(5)?;
        let indexed_at_str: String = row.get(6)?;

        Ok(Document {
            seq: row.get(0)?,
            id: Uuid::parse_str(&id_str).unwrap_or_default(),
            source: row.get(2)?,
            row_index: row.get(3)?,
            content: row.get(4)?,
            embedding: Self::bytes_to_embedding(&embedding_bytes),
            indexed_at: parse_timestamp(&indexed_at_str),
        })
    }
}

fn unavailable(path: &Path, e: impl std::fmt::Display) -> CopilotoError {
    CopilotoError::IndexUnavailable(format!("cannot read {}: {}", path.display(), e))
}

fn read_meta(conn: &Connection, key: &str) -> Result<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT value FROM index_meta WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?)
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    #[instrument(skip(self, docs), fields(count = docs.len()))]
    async fn upsert_batch(&self, docs: &[Document]) -> Result<usize> {
        if let Some(bad) = docs.iter().find(|d| d.embedding.len() != self.dimensions) {
            return Err(CopilotoError::VectorStore(format!(
                "embedding for {} has {} dimensions, expected {}",
                bad.source,
                bad.embedding.len(),
                self.dimensions
            )));
        }

        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        for doc in docs {
            tx.execute(
                r#"
                INSERT INTO documents (id, source, row_index, content, embedding, indexed_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(id) DO UPDATE SET
                    source = excluded.source,
                    row_index = excluded.row_index,
                    content = excluded.content,
                    embedding = excluded.embedding,
                    indexed_at = excluded.indexed_at
                "#,
                params![
                    doc.id.to_string(),
                    doc.source,
                    doc.row_index,
                    doc.content,
                    Self::embedding_to_bytes(&doc.embedding),
                    doc.indexed_at.to_rfc3339(),
                ],
            )?;
        }

        tx.commit()?;
        info!("Batch upserted {} documents", docs.len());
        Ok(docs.len())
    }

    #[instrument(skip(self, query_embedding))]
    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT seq, id, source, row_index, content, embedding, indexed_at
            FROM documents
            ORDER BY seq
            "#,
        )?;

        let docs = stmt
            .query_map([], Self::row_to_document)?
            .collect::<rusqlite::Result<Vec<Document>>>()?;

        let results = rank(query_embedding, docs, limit);
        debug!("Found {} matching documents", results.len());
        Ok(results)
    }

    #[instrument(skip(self))]
    async fn delete_by_source(&self, source: &str) -> Result<usize> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM documents WHERE source = ?1", params![source])?;
        info!("Deleted {} documents for source {}", deleted, source);
        Ok(deleted)
    }

    #[instrument(skip(self))]
    async fn list_sources(&self) -> Result<Vec<IndexedSource>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT source, COUNT(*) as chunk_count, MAX(indexed_at) as indexed_at
            FROM documents
            GROUP BY source
            ORDER BY indexed_at DESC
            "#,
        )?;

        let sources = stmt
            .query_map([], |row| {
                let indexed_at_str: String = row.get(2)?;
                Ok(IndexedSource {
                    source: row.get(0)?,
                    chunk_count: row.get(1)?,
                    indexed_at: parse_timestamp(&indexed_at_str),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(sources)
    }

    async fn is_source_indexed(&self, source: &str) -> Result<bool> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE source = ?1",
            params![source],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    async fn document_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sqlite_vector_store() {
        let store = SqliteVectorStore::in_memory(3).unwrap();

        let doc = Document::new(
            "empresas.json",
            Some(0),
            "id: 3\nproductos: salud",
            vec![1.0, 0.0, 0.0],
        );
        store.upsert_batch(&[doc]).await.unwrap();

        let sources = store.list_sources().await.unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].source, "empresas.json");
        assert_eq!(sources[0].chunk_count, 1);

        let results = store.search(&[1.0, 0.0, 0.0], 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!((results[0].score - 1.0).abs() < 0.001);
        assert_eq!(results[0].document.row_index, Some(0));

        let deleted = store.delete_by_source("empresas.json").await.unwrap();
        assert_eq!(deleted, 1);
        assert!(store.list_sources().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_wrong_dimensions_on_insert() {
        let store = SqliteVectorStore::in_memory(3).unwrap();
        let err = tokio_test::assert_err!(
            store
                .upsert_batch(&[Document::new("a.json", Some(0), "x", vec![1.0])])
                .await
        );
        assert!(matches!(err, CopilotoError::VectorStore(_)));
    }

    #[tokio::test]
    async fn test_persisted_index_reopens_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.db");

        {
            let store = SqliteVectorStore::create(&path, 2).unwrap();
            let docs: Vec<Document> = (0..4)
                .map(|i| Document::new("filas.jsonl", Some(i), format!("fila {}", i), vec![1.0, 0.0]))
                .collect();
            store.upsert_batch(&docs).await.unwrap();
        }

        let store = SqliteVectorStore::open_existing(&path, 2).unwrap();
        assert_eq!(store.document_count().await.unwrap(), 4);

        let results = store.search(&[1.0, 0.0], 3).await.unwrap();
        let rows: Vec<Option<u32>> = results.iter().map(|r| r.document.row_index).collect();
        assert_eq!(rows, vec![Some(0), Some(1), Some(2)]);
    }

    #[test]
    fn test_open_missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let result = SqliteVectorStore::open_existing(&dir.path().join("nope.db"), 1536);
        assert!(matches!(result, Err(CopilotoError::IndexUnavailable(_))));
    }

    #[test]
    fn test_open_foreign_database_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("other.db");
        Connection::open(&path)
            .unwrap()
            .execute_batch("CREATE TABLE notes (body TEXT);")
            .unwrap();

        let result = SqliteVectorStore::open_existing(&path, 1536);
        assert!(matches!(result, Err(CopilotoError::IndexUnavailable(_))));
    }

    #[test]
    fn test_open_with_other_dimensions_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.db");
        drop(SqliteVectorStore::create(&path, 2).unwrap());

        let result = SqliteVectorStore::open_existing(&path, 1536);
        assert!(matches!(result, Err(CopilotoError::IndexUnavailable(_))));

        let result = SqliteVectorStore::create(&path, 1536);
        assert!(matches!(result, Err(CopilotoError::VectorStore(_))));
    }
}
