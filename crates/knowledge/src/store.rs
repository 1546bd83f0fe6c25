//! Vector index boundary and its SQLite-backed implementation.
//!
//! The index is consumed through the [`VectorIndex`] trait: insert, cosine
//! nearest-neighbor query, source deletion, full scan and clear. The
//! concrete backend persists (text, metadata, embedding) rows in a SQLite
//! database under the configured directory, one table per collection.

use crate::types::{ChunkMetadata, ScoredChunk, StoreStats, StoredChunk};
use chrono::{DateTime, Utc};
use ragdesk_core::{AppError, AppResult};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Trait for vector index backends.
///
/// Implementations must be shareable across request handlers and bump
/// `revision` on every mutation so dependent caches (the lexical index) can
/// detect staleness.
pub trait VectorIndex: Send + Sync {
    /// Insert chunks with their embeddings. Chunks are immutable once
    /// stored.
    fn insert(&self, chunks: Vec<StoredChunk>, embeddings: Vec<Vec<f32>>) -> AppResult<()>;

    /// Nearest-neighbor query: top-k chunks by descending cosine
    /// similarity to the query embedding.
    fn query(&self, query_embedding: &[f32], top_k: usize) -> AppResult<Vec<ScoredChunk>>;

    /// All stored chunks, in insertion order.
    fn get_all(&self) -> AppResult<Vec<StoredChunk>>;

    /// Chunks belonging to one source document.
    fn get_by_source(&self, source: &str) -> AppResult<Vec<StoredChunk>>;

    /// Delete every chunk of a source document; returns the number removed.
    fn delete_by_source(&self, source: &str) -> AppResult<usize>;

    /// Remove all chunks.
    fn clear(&self) -> AppResult<()>;

    /// Distinct source document names.
    fn sources(&self) -> AppResult<Vec<String>>;

    /// Chunk and source counts.
    fn stats(&self) -> AppResult<StoreStats>;

    /// Monotone counter, bumped on every mutation.
    fn revision(&self) -> u64;
}

/// SQLite-backed vector store.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
    table: String,
    revision: AtomicU64,
}

impl SqliteVectorStore {
    /// Open (or create) the store for a collection under the persistence
    /// directory.
    pub fn open(persist_dir: &Path, collection: &str) -> AppResult<Self> {
        std::fs::create_dir_all(persist_dir)
            .map_err(|e| AppError::Knowledge(format!("Failed to create store directory: {}", e)))?;

        let table = sanitize_collection_name(collection)?;
        let db_path = persist_dir.join(format!("{}.sqlite3", table));

        let conn = Connection::open(&db_path)
            .map_err(|e| AppError::Knowledge(format!("Failed to open vector store: {}", e)))?;

        conn.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id TEXT PRIMARY KEY,
                text TEXT NOT NULL,
                source TEXT NOT NULL,
                created_at TEXT NOT NULL,
                operator TEXT NOT NULL,
                embedding BLOB NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_{table}_source ON {table}(source);
            "#
        ))
        .map_err(|e| AppError::Knowledge(format!("Failed to create tables: {}", e)))?;

        tracing::debug!("Opened vector store '{}' at {:?}", table, db_path);

        Ok(Self {
            conn: Mutex::new(conn),
            table,
            revision: AtomicU64::new(0),
        })
    }

    fn bump_revision(&self) {
        self.revision.fetch_add(1, Ordering::SeqCst);
    }

    fn lock_conn(&self) -> AppResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Knowledge("Vector store lock poisoned".to_string()))
    }

    fn row_to_chunk(row: &rusqlite::Row<'_>) -> rusqlite::Result<(StoredChunk, Vec<u8>)> {
        let created_at_raw: String = row.get(3)?;
        let created_at = DateTime::parse_from_rfc3339(&created_at_raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;

        let embedding_bytes: Vec<u8> = row.get(5)?;

        Ok((
            StoredChunk {
                id: row.get(0)?,
                text: row.get(1)?,
                metadata: ChunkMetadata {
                    source: row.get(2)?,
                    created_at,
                    operator: row.get(4)?,
                },
            },
            embedding_bytes,
        ))
    }
}

impl VectorIndex for SqliteVectorStore {
    fn insert(&self, chunks: Vec<StoredChunk>, embeddings: Vec<Vec<f32>>) -> AppResult<()> {
        if chunks.len() != embeddings.len() {
            return Err(AppError::Knowledge(format!(
                "Chunk/embedding count mismatch: {} vs {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        if chunks.is_empty() {
            return Ok(());
        }

        let mut conn = self.lock_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Knowledge(format!("Failed to begin transaction: {}", e)))?;

        {
            let mut stmt = tx
                .prepare(&format!(
                    "INSERT INTO {} (id, text, source, created_at, operator, embedding)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    self.table
                ))
                .map_err(|e| AppError::Knowledge(format!("Failed to prepare insert: {}", e)))?;

            for (chunk, embedding) in chunks.iter().zip(embeddings.iter()) {
                stmt.execute(params![
                    chunk.id,
                    chunk.text,
                    chunk.metadata.source,
                    chunk.metadata.created_at.to_rfc3339(),
                    chunk.metadata.operator,
                    embedding_to_bytes(embedding),
                ])
                .map_err(|e| AppError::Knowledge(format!("Failed to insert chunk: {}", e)))?;
            }
        }

        tx.commit()
            .map_err(|e| AppError::Knowledge(format!("Failed to commit insert: {}", e)))?;

        drop(conn);
        self.bump_revision();

        tracing::debug!("Inserted {} chunks into '{}'", chunks.len(), self.table);

        Ok(())
    }

    fn query(&self, query_embedding: &[f32], top_k: usize) -> AppResult<Vec<ScoredChunk>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let conn = self.lock_conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT id, text, source, created_at, operator, embedding FROM {} ORDER BY rowid",
                self.table
            ))
            .map_err(|e| AppError::Knowledge(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map([], Self::row_to_chunk)
            .map_err(|e| AppError::Knowledge(format!("Failed to query chunks: {}", e)))?;

        let mut results: Vec<ScoredChunk> = rows
            .filter_map(|r| r.ok())
            .map(|(chunk, embedding_bytes)| {
                let embedding = bytes_to_embedding(&embedding_bytes);
                let score = cosine_similarity(query_embedding, &embedding);
                ScoredChunk { chunk, score }
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(top_k);

        tracing::debug!("Retrieved {} chunks (requested top-{})", results.len(), top_k);

        Ok(results)
    }

    fn get_all(&self) -> AppResult<Vec<StoredChunk>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT id, text, source, created_at, operator, embedding FROM {} ORDER BY rowid",
                self.table
            ))
            .map_err(|e| AppError::Knowledge(format!("Failed to prepare scan: {}", e)))?;

        let rows = stmt
            .query_map([], Self::row_to_chunk)
            .map_err(|e| AppError::Knowledge(format!("Failed to scan chunks: {}", e)))?;

        Ok(rows.filter_map(|r| r.ok()).map(|(chunk, _)| chunk).collect())
    }

    fn get_by_source(&self, source: &str) -> AppResult<Vec<StoredChunk>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT id, text, source, created_at, operator, embedding FROM {}
                 WHERE source = ?1 ORDER BY rowid",
                self.table
            ))
            .map_err(|e| AppError::Knowledge(format!("Failed to prepare scan: {}", e)))?;

        let rows = stmt
            .query_map(params![source], Self::row_to_chunk)
            .map_err(|e| AppError::Knowledge(format!("Failed to scan chunks: {}", e)))?;

        Ok(rows.filter_map(|r| r.ok()).map(|(chunk, _)| chunk).collect())
    }

    fn delete_by_source(&self, source: &str) -> AppResult<usize> {
        let conn = self.lock_conn()?;
        let deleted = conn
            .execute(
                &format!("DELETE FROM {} WHERE source = ?1", self.table),
                params![source],
            )
            .map_err(|e| AppError::Knowledge(format!("Failed to delete source: {}", e)))?;

        drop(conn);
        if deleted > 0 {
            self.bump_revision();
        }

        tracing::info!("Deleted {} chunks for source '{}'", deleted, source);

        Ok(deleted)
    }

    fn clear(&self) -> AppResult<()> {
        let conn = self.lock_conn()?;
        conn.execute(&format!("DELETE FROM {}", self.table), [])
            .map_err(|e| AppError::Knowledge(format!("Failed to clear store: {}", e)))?;

        drop(conn);
        self.bump_revision();

        tracing::info!("Cleared vector store '{}'", self.table);

        Ok(())
    }

    fn sources(&self) -> AppResult<Vec<String>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT DISTINCT source FROM {} ORDER BY source",
                self.table
            ))
            .map_err(|e| AppError::Knowledge(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| AppError::Knowledge(format!("Failed to list sources: {}", e)))?;

        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    fn stats(&self) -> AppResult<StoreStats> {
        let conn = self.lock_conn()?;

        let chunk_count: i64 = conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", self.table), [], |row| {
                row.get(0)
            })
            .map_err(|e| AppError::Knowledge(format!("Failed to count chunks: {}", e)))?;

        let source_count: i64 = conn
            .query_row(
                &format!("SELECT COUNT(DISTINCT source) FROM {}", self.table),
                [],
                |row| row.get(0),
            )
            .map_err(|e| AppError::Knowledge(format!("Failed to count sources: {}", e)))?;

        Ok(StoreStats {
            chunk_count: chunk_count as usize,
            source_count: source_count as usize,
        })
    }

    fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }
}

/// Restrict collection names to a safe identifier charset; the name is
/// interpolated into SQL.
fn sanitize_collection_name(collection: &str) -> AppResult<String> {
    if collection.is_empty()
        || !collection
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        || collection.chars().next().is_some_and(|c| c.is_ascii_digit())
    {
        return Err(AppError::Config(format!(
            "Invalid collection name '{}': use ASCII letters, digits and underscores, not starting with a digit",
            collection
        )));
    }
    Ok(collection.to_string())
}

/// Convert an embedding vector to little-endian bytes for storage.
fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Convert stored bytes back to an embedding vector.
fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity between two vectors.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_chunk(id: &str, text: &str, source: &str) -> StoredChunk {
        StoredChunk {
            id: id.to_string(),
            text: text.to_string(),
            metadata: ChunkMetadata {
                source: source.to_string(),
                created_at: Utc::now(),
                operator: "tester".to_string(),
            },
        }
    }

    #[test]
    fn test_open_creates_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("store");
        let store = SqliteVectorStore::open(&path, "rag").unwrap();
        assert!(path.exists());
        assert_eq!(store.revision(), 0);
    }

    #[test]
    fn test_invalid_collection_name() {
        let dir = TempDir::new().unwrap();
        assert!(SqliteVectorStore::open(dir.path(), "bad-name").is_err());
        assert!(SqliteVectorStore::open(dir.path(), "1leading").is_err());
        assert!(SqliteVectorStore::open(dir.path(), "").is_err());
    }

    #[test]
    fn test_insert_and_query() {
        let dir = TempDir::new().unwrap();
        let store = SqliteVectorStore::open(dir.path(), "rag").unwrap();

        store
            .insert(
                vec![
                    test_chunk("c1", "Rust is a systems language", "rust.txt"),
                    test_chunk("c2", "Pasta recipes", "food.txt"),
                ],
                vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]],
            )
            .unwrap();

        let results = store.query(&[0.9, 0.1, 0.0], 5).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.id, "c1");
        assert!(results[0].score > results[1].score);
    }

    #[test]
    fn test_query_truncates_to_top_k() {
        let dir = TempDir::new().unwrap();
        let store = SqliteVectorStore::open(dir.path(), "rag").unwrap();

        let chunks: Vec<StoredChunk> = (0..5)
            .map(|i| test_chunk(&format!("c{}", i), "text", "s.txt"))
            .collect();
        let embeddings: Vec<Vec<f32>> = (0..5).map(|i| vec![i as f32, 1.0]).collect();
        store.insert(chunks, embeddings).unwrap();

        let results = store.query(&[1.0, 0.0], 2).unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        let dir = TempDir::new().unwrap();
        let store = SqliteVectorStore::open(dir.path(), "rag").unwrap();

        let result = store.insert(vec![test_chunk("c1", "t", "s")], vec![]);
        assert!(result.is_err());
    }

    #[test]
    fn test_delete_by_source() {
        let dir = TempDir::new().unwrap();
        let store = SqliteVectorStore::open(dir.path(), "rag").unwrap();

        store
            .insert(
                vec![
                    test_chunk("c1", "a", "keep.txt"),
                    test_chunk("c2", "b", "drop.txt"),
                    test_chunk("c3", "c", "drop.txt"),
                ],
                vec![vec![1.0], vec![1.0], vec![1.0]],
            )
            .unwrap();

        let rev_before = store.revision();
        assert_eq!(store.delete_by_source("drop.txt").unwrap(), 2);
        assert!(store.revision() > rev_before);

        let stats = store.stats().unwrap();
        assert_eq!(stats.chunk_count, 1);
        assert_eq!(stats.source_count, 1);

        // Deleting a missing source is a no-op and does not bump revision
        let rev = store.revision();
        assert_eq!(store.delete_by_source("absent.txt").unwrap(), 0);
        assert_eq!(store.revision(), rev);
    }

    #[test]
    fn test_clear() {
        let dir = TempDir::new().unwrap();
        let store = SqliteVectorStore::open(dir.path(), "rag").unwrap();

        store
            .insert(vec![test_chunk("c1", "a", "s.txt")], vec![vec![1.0]])
            .unwrap();
        store.clear().unwrap();

        assert_eq!(store.stats().unwrap().chunk_count, 0);
        assert!(store.get_all().unwrap().is_empty());
    }

    #[test]
    fn test_metadata_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = SqliteVectorStore::open(dir.path(), "rag").unwrap();

        let chunk = test_chunk("c1", "产品保修期为一年。", "policy.txt");
        let created_at = chunk.metadata.created_at;
        store.insert(vec![chunk], vec![vec![0.5, 0.5]]).unwrap();

        let all = store.get_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].text, "产品保修期为一年。");
        assert_eq!(all[0].metadata.source, "policy.txt");
        assert_eq!(all[0].metadata.operator, "tester");
        assert_eq!(
            all[0].metadata.created_at.timestamp(),
            created_at.timestamp()
        );
    }

    #[test]
    fn test_persistence_across_reopen() {
        let dir = TempDir::new().unwrap();

        {
            let store = SqliteVectorStore::open(dir.path(), "rag").unwrap();
            store
                .insert(vec![test_chunk("c1", "persisted", "s.txt")], vec![vec![1.0]])
                .unwrap();
        }

        let reopened = SqliteVectorStore::open(dir.path(), "rag").unwrap();
        assert_eq!(reopened.stats().unwrap().chunk_count, 1);
    }

    #[test]
    fn test_sources_listing() {
        let dir = TempDir::new().unwrap();
        let store = SqliteVectorStore::open(dir.path(), "rag").unwrap();

        store
            .insert(
                vec![
                    test_chunk("c1", "a", "b.txt"),
                    test_chunk("c2", "b", "a.txt"),
                    test_chunk("c3", "c", "a.txt"),
                ],
                vec![vec![1.0], vec![1.0], vec![1.0]],
            )
            .unwrap();

        assert_eq!(store.sources().unwrap(), vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![1.0, 0.0, 0.0];
        let d = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&c, &d) - 0.0).abs() < 0.001);
    }

    #[test]
    fn test_embedding_bytes_round_trip() {
        let embedding = vec![0.25f32, -1.5, 3.75];
        let bytes = embedding_to_bytes(&embedding);
        assert_eq!(bytes_to_embedding(&bytes), embedding);
    }
}
