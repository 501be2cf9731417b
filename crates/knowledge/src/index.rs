//! Chunk index: similarity search and chunk lookup.
//!
//! [`SqliteIndex`] is the on-disk store written by ingestion. [`MemoryIndex`]
//! honors the same contract in memory. Both rank by cosine similarity and
//! break ties by ingestion order.

use crate::types::Chunk;
use relnotes_core::{AppError, AppResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

/// Read side of the chunk index consumed by the retriever.
///
/// Implementations must be safe to call concurrently.
#[async_trait::async_trait]
pub trait ChunkIndex: Send + Sync {
    /// Top-k `(chunk_id, score)` pairs, highest score first, ties in
    /// ingestion order.
    async fn similarity_search(&self, embedding: &[f32], k: usize) -> AppResult<Vec<(String, f32)>>;

    /// Fetch a chunk's text and citation fields.
    async fn fetch_chunk(&self, id: &str) -> AppResult<Chunk>;

    /// Number of indexed chunks.
    async fn count(&self) -> AppResult<usize>;
}

/// SQLite-backed chunk index.
#[derive(Clone)]
pub struct SqliteIndex {
    path: PathBuf,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteIndex {
    /// Open (and create if needed) the index database.
    pub fn open(db_path: &Path) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Knowledge(format!("Failed to create index directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| AppError::Knowledge(format!("Failed to open SQLite index: {}", e)))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                ordinal INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                source_id TEXT NOT NULL,
                source_url TEXT NOT NULL,
                source_title TEXT NOT NULL,
                position INTEGER NOT NULL,
                text TEXT NOT NULL,
                embedding BLOB NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_chunks_source ON chunks(source_id);
            "#,
        )
        .map_err(|e| AppError::Knowledge(format!("Failed to create tables: {}", e)))?;

        tracing::debug!("Opened SQLite index at {:?}", db_path);

        Ok(Self {
            path: db_path.to_path_buf(),
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert a chunk with its embedding.
    ///
    /// The chunk's `ordinal` is ignored; the index assigns it. Returns the
    /// assigned ordinal, or `None` when a chunk with the same id exists.
    pub fn insert_chunk(&self, chunk: &Chunk, embedding: &[f32]) -> AppResult<Option<u64>> {
        let conn = self.lock()?;
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO chunks
                 (id, source_id, source_url, source_title, position, text, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    chunk.id,
                    chunk.source_id,
                    chunk.source_url,
                    chunk.source_title,
                    chunk.position as i64,
                    chunk.text,
                    embedding_to_bytes(embedding),
                ],
            )
            .map_err(|e| AppError::Knowledge(format!("Failed to insert chunk: {}", e)))?;

        if inserted == 0 {
            return Ok(None);
        }

        Ok(Some(conn.last_insert_rowid() as u64))
    }

    /// Delete every chunk.
    pub fn reset(&self) -> AppResult<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM chunks", [])
            .map_err(|e| AppError::Knowledge(format!("Failed to delete chunks: {}", e)))?;

        tracing::info!("Reset chunk index");
        Ok(())
    }

    /// Chunk and distinct source counts.
    pub fn counts(&self) -> AppResult<(u64, u64)> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT COUNT(*), COUNT(DISTINCT source_id) FROM chunks",
            [],
            |row| Ok((row.get::<_, i64>(0)? as u64, row.get::<_, i64>(1)? as u64)),
        )
        .map_err(|e| AppError::Knowledge(format!("Failed to count chunks: {}", e)))
    }

    fn lock(&self) -> AppResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Knowledge("Index connection lock poisoned".to_string()))
    }

    /// Run a blocking closure against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> AppResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| AppError::Knowledge("Index connection lock poisoned".to_string()))?;
            f(&guard)
        })
        .await
        .map_err(|e| AppError::Knowledge(format!("Index task failed: {}", e)))?
    }
}

#[async_trait::async_trait]
impl ChunkIndex for SqliteIndex {
    async fn similarity_search(&self, embedding: &[f32], k: usize) -> AppResult<Vec<(String, f32)>> {
        let query = embedding.to_vec();

        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare("SELECT id, embedding FROM chunks ORDER BY ordinal")
                .map_err(|e| AppError::Knowledge(format!("Failed to prepare query: {}", e)))?;

            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?)))
                .map_err(|e| AppError::Knowledge(format!("Failed to query chunks: {}", e)))?;

            let mut scored = Vec::new();
            for row in rows {
                let (id, bytes) =
                    row.map_err(|e| AppError::Knowledge(format!("Failed to read chunk: {}", e)))?;
                let stored = bytes_to_embedding(&bytes)?;
                scored.push((id, cosine_similarity(&query, &stored)?));
            }

            Ok(rank(scored, k))
        })
        .await
    }

    async fn fetch_chunk(&self, id: &str) -> AppResult<Chunk> {
        let id = id.to_string();

        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT ordinal, id, source_id, source_url, source_title, position, text
                 FROM chunks WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Chunk {
                        ordinal: row.get::<_, i64>(0)? as u64,
                        id: row.get(1)?,
                        source_id: row.get(2)?,
                        source_url: row.get(3)?,
                        source_title: row.get(4)?,
                        position: row.get::<_, i64>(5)? as u32,
                        text: row.get(6)?,
                    })
                },
            )
            .optional()
            .map_err(|e| AppError::Knowledge(format!("Failed to fetch chunk: {}", e)))?
            .ok_or_else(|| AppError::Knowledge(format!("Chunk not found in index: {}", id)))
        })
        .await
    }

    async fn count(&self) -> AppResult<usize> {
        self.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get::<_, i64>(0))
                .map(|n| n as usize)
                .map_err(|e| AppError::Knowledge(format!("Failed to count chunks: {}", e)))
        })
        .await
    }
}

/// In-memory chunk index.
#[derive(Default)]
pub struct MemoryIndex {
    entries: RwLock<Vec<(Chunk, Vec<f32>)>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a chunk; the ordinal is assigned in insertion order.
    pub fn insert(&self, mut chunk: Chunk, embedding: Vec<f32>) -> AppResult<Option<u64>> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| AppError::Knowledge("Memory index lock poisoned".to_string()))?;

        if entries.iter().any(|(existing, _)| existing.id == chunk.id) {
            return Ok(None);
        }

        let ordinal = entries.len() as u64;
        chunk.ordinal = ordinal;
        entries.push((chunk, embedding));
        Ok(Some(ordinal))
    }
}

#[async_trait::async_trait]
impl ChunkIndex for MemoryIndex {
    async fn similarity_search(&self, embedding: &[f32], k: usize) -> AppResult<Vec<(String, f32)>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| AppError::Knowledge("Memory index lock poisoned".to_string()))?;

        let scored = entries
            .iter()
            .map(|(chunk, stored)| Ok((chunk.id.clone(), cosine_similarity(embedding, stored)?)))
            .collect::<AppResult<Vec<_>>>()?;

        Ok(rank(scored, k))
    }

    async fn fetch_chunk(&self, id: &str) -> AppResult<Chunk> {
        let entries = self
            .entries
            .read()
            .map_err(|_| AppError::Knowledge("Memory index lock poisoned".to_string()))?;

        entries
            .iter()
            .find(|(chunk, _)| chunk.id == id)
            .map(|(chunk, _)| chunk.clone())
            .ok_or_else(|| AppError::Knowledge(format!("Chunk not found in index: {}", id)))
    }

    async fn count(&self) -> AppResult<usize> {
        self.entries
            .read()
            .map(|entries| entries.len())
            .map_err(|_| AppError::Knowledge("Memory index lock poisoned".to_string()))
    }
}

/// Sort by score descending and keep the top k.
///
/// Input must be in ingestion order; the stable sort keeps ties that way.
fn rank(mut scored: Vec<(String, f32)>, k: usize) -> Vec<(String, f32)> {
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(k);

    tracing::debug!("Ranked {} chunks (requested top-{})", scored.len(), k);
    scored
}

/// Convert embedding vector to little-endian bytes for storage.
fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Convert bytes back to embedding vector.
fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::Knowledge(
            "Invalid embedding bytes length".to_string(),
        ));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Calculate cosine similarity between two vectors.
///
/// A dimension mismatch means the query was embedded in a different space
/// than the index, which is a configuration fault rather than a zero score.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> AppResult<f32> {
    if a.len() != b.len() {
        return Err(AppError::Knowledge(format!(
            "Embedding dimension mismatch: query has {}, index has {}",
            a.len(),
            b.len()
        )));
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    Ok(dot_product / (norm_a * norm_b))
}
