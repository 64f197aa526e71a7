//! Knowledge store implementation using SQLite.
//!
//! Chunk text and metadata live in an ordinary `chunks` table; embeddings live
//! in one sqlite-vec table per collection. A `collections` table records the
//! dimensionality each collection was created with so mismatched vectors are
//! rejected instead of corrupting the index.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use tracing::{debug, info};

use crate::error::{MemoryError, Result};
use crate::types::{ChunkMetadata, ChunkRecord, QueryMatch};
use crate::vector;

/// File name of the database inside the configured store directory.
pub const DATABASE_FILE: &str = "knowledge.db";

/// Current schema version for migrations.
const SCHEMA_VERSION: i32 = 1;

// ─────────────────────────────────────────────────────────────────────────────
// Knowledge Store
// ─────────────────────────────────────────────────────────────────────────────

/// Knowledge store backed by SQLite + sqlite-vec.
///
/// Uses WAL mode for better concurrent read performance.
pub struct KnowledgeStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for KnowledgeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl KnowledgeStore {
    /// Open or create a store inside `dir` (the database is `dir/knowledge.db`).
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(DATABASE_FILE);

        vector::init_vector_extension();
        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
        )?;

        let store = Self {
            conn: Mutex::new(conn),
            path: Some(path.clone()),
        };
        store.initialize()?;

        info!(path = %path.display(), "Knowledge store opened");
        Ok(store)
    }

    /// Create an in-memory store (useful for testing).
    pub fn open_in_memory() -> Result<Self> {
        vector::init_vector_extension();
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
            path: None,
        };
        store.initialize()?;

        debug!("In-memory knowledge store created");
        Ok(store)
    }

    /// Path of the database file, if not in-memory.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Initialize the database with schema and pragmas.
    fn initialize(&self) -> Result<()> {
        let conn = self.conn.lock();

        // WAL is unavailable for in-memory databases; SQLite silently keeps "memory"
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        let current_version: i32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap_or(0);

        if current_version >= SCHEMA_VERSION {
            debug!(version = current_version, "Schema up to date");
            return Ok(());
        }

        conn.execute_batch(
            r#"
            -- One row per collection, fixing its embedding size
            CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY,
                dims INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );

            -- Chunk text and provenance
            CREATE TABLE IF NOT EXISTS chunks (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                document TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}',
                updated_at TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            );
            "#,
        )?;

        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        info!(version = SCHEMA_VERSION, "Schema created");
        Ok(())
    }

    /// Dimensionality of a collection, or `None` if it does not exist yet.
    pub fn collection_dims(&self, collection: &str) -> Result<Option<usize>> {
        let conn = self.conn.lock();
        Self::dims_locked(&conn, collection)
    }

    fn dims_locked(conn: &Connection, collection: &str) -> Result<Option<usize>> {
        let dims: Option<i64> = conn
            .query_row(
                "SELECT dims FROM collections WHERE name = ?1",
                params![collection],
                |row| row.get(0),
            )
            .optional()?;
        Ok(dims.map(|d| d as usize))
    }

    /// Insert or replace chunks in `collection`, creating it on first use.
    ///
    /// All records are written in one transaction. Every embedding must have
    /// the collection's dimensionality.
    pub fn upsert(&self, collection: &str, records: &[ChunkRecord]) -> Result<usize> {
        let Some(first) = records.first() else {
            return Ok(0);
        };

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let dims = match Self::dims_locked(&tx, collection)? {
            Some(dims) => dims,
            None => {
                let dims = first.embedding.len();
                if dims == 0 {
                    return Err(MemoryError::InvalidData(
                        "cannot create a collection from an empty embedding".to_string(),
                    ));
                }
                vector::create_vector_table(&tx, collection, dims)?;
                tx.execute(
                    "INSERT INTO collections (name, dims, created_at) VALUES (?1, ?2, ?3)",
                    params![collection, dims as i64, chrono::Utc::now().to_rfc3339()],
                )?;
                dims
            }
        };

        let now = chrono::Utc::now().to_rfc3339();
        for record in records {
            if record.embedding.len() != dims {
                return Err(MemoryError::InvalidData(format!(
                    "chunk '{}' has {} dimensions but collection '{}' expects {}",
                    record.id,
                    record.embedding.len(),
                    collection,
                    dims
                )));
            }

            tx.execute(
                r#"
                INSERT OR REPLACE INTO chunks (collection, id, document, metadata, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![
                    collection,
                    record.id,
                    record.document,
                    serde_json::to_string(&record.metadata)?,
                    now
                ],
            )?;
            vector::store_embedding(&tx, collection, &record.id, &record.embedding)?;
        }

        tx.commit()?;
        debug!(collection, count = records.len(), "Upserted chunks");
        Ok(records.len())
    }

    /// Find the `k` chunks nearest to `embedding`, closest first.
    ///
    /// An unknown collection yields no matches.
    pub fn query(&self, collection: &str, embedding: &[f32], k: usize) -> Result<Vec<QueryMatch>> {
        let conn = self.conn.lock();

        let Some(dims) = Self::dims_locked(&conn, collection)? else {
            return Ok(Vec::new());
        };
        if embedding.len() != dims {
            return Err(MemoryError::Query(format!(
                "query has {} dimensions but collection '{}' expects {}",
                embedding.len(),
                collection,
                dims
            )));
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let hits = vector::search_similar(&conn, collection, embedding, k)?;

        let mut stmt = conn
            .prepare("SELECT document, metadata FROM chunks WHERE collection = ?1 AND id = ?2")?;
        let mut matches = Vec::with_capacity(hits.len());
        for hit in hits {
            let row: Option<(String, String)> = stmt
                .query_row(params![collection, hit.chunk_id], |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })
                .optional()?;

            // An embedding without its chunk row is skipped rather than failing the query
            let Some((document, metadata)) = row else {
                debug!(chunk_id = %hit.chunk_id, "Embedding has no chunk row");
                continue;
            };

            matches.push(QueryMatch {
                id: hit.chunk_id,
                document,
                metadata: serde_json::from_str::<ChunkMetadata>(&metadata)?,
                distance: hit.distance,
            });
        }

        Ok(matches)
    }

    /// Number of chunks in `collection`.
    pub fn count(&self, collection: &str) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM chunks WHERE collection = ?1",
            params![collection],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
