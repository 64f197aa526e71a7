//! Vector storage and similarity search using sqlite-vec.
//!
//! Each collection gets its own `vec0` virtual table, created lazily with the
//! dimensionality of the first vector written to it.

use rusqlite::{Connection, params};
use tracing::{debug, info};
use zerocopy::IntoBytes;

use crate::error::{MemoryError, Result};

/// Initialize sqlite-vec extension for a connection.
///
/// This must be called before opening connections that use vector operations.
/// `sqlite3_auto_extension` applies globally to all connections opened afterwards.
pub fn init_vector_extension() {
    use rusqlite::ffi::sqlite3_auto_extension;
    use sqlite_vec::sqlite3_vec_init;

    unsafe {
        #[allow(clippy::missing_transmute_annotations)]
        sqlite3_auto_extension(Some(std::mem::transmute(sqlite3_vec_init as *const ())));
    }
}

/// Name of the vec0 table backing `collection`.
///
/// Collection names are interpolated into SQL, so only ASCII alphanumerics
/// and underscores are accepted.
pub fn vector_table_name(collection: &str) -> Result<String> {
    if collection.is_empty()
        || !collection
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(MemoryError::InvalidData(format!(
            "invalid collection name '{}': use letters, digits and underscores",
            collection
        )));
    }
    Ok(format!("vec_{}", collection))
}

/// Create the vector table for a collection.
pub fn create_vector_table(conn: &Connection, collection: &str, dims: usize) -> Result<()> {
    let table = vector_table_name(collection)?;
    let sql = format!(
        r#"
        CREATE VIRTUAL TABLE IF NOT EXISTS {table} USING vec0(
            chunk_id TEXT PRIMARY KEY,
            embedding float[{dims}]
        )
        "#
    );

    conn.execute_batch(&sql)?;

    info!(collection, dims, "Created vector table");
    Ok(())
}

/// Store an embedding for a chunk, replacing any previous one.
pub fn store_embedding(
    conn: &Connection,
    collection: &str,
    chunk_id: &str,
    embedding: &[f32],
) -> Result<()> {
    let table = vector_table_name(collection)?;

    // vec0 doesn't support INSERT OR REPLACE, so delete first if exists
    conn.execute(
        &format!("DELETE FROM {table} WHERE chunk_id = ?1"),
        params![chunk_id],
    )?;

    conn.execute(
        &format!("INSERT INTO {table} (chunk_id, embedding) VALUES (?1, ?2)"),
        params![chunk_id, embedding.as_bytes()],
    )?;

    debug!(collection, chunk_id, "Stored embedding");
    Ok(())
}

/// Result of a similarity search.
#[derive(Debug, Clone)]
pub struct SimilarityResult {
    /// The chunk ID.
    pub chunk_id: String,
    /// Distance from the query vector (lower = more similar).
    pub distance: f32,
}

/// Search for chunks similar to a query embedding.
///
/// Returns the top-k most similar chunks ordered by distance (ascending).
pub fn search_similar(
    conn: &Connection,
    collection: &str,
    query_embedding: &[f32],
    limit: usize,
) -> Result<Vec<SimilarityResult>> {
    let table = vector_table_name(collection)?;
    let mut stmt = conn.prepare(&format!(
        r#"
        SELECT chunk_id, distance
        FROM {table}
        WHERE embedding MATCH ?1
        ORDER BY distance
        LIMIT ?2
        "#
    ))?;

    let mut rows = stmt.query(params![query_embedding.as_bytes(), limit as i64])?;

    let mut results = Vec::new();
    while let Some(row) = rows.next()? {
        results.push(SimilarityResult {
            chunk_id: row.get(0)?,
            distance: row.get(1)?,
        });
    }

    debug!(collection, found = results.len(), limit, "Similarity search");
    Ok(results)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_connection() -> Connection {
        init_vector_extension();
        let conn = Connection::open_in_memory().unwrap();
        create_vector_table(&conn, "docs", 4).unwrap(); // Small dims for testing
        conn
    }

    #[test]
    fn test_vector_extension_loads() {
        init_vector_extension();
        let conn = Connection::open_in_memory().unwrap();
        let version: String = conn.query_row("SELECT vec_version()", [], |row| row.get(0)).unwrap();
        assert!(!version.is_empty());
    }

    #[test]
    fn test_vector_table_name_validation() {
        assert_eq!(vector_table_name("devmind_docs").unwrap(), "vec_devmind_docs");
        assert!(vector_table_name("").is_err());
        assert!(vector_table_name("docs; DROP TABLE chunks").is_err());
        assert!(vector_table_name("my-docs").is_err());
    }

    #[test]
    fn test_similarity_search() {
        let conn = create_test_connection();

        store_embedding(&conn, "docs", "a", &[1.0f32, 0.0, 0.0, 0.0]).unwrap();
        store_embedding(&conn, "docs", "b", &[0.9f32, 0.1, 0.0, 0.0]).unwrap();
        store_embedding(&conn, "docs", "c", &[0.0f32, 0.0, 1.0, 0.0]).unwrap();

        let results = search_similar(&conn, "docs", &[1.0f32, 0.0, 0.0, 0.0], 10).unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].chunk_id, "a");
        assert!(results[0].distance < 0.01);
        assert_eq!(results[1].chunk_id, "b");
        assert_eq!(results[2].chunk_id, "c");
    }

    #[test]
    fn test_similarity_search_with_limit() {
        let conn = create_test_connection();

        for i in 0..5 {
            store_embedding(&conn, "docs", &format!("c{}", i), &[i as f32, 0.0, 0.0, 0.0])
                .unwrap();
        }

        let results = search_similar(&conn, "docs", &[2.5f32, 0.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_store_embedding_replaces() {
        let conn = create_test_connection();

        store_embedding(&conn, "docs", "a", &[1.0f32, 0.0, 0.0, 0.0]).unwrap();
        store_embedding(&conn, "docs", "a", &[0.0f32, 1.0, 0.0, 0.0]).unwrap();

        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM vec_docs", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);

        let results = search_similar(&conn, "docs", &[0.0f32, 1.0, 0.0, 0.0], 1).unwrap();
        assert_eq!(results[0].chunk_id, "a");
        assert!(results[0].distance < 0.01);
    }
}
