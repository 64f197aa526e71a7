//! Vector store trait for pluggable knowledge storage.
//!
//! The agent and the ingestion pipeline only talk to [`VectorStore`], so the
//! SQLite-backed [`KnowledgeStore`](crate::KnowledgeStore) can be swapped for the
//! in-memory [`MockVectorStore`] in tests.
//!
//! # Example
//!
//! ```ignore
//! use devmind_memory::{KnowledgeStore, MockVectorStore, VectorStore};
//!
//! let store = KnowledgeStore::open("./vector_db")?;
//! let mock = MockVectorStore::new();
//!
//! fn nearest(store: &dyn VectorStore, v: &[f32]) {
//!     let hits = store.query("devmind_docs", v, 10).unwrap();
//!     // ...
//! }
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{MemoryError, Result};
use crate::store::KnowledgeStore;
use crate::types::{ChunkRecord, QueryMatch};

/// Trait for vector storage backends.
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync` to allow sharing across threads.
pub trait VectorStore: Send + Sync {
    /// Insert or replace `records` in `collection`, creating it if needed.
    ///
    /// Returns the number of records written.
    fn upsert(&self, collection: &str, records: &[ChunkRecord]) -> Result<usize>;

    /// Return up to `k` records nearest to `embedding`, closest first.
    ///
    /// A collection that does not exist yields an empty list.
    fn query(&self, collection: &str, embedding: &[f32], k: usize) -> Result<Vec<QueryMatch>>;

    /// Number of records in `collection`.
    fn count(&self, collection: &str) -> Result<usize>;
}

/// A shareable vector store.
pub type SharedVectorStore = Arc<dyn VectorStore>;

impl VectorStore for KnowledgeStore {
    fn upsert(&self, collection: &str, records: &[ChunkRecord]) -> Result<usize> {
        KnowledgeStore::upsert(self, collection, records)
    }

    fn query(&self, collection: &str, embedding: &[f32], k: usize) -> Result<Vec<QueryMatch>> {
        KnowledgeStore::query(self, collection, embedding, k)
    }

    fn count(&self, collection: &str) -> Result<usize> {
        KnowledgeStore::count(self, collection)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Mock
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory vector store for testing.
///
/// Performs a brute-force L2 scan. Can be switched into a failing mode to
/// exercise error paths.
#[derive(Debug, Default)]
pub struct MockVectorStore {
    collections: Mutex<BTreeMap<String, BTreeMap<String, ChunkRecord>>>,
    failing: bool,
}

impl MockVectorStore {
    /// Create a new empty mock store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose every operation fails.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Records in `collection`, ordered by id.
    pub fn records(&self, collection: &str) -> Vec<ChunkRecord> {
        self.collections
            .lock()
            .get(collection)
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default()
    }

    fn check(&self) -> Result<()> {
        if self.failing {
            return Err(MemoryError::Query("mock store failure".to_string()));
        }
        Ok(())
    }
}

impl VectorStore for MockVectorStore {
    fn upsert(&self, collection: &str, records: &[ChunkRecord]) -> Result<usize> {
        self.check()?;
        let mut collections = self.collections.lock();
        let entries = collections.entry(collection.to_string()).or_default();
        for record in records {
            entries.insert(record.id.clone(), record.clone());
        }
        Ok(records.len())
    }

    fn query(&self, collection: &str, embedding: &[f32], k: usize) -> Result<Vec<QueryMatch>> {
        self.check()?;
        let collections = self.collections.lock();
        let Some(entries) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut matches: Vec<QueryMatch> = entries
            .values()
            .map(|record| QueryMatch {
                id: record.id.clone(),
                document: record.document.clone(),
                metadata: record.metadata.clone(),
                distance: l2_distance(&record.embedding, embedding),
            })
            .collect();
        matches.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        matches.truncate(k);
        Ok(matches)
    }

    fn count(&self, collection: &str) -> Result<usize> {
        self.check()?;
        Ok(self
            .collections
            .lock()
            .get(collection)
            .map_or(0, BTreeMap::len))
    }
}

fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChunkMetadata;

    fn record(id: &str, embedding: Vec<f32>) -> ChunkRecord {
        ChunkRecord::new(id, format!("text of {id}"), embedding, ChunkMetadata::new("a.md", 0))
    }

    #[test]
    fn test_mock_upsert_and_query() {
        let store = MockVectorStore::new();
        store
            .upsert(
                "docs",
                &[
                    record("far", vec![10.0, 10.0]),
                    record("near", vec![1.0, 0.0]),
                    record("mid", vec![3.0, 0.0]),
                ],
            )
            .unwrap();

        let hits = store.query("docs", &[1.0, 0.0], 2).unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid"]);
        assert_eq!(hits[0].document, "text of near");
        assert_eq!(store.count("docs").unwrap(), 3);
    }

    #[test]
    fn test_mock_upsert_replaces() {
        let store = MockVectorStore::new();
        store.upsert("docs", &[record("a", vec![1.0])]).unwrap();
        store.upsert("docs", &[record("a", vec![2.0])]).unwrap();

        assert_eq!(store.count("docs").unwrap(), 1);
        assert_eq!(store.records("docs")[0].embedding, vec![2.0]);
    }

    #[test]
    fn test_mock_unknown_collection() {
        let store = MockVectorStore::new();
        assert!(store.query("missing", &[1.0], 5).unwrap().is_empty());
        assert_eq!(store.count("missing").unwrap(), 0);
    }

    #[test]
    fn test_mock_failing() {
        let store = MockVectorStore::failing();
        assert!(store.upsert("docs", &[record("a", vec![1.0])]).is_err());
        assert!(store.query("docs", &[1.0], 5).is_err());
    }

    #[test]
    fn test_knowledge_store_through_trait() {
        let store: SharedVectorStore = Arc::new(KnowledgeStore::open_in_memory().unwrap());
        store
            .upsert("devmind_docs", &[record("a_0", vec![0.5, 0.5, 0.0])])
            .unwrap();

        let hits = store.query("devmind_docs", &[0.5, 0.5, 0.0], 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a_0");
    }
}
