//! Knowledge-base storage for DevMind.
//!
//! Document chunks and their embeddings are kept in a single SQLite file with
//! sqlite-vec providing nearest-neighbor search.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  KnowledgeStore                                                         │
//! │  - Single SQLite file (knowledge.db) with WAL mode                      │
//! │  - collections: name -> embedding dimensionality                        │
//! │  - chunks: text + {source, chunk_index} metadata                        │
//! │  - vec_<collection>: sqlite-vec KNN index per collection                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use devmind_memory::{ChunkMetadata, ChunkRecord, KnowledgeStore, DEFAULT_COLLECTION};
//!
//! let store = KnowledgeStore::open("./vector_db")?;
//! store.upsert(
//!     DEFAULT_COLLECTION,
//!     &[ChunkRecord::new(
//!         "guide.md_0",
//!         "DevMind answers questions about your docs.",
//!         vec![0.1, 0.2, 0.3],
//!         ChunkMetadata::new("docs/guide.md", 0),
//!     )],
//! )?;
//!
//! let hits = store.query(DEFAULT_COLLECTION, &[0.1, 0.2, 0.3], 10)?;
//! # Ok::<(), devmind_memory::MemoryError>(())
//! ```

pub mod backend;
pub mod error;
pub mod store;
pub mod types;
pub mod vector;

pub use backend::{MockVectorStore, SharedVectorStore, VectorStore};
pub use error::{MemoryError, Result};
pub use store::{DATABASE_FILE, KnowledgeStore};
pub use types::{ChunkMetadata, ChunkRecord, QueryMatch};

/// Collection that ingestion writes to and retrieval reads from.
pub const DEFAULT_COLLECTION: &str = "devmind_docs";
