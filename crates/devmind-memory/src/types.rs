//! Records stored in and returned from the knowledge base.

use serde::{Deserialize, Serialize};

/// Where a chunk came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Path of the source document, as scanned.
    pub source: String,
    /// Position of the chunk within its document.
    pub chunk_index: usize,
}

impl ChunkMetadata {
    /// Create metadata for chunk `chunk_index` of `source`.
    pub fn new(source: impl Into<String>, chunk_index: usize) -> Self {
        Self {
            source: source.into(),
            chunk_index,
        }
    }
}

/// A chunk ready to be upserted.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRecord {
    /// Stable identifier; upserting the same id replaces the previous chunk.
    pub id: String,
    /// The chunk text.
    pub document: String,
    /// Embedding of `document`.
    pub embedding: Vec<f32>,
    /// Provenance.
    pub metadata: ChunkMetadata,
}

impl ChunkRecord {
    /// Create a new record.
    pub fn new(
        id: impl Into<String>,
        document: impl Into<String>,
        embedding: Vec<f32>,
        metadata: ChunkMetadata,
    ) -> Self {
        Self {
            id: id.into(),
            document: document.into(),
            embedding,
            metadata,
        }
    }
}

/// One nearest-neighbor hit.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryMatch {
    /// Chunk id.
    pub id: String,
    /// Chunk text.
    pub document: String,
    /// Provenance.
    pub metadata: ChunkMetadata,
    /// Distance from the query vector (lower = more similar).
    pub distance: f32,
}
