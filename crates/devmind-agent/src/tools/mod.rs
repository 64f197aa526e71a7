//! Built-in tools.
//!
//! - [`KnowledgeTool`]: vector search over ingested documentation
//! - [`WebSearchTool`]: internet search through a [`WebSearcher`]
//! - [`SaveSolutionTool`]: write artifacts to the output directory
//! - [`CreatePlanTool`]: record a numbered plan

mod file;
mod knowledge;
mod plan;
mod web;

pub use file::{SaveSolutionTool, sanitize_filename};
pub use knowledge::{CANDIDATE_COUNT, KnowledgeTool, RESULT_COUNT};
pub use plan::CreatePlanTool;
pub use web::{
    DEFAULT_MAX_RESULTS, HttpSearcher, SearchProvider, SearchResult, SharedSearcher,
    StaticSearcher, WebSearchTool, WebSearcher,
};

/// Knowledge tool over an in-memory store seeded with `documents`.
#[cfg(test)]
pub(crate) fn test_knowledge_tool(documents: &[&str]) -> KnowledgeTool {
    use devmind_llm::MockEmbedder;
    use devmind_memory::{ChunkMetadata, ChunkRecord, DEFAULT_COLLECTION, MockVectorStore, VectorStore};
    use std::sync::Arc;

    let store = MockVectorStore::new();
    let records: Vec<_> = documents
        .iter()
        .enumerate()
        .map(|(i, doc)| {
            // Spread along one axis so store order follows input order
            let mut embedding = vec![0.0f32; 8];
            embedding[0] = 1000.0 + i as f32 * 100.0;
            ChunkRecord::new(format!("doc_{i}"), *doc, embedding, ChunkMetadata::new("test.md", i))
        })
        .collect();
    store
        .upsert(DEFAULT_COLLECTION, &records)
        .expect("mock upsert");

    KnowledgeTool::new(Some(Arc::new(store)), Arc::new(MockEmbedder::new(8)))
}
