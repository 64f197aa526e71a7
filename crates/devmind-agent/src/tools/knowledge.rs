//! Knowledge base retrieval tool.
//!
//! Embeds the query, pulls the nearest chunks from the vector store and,
//! when a reranker is configured, reorders them by relevance before keeping
//! the best few.

use serde_json::{Value, json};

use devmind_llm::{SharedEmbedder, SharedReranker};
use devmind_memory::{DEFAULT_COLLECTION, SharedVectorStore};

use crate::error::Result;
use crate::tool::{KnowledgeParams, ToolResult};

/// Candidates fetched from the store per query.
pub const CANDIDATE_COUNT: usize = 10;

/// Passages returned to the model.
pub const RESULT_COUNT: usize = 3;

const PLAIN_SEPARATOR: &str = "\n\n";
const RERANKED_SEPARATOR: &str = "\n\n---\n\n";

/// Tool for searching the local knowledge base.
#[derive(Clone)]
pub struct KnowledgeTool {
    store: Option<SharedVectorStore>,
    embedder: SharedEmbedder,
    reranker: Option<SharedReranker>,
    collection: String,
}

impl std::fmt::Debug for KnowledgeTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeTool")
            .field("store", &self.store.is_some())
            .field("embedder", &self.embedder.name())
            .field("reranker", &self.reranker.as_ref().map(|r| r.name().to_string()))
            .field("collection", &self.collection)
            .finish()
    }
}

impl KnowledgeTool {
    pub const NAME: &'static str = "retrieve_knowledge";
    pub const DESCRIPTION: &'static str = "Search the local knowledge base (documentation) for information.";

    /// Create a tool over `store`. `None` means the store could not be opened.
    pub fn new(store: Option<SharedVectorStore>, embedder: SharedEmbedder) -> Self {
        Self {
            store,
            embedder,
            reranker: None,
            collection: DEFAULT_COLLECTION.to_string(),
        }
    }

    /// Rerank candidates with `reranker`.
    pub fn with_reranker(mut self, reranker: Option<SharedReranker>) -> Self {
        self.reranker = reranker;
        self
    }

    /// Query a different collection.
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn parameters() -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query to find relevant documentation."
                }
            },
            "required": ["query"]
        })
    }

    pub async fn execute(&self, params: KnowledgeParams) -> Result<ToolResult> {
        let Some(store) = &self.store else {
            return Ok(ToolResult::error("Error: Database not initialized."));
        };

        let embedding = match self.embedder.embed(&params.query).await {
            Ok(embedding) if !embedding.is_empty() => embedding,
            result => {
                if let Err(e) = result {
                    tracing::warn!(error = %e, "Query embedding failed");
                }
                return Ok(ToolResult::error(
                    "Error: Could not generate embedding for query.",
                ));
            }
        };

        let matches = match store.query(&self.collection, &embedding, CANDIDATE_COUNT) {
            Ok(matches) => matches,
            Err(e) => return Ok(ToolResult::error(format!("Error querying database: {}", e))),
        };

        if matches.is_empty() {
            return Ok(ToolResult::text(
                "No relevant information found in knowledge base.",
            ));
        }

        let documents: Vec<String> = matches.into_iter().map(|m| m.document).collect();
        tracing::debug!(
            collection = %self.collection,
            candidates = documents.len(),
            "Knowledge base candidates retrieved"
        );

        if let Some(reranker) = &self.reranker {
            match reranker.score(&params.query, &documents).await {
                Ok(scores) if scores.len() == documents.len() => {
                    return Ok(ToolResult::text(top_by_score(documents, &scores)));
                }
                Ok(scores) => tracing::warn!(
                    reranker = reranker.name(),
                    expected = documents.len(),
                    got = scores.len(),
                    "Reranker returned wrong number of scores"
                ),
                Err(e) => tracing::warn!(reranker = reranker.name(), error = %e, "Reranking failed"),
            }
        }

        Ok(ToolResult::text(
            documents
                .into_iter()
                .take(RESULT_COUNT)
                .collect::<Vec<_>>()
                .join(PLAIN_SEPARATOR),
        ))
    }
}

/// Best `RESULT_COUNT` documents by descending score; ties keep store order.
fn top_by_score(documents: Vec<String>, scores: &[f32]) -> String {
    let mut ranked: Vec<(f32, String)> = scores.iter().copied().zip(documents).collect();
    ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
    ranked
        .into_iter()
        .take(RESULT_COUNT)
        .map(|(_, doc)| doc)
        .collect::<Vec<_>>()
        .join(RERANKED_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use devmind_llm::{Embedder, MockEmbedder, MockReranker};
    use devmind_memory::{ChunkMetadata, ChunkRecord, MockVectorStore, VectorStore};
    use std::sync::Arc;

    const DIMS: usize = 16;

    /// Store with documents at increasing distance from the query "q".
    async fn seeded_store(docs: &[&str]) -> Arc<MockVectorStore> {
        let embedder = MockEmbedder::new(DIMS);
        let query = embedder.embed("q").await.unwrap();
        let store = Arc::new(MockVectorStore::new());
        let records: Vec<_> = docs
            .iter()
            .enumerate()
            .map(|(i, doc)| {
                let embedding = query.iter().map(|v| v + i as f32 * 0.1).collect();
                ChunkRecord::new(format!("doc_{i}"), *doc, embedding, ChunkMetadata::new("doc.md", i))
            })
            .collect();
        store.upsert(DEFAULT_COLLECTION, &records).unwrap();
        store
    }

    fn tool(store: Arc<MockVectorStore>) -> KnowledgeTool {
        KnowledgeTool::new(Some(store), Arc::new(MockEmbedder::new(DIMS)))
    }

    fn params(query: &str) -> KnowledgeParams {
        KnowledgeParams {
            query: query.to_string(),
        }
    }

    #[tokio::test]
    async fn test_missing_store() {
        let tool = KnowledgeTool::new(None, Arc::new(MockEmbedder::new(DIMS)));
        let result = tool.execute(params("q")).await.unwrap();
        assert_eq!(result.content(), "Error: Database not initialized.");
    }

    #[tokio::test]
    async fn test_embedding_failure() {
        let store = seeded_store(&["a"]).await;
        let tool = KnowledgeTool::new(
            Some(store),
            Arc::new(MockEmbedder::new(DIMS).with_failure_on("")),
        );
        let result = tool.execute(params("q")).await.unwrap();
        assert_eq!(result.content(), "Error: Could not generate embedding for query.");
    }

    #[tokio::test]
    async fn test_store_failure() {
        let tool = KnowledgeTool::new(
            Some(Arc::new(MockVectorStore::failing())),
            Arc::new(MockEmbedder::new(DIMS)),
        );
        let result = tool.execute(params("q")).await.unwrap();
        assert_eq!(
            result.content(),
            "Error querying database: Query error: mock store failure"
        );
    }

    #[tokio::test]
    async fn test_empty_results() {
        let tool = tool(Arc::new(MockVectorStore::new()));
        let result = tool.execute(params("q")).await.unwrap();
        assert_eq!(result.content(), "No relevant information found in knowledge base.");
    }

    #[tokio::test]
    async fn test_without_reranker_returns_first_three() {
        let tool = tool(seeded_store(&["one", "two", "three", "four", "five"]).await);
        let result = tool.execute(params("q")).await.unwrap();
        assert_eq!(result.content(), "one\n\ntwo\n\nthree");
    }

    #[tokio::test]
    async fn test_fewer_than_three_candidates() {
        let tool = tool(seeded_store(&["only"]).await);
        let result = tool.execute(params("q")).await.unwrap();
        assert_eq!(result.content(), "only");
    }

    #[tokio::test]
    async fn test_reranker_orders_by_score() {
        let tool = tool(seeded_store(&["a", "b", "c", "d"]).await).with_reranker(Some(Arc::new(
            MockReranker::with_scores(vec![0.1, 0.9, 0.5, 0.7]),
        )));
        let result = tool.execute(params("q")).await.unwrap();
        assert_eq!(result.content(), "b\n\n---\n\nd\n\n---\n\nc");
    }

    #[tokio::test]
    async fn test_reranker_ties_keep_store_order() {
        let tool = tool(seeded_store(&["a", "b", "c", "d"]).await).with_reranker(Some(Arc::new(
            MockReranker::with_scores(vec![0.5, 0.5, 0.9, 0.5]),
        )));
        let result = tool.execute(params("q")).await.unwrap();
        assert_eq!(result.content(), "c\n\n---\n\na\n\n---\n\nb");
    }

    #[tokio::test]
    async fn test_failed_rerank_falls_back() {
        let tool = tool(seeded_store(&["one", "two", "three", "four"]).await)
            .with_reranker(Some(Arc::new(MockReranker::failing())));
        let result = tool.execute(params("q")).await.unwrap();
        assert_eq!(result.content(), "one\n\ntwo\n\nthree");
    }

    #[tokio::test]
    async fn test_score_count_mismatch_falls_back() {
        let tool = tool(seeded_store(&["one", "two", "three", "four"]).await)
            .with_reranker(Some(Arc::new(MockReranker::with_scores(vec![1.0]))));
        let result = tool.execute(params("q")).await.unwrap();
        assert_eq!(result.content(), "one\n\ntwo\n\nthree");
    }

    #[tokio::test]
    async fn test_other_collection_is_separate() {
        let tool = tool(seeded_store(&["a"]).await).with_collection("other");
        let result = tool.execute(params("q")).await.unwrap();
        assert_eq!(result.content(), "No relevant information found in knowledge base.");
    }
}
