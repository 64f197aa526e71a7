//! Component construction from configuration.
//!
//! Every collaborator is built once here from the loaded [`DevMindConfig`]
//! and handed to the agent or the ingestion job.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};

use devmind_agent::{
    Agent, AgentConfig, EvaluationTracker, HttpSearcher, KnowledgeTool, SaveSolutionTool,
    SearchProvider, SharedSearcher, TextChunker, ToolRegistry, WebSearchTool,
};
use devmind_config::DevMindConfig;
use devmind_llm::{
    EmbedderSpec, OpenAiConfig, RerankerSpec, SharedBackend, SharedEmbedder, SharedReranker,
};
use devmind_memory::{KnowledgeStore, SharedVectorStore};

/// Chat backend for the configured endpoint.
pub fn backend(config: &DevMindConfig) -> Result<SharedBackend> {
    let llm = config.llm();
    let mut backend_config = OpenAiConfig::ollama()
        .with_base_url(&llm.base_url)
        .with_model(&llm.model)
        .with_timeout(Duration::from_secs(llm.timeout_secs));
    if let Some(key) = llm.api_key.filter(|k| !k.is_empty()) {
        backend_config = backend_config.with_api_key(key);
    }
    devmind_llm::create_shared_backend(backend_config).context("Failed to create LLM backend")
}

/// Embedder for the configured provider.
pub fn embedder(config: &DevMindConfig) -> Result<SharedEmbedder> {
    let embedding = config.embedding();
    let spec = EmbedderSpec {
        provider: embedding.provider,
        model: embedding.model,
        base_url: embedding.base_url.unwrap_or_else(|| config.llm().base_url),
        api_key: embedding.api_key,
        dimensions: embedding.dimensions,
    };
    let embedder = devmind_llm::build_embedder(&spec).context("Failed to create embedder")?;
    tracing::debug!(
        embedder = embedder.name(),
        dimensions = embedder.dimensions(),
        "Embedder ready"
    );
    Ok(embedder)
}

/// Open the knowledge store.
pub fn open_store(config: &DevMindConfig) -> Result<Arc<KnowledgeStore>> {
    let path = config.storage().vector_db_path;
    tracing::info!(path = %path.display(), "Connecting to vector store");
    let store = KnowledgeStore::open(&path)
        .with_context(|| format!("Failed to open vector store at {}", path.display()))?;
    Ok(Arc::new(store))
}

/// Reranker, or `None` when disabled or unavailable.
///
/// A cross-encoder that is not installed falls back to the chat model.
pub fn reranker(config: &DevMindConfig, backend: &SharedBackend) -> Option<SharedReranker> {
    let reranker = config.reranker();
    let spec = RerankerSpec {
        provider: reranker.provider,
        model: reranker.model,
        chat_model: config.llm().model,
        model_dir: reranker.model_dir,
    };
    devmind_llm::build_reranker(&spec, Some(backend.clone()))
}

/// Web searcher for the configured provider.
pub fn searcher(config: &DevMindConfig) -> Result<SharedSearcher> {
    let search = config.search();
    let provider = SearchProvider::from_name(&search.provider, search.api_key)?;
    Ok(Arc::new(HttpSearcher::new(provider)?))
}

/// Chunker from the ingest settings.
pub fn chunker(config: &DevMindConfig) -> Result<TextChunker> {
    let ingest = config.ingest();
    Ok(TextChunker::new(ingest.chunk_size, ingest.chunk_overlap)?)
}

/// Assemble the agent and all of its tools.
///
/// An unreachable vector store is not fatal; retrieval then reports that the
/// database is not initialized.
pub fn agent(config: &DevMindConfig) -> Result<Agent> {
    let backend = backend(config)?;
    let embedder = embedder(config)?;

    let store: Option<SharedVectorStore> = match open_store(config) {
        Ok(store) => Some(store),
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "Failed to connect to vector store");
            None
        }
    };

    let knowledge = KnowledgeTool::new(store, embedder)
        .with_reranker(reranker(config, &backend))
        .with_collection(config.storage().collection);
    let web = WebSearchTool::new(searcher(config)?).with_max_results(config.search().max_results);
    let files = SaveSolutionTool::new(config.paths().output_dir);
    let tools = ToolRegistry::new(knowledge, web, files);

    let llm = config.llm();
    let agent_section = config.agent();
    let mut agent_config = AgentConfig::new(llm.model)
        .with_max_iterations(agent_section.max_iterations)
        .with_history_limit(agent_section.history_bound());
    if let Some(prompt) = agent_section.system_prompt.filter(|p| !p.trim().is_empty()) {
        agent_config = agent_config.with_system_prompt(prompt);
    }

    let tracker = Arc::new(EvaluationTracker::new(config.paths().evaluation_log));

    Ok(Agent::builder()
        .with_shared_backend(backend)
        .with_tools(tools)
        .with_config(agent_config)
        .with_tracker(tracker)
        .build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use devmind_config::{EmbeddingSection, RerankerSection, SearchSection, StorageSection};

    fn offline_config(dir: &std::path::Path) -> DevMindConfig {
        DevMindConfig {
            embedding: Some(EmbeddingSection {
                provider: "mock".to_string(),
                dimensions: Some(8),
                ..EmbeddingSection::default()
            }),
            storage: Some(StorageSection {
                vector_db_path: dir.join("vector_db"),
                ..StorageSection::default()
            }),
            reranker: Some(RerankerSection {
                provider: "none".to_string(),
                ..RerankerSection::default()
            }),
            ..DevMindConfig::default()
        }
    }

    #[test]
    fn test_agent_from_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let agent = agent(&offline_config(dir.path())).unwrap();

        assert_eq!(agent.config().model, "qwen3-vl:8b");
        assert_eq!(agent.config().max_iterations, 10);
        assert_eq!(agent.config().history_limit, Some(200));
        assert_eq!(agent.tools().names().len(), 4);
        assert!(dir.path().join("vector_db").join("knowledge.db").exists());
    }

    #[test]
    fn test_default_config_reranks() {
        let config = DevMindConfig::default();
        let backend = backend(&config).unwrap();

        assert!(reranker(&config, &backend).is_some());
    }

    #[test]
    fn test_missing_cross_encoder_uses_chat_model() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = DevMindConfig {
            reranker: Some(RerankerSection {
                model_dir: Some(dir.path().join("ms-marco-MiniLM-L-6-v2")),
                ..RerankerSection::default()
            }),
            ..DevMindConfig::default()
        };
        let backend = backend(&config).unwrap();

        let reranker = reranker(&config, &backend).unwrap();
        assert_eq!(reranker.name(), "llm");
    }

    #[test]
    fn test_unknown_search_provider_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = offline_config(dir.path());
        config.search = Some(SearchSection {
            provider: "altavista".to_string(),
            ..SearchSection::default()
        });

        let err = agent(&config).unwrap_err();
        assert!(format!("{:#}", err).contains("Unknown search provider"));
    }

    #[test]
    fn test_invalid_chunking_is_rejected() {
        let mut config = DevMindConfig::default();
        config.ingest = Some(devmind_config::IngestSection {
            chunk_size: 100,
            chunk_overlap: 100,
            ..devmind_config::IngestSection::default()
        });
        assert!(chunker(&config).is_err());
    }
}
