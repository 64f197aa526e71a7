//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [llm]          # chat model endpoint
//! [embedding]    # embedding provider
//! [storage]      # vector store location
//! [paths]        # docs, outputs and evaluation log
//! [reranker]     # passage reranking
//! [search]       # web search provider
//! [agent]        # loop bounds and system prompt
//! [ingest]       # chunking and file selection
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Built-in default values.
pub mod defaults {
    /// OpenAI-compatible base URL of a local Ollama server.
    pub const BASE_URL: &str = "http://localhost:11434/v1";
    /// Chat model.
    pub const LLM_MODEL: &str = "qwen3-vl:8b";
    /// Request timeout for chat completions, in seconds.
    pub const LLM_TIMEOUT_SECS: u64 = 600;
    /// Embedding provider.
    pub const EMBEDDING_PROVIDER: &str = "ollama";
    /// Embedding model.
    pub const EMBEDDING_MODEL: &str = "nomic-embed-text";
    /// Vector store directory.
    pub const VECTOR_DB_PATH: &str = "./data/vector_db";
    /// Knowledge-base collection.
    pub const COLLECTION: &str = "devmind_docs";
    /// Source documents directory.
    pub const DOCS_SOURCE_PATH: &str = "./data/knowledge_base";
    /// Directory for files saved by the agent.
    pub const OUTPUT_DIR: &str = "./output";
    /// Evaluation log (JSONL).
    pub const EVALUATION_LOG_FILE: &str = "data/evaluation/ragas_dataset.jsonl";
    /// Reranker provider.
    pub const RERANKER_PROVIDER: &str = "cross-encoder";
    /// Reranker model.
    pub const RERANKER_MODEL: &str = "cross-encoder/ms-marco-MiniLM-L-6-v2";
    /// Web search provider.
    pub const SEARCH_PROVIDER: &str = "duckduckgo";
    /// Results kept per web search.
    pub const SEARCH_MAX_RESULTS: usize = 5;
    /// Reasoning iterations per turn.
    pub const MAX_ITERATIONS: u32 = 10;
    /// Non-system messages kept in history.
    pub const HISTORY_LIMIT: usize = 200;
    /// Characters per chunk.
    pub const CHUNK_SIZE: usize = 1000;
    /// Characters shared between consecutive chunks.
    pub const CHUNK_OVERLAP: usize = 100;
}

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g., project-local
/// overrides) can be loaded and merged. A section present in a later layer
/// replaces the earlier one as a whole; use the accessor methods to read a
/// section with defaults applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevMindConfig {
    /// Chat model endpoint.
    pub llm: Option<LlmSection>,
    /// Embedding provider.
    pub embedding: Option<EmbeddingSection>,
    /// Vector store.
    pub storage: Option<StorageSection>,
    /// Filesystem locations.
    pub paths: Option<PathsSection>,
    /// Passage reranking.
    pub reranker: Option<RerankerSection>,
    /// Web search.
    pub search: Option<SearchSection>,
    /// Agent loop.
    pub agent: Option<AgentSection>,
    /// Document ingestion.
    pub ingest: Option<IngestSection>,
}

impl DevMindConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> crate::Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> crate::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: DevMindConfig) {
        if other.llm.is_some() {
            self.llm = other.llm;
        }
        if other.embedding.is_some() {
            self.embedding = other.embedding;
        }
        if other.storage.is_some() {
            self.storage = other.storage;
        }
        if other.paths.is_some() {
            self.paths = other.paths;
        }
        if other.reranker.is_some() {
            self.reranker = other.reranker;
        }
        if other.search.is_some() {
            self.search = other.search;
        }
        if other.agent.is_some() {
            self.agent = other.agent;
        }
        if other.ingest.is_some() {
            self.ingest = other.ingest;
        }
    }

    /// The `[llm]` section with defaults applied.
    pub fn llm(&self) -> LlmSection {
        self.llm.clone().unwrap_or_default()
    }

    /// The `[embedding]` section with defaults applied.
    pub fn embedding(&self) -> EmbeddingSection {
        self.embedding.clone().unwrap_or_default()
    }

    /// The `[storage]` section with defaults applied.
    pub fn storage(&self) -> StorageSection {
        self.storage.clone().unwrap_or_default()
    }

    /// The `[paths]` section with defaults applied.
    pub fn paths(&self) -> PathsSection {
        self.paths.clone().unwrap_or_default()
    }

    /// The `[reranker]` section with defaults applied.
    pub fn reranker(&self) -> RerankerSection {
        self.reranker.clone().unwrap_or_default()
    }

    /// The `[search]` section with defaults applied.
    pub fn search(&self) -> SearchSection {
        self.search.clone().unwrap_or_default()
    }

    /// The `[agent]` section with defaults applied.
    pub fn agent(&self) -> AgentSection {
        self.agent.clone().unwrap_or_default()
    }

    /// The `[ingest]` section with defaults applied.
    pub fn ingest(&self) -> IngestSection {
        self.ingest.clone().unwrap_or_default()
    }

    /// Warnings about plaintext secrets in the file layers.
    pub(crate) fn plaintext_secret_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let sections = [
            ("llm", self.llm.as_ref().and_then(|s| s.api_key.as_ref())),
            (
                "embedding",
                self.embedding.as_ref().and_then(|s| s.api_key.as_ref()),
            ),
            ("search", self.search.as_ref().and_then(|s| s.api_key.as_ref())),
        ];
        for (name, key) in sections {
            if key.is_some() {
                warnings.push(format!(
                    "[{}] contains a plaintext API key. \
                     Consider using an environment variable instead.",
                    name
                ));
            }
        }
        warnings
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LLM
// ─────────────────────────────────────────────────────────────────────────────

/// Chat model endpoint (OpenAI-compatible).
///
/// ```toml
/// [llm]
/// base_url = "http://localhost:11434/v1"
/// model = "qwen3-vl:8b"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// Base URL including the `/v1` suffix.
    pub base_url: String,
    /// Model name.
    pub model: String,
    /// API key; a placeholder is sent when unset.
    pub api_key: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            base_url: defaults::BASE_URL.to_string(),
            model: defaults::LLM_MODEL.to_string(),
            api_key: None,
            timeout_secs: defaults::LLM_TIMEOUT_SECS,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Embedding
// ─────────────────────────────────────────────────────────────────────────────

/// Embedding provider configuration.
///
/// ```toml
/// [embedding]
/// provider = "ollama"       # "ollama", "openai", or "mock"
/// model = "nomic-embed-text"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSection {
    /// Provider name.
    pub provider: String,
    /// Model name.
    pub model: String,
    /// Base URL; falls back to `[llm].base_url` when unset.
    pub base_url: Option<String>,
    /// API key for the "openai" provider.
    pub api_key: Option<String>,
    /// Output dimensions, if known ahead of time.
    pub dimensions: Option<usize>,
}

impl Default for EmbeddingSection {
    fn default() -> Self {
        Self {
            provider: defaults::EMBEDDING_PROVIDER.to_string(),
            model: defaults::EMBEDDING_MODEL.to_string(),
            base_url: None,
            api_key: None,
            dimensions: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Storage & Paths
// ─────────────────────────────────────────────────────────────────────────────

/// Vector store location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Directory holding the knowledge database.
    pub vector_db_path: PathBuf,
    /// Collection used for ingestion and retrieval.
    pub collection: String,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            vector_db_path: PathBuf::from(defaults::VECTOR_DB_PATH),
            collection: defaults::COLLECTION.to_string(),
        }
    }
}

/// Filesystem locations used by the agent and the ingestion job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsSection {
    /// Root directory scanned by `devmind ingest`.
    pub docs_source: PathBuf,
    /// Directory `save_solution` writes into.
    pub output_dir: PathBuf,
    /// JSONL file receiving one record per completed turn.
    pub evaluation_log: PathBuf,
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            docs_source: PathBuf::from(defaults::DOCS_SOURCE_PATH),
            output_dir: PathBuf::from(defaults::OUTPUT_DIR),
            evaluation_log: PathBuf::from(defaults::EVALUATION_LOG_FILE),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Reranker & Search
// ─────────────────────────────────────────────────────────────────────────────

/// Passage reranking.
///
/// ```toml
/// [reranker]
/// provider = "cross-encoder"   # "cross-encoder", "llm", "mock", or "none"
/// model = "cross-encoder/ms-marco-MiniLM-L-6-v2"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankerSection {
    /// "cross-encoder", "llm", "mock" or "none".
    pub provider: String,
    /// Cross-encoder repo id. The "llm" provider uses the `[llm]` model.
    pub model: String,
    /// Directory with exported cross-encoder files (`model.onnx`, `tokenizer.json`).
    pub model_dir: Option<PathBuf>,
}

impl Default for RerankerSection {
    fn default() -> Self {
        Self {
            provider: defaults::RERANKER_PROVIDER.to_string(),
            model: defaults::RERANKER_MODEL.to_string(),
            model_dir: None,
        }
    }
}

/// Web search provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    /// "duckduckgo", "brave", "serper", or "tavily".
    pub provider: String,
    /// API key for providers that need one.
    pub api_key: Option<String>,
    /// Results rendered per search.
    pub max_results: usize,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            provider: defaults::SEARCH_PROVIDER.to_string(),
            api_key: None,
            max_results: defaults::SEARCH_MAX_RESULTS,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Agent & Ingest
// ─────────────────────────────────────────────────────────────────────────────

/// Agent loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    /// Reasoning iterations per turn.
    pub max_iterations: u32,
    /// Non-system messages kept in history; `None` or `0` keeps everything.
    pub history_limit: Option<usize>,
    /// System prompt override.
    pub system_prompt: Option<String>,
}

impl AgentSection {
    /// The effective history cap.
    pub fn history_bound(&self) -> Option<usize> {
        self.history_limit.filter(|&limit| limit > 0)
    }
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_iterations: defaults::MAX_ITERATIONS,
            history_limit: Some(defaults::HISTORY_LIMIT),
            system_prompt: None,
        }
    }
}

/// Document ingestion settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSection {
    /// Characters per chunk.
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks.
    pub chunk_overlap: usize,
    /// File extensions to ingest, without the dot.
    pub extensions: Vec<String>,
}

impl Default for IngestSection {
    fn default() -> Self {
        Self {
            chunk_size: defaults::CHUNK_SIZE,
            chunk_overlap: defaults::CHUNK_OVERLAP,
            extensions: vec!["md".to_string()],
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
