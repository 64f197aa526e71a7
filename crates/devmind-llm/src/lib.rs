//! LLM client abstraction for DevMind.
//!
//! This crate provides the model-facing pieces of the agent: chat completion
//! with native tool calling, text embeddings, and passage reranking.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────┐  ┌──────────────┐  ┌──────────────┐
//! │  LlmBackend trait        │  │ Embedder     │  │ Reranker     │
//! │  - complete() -> Response│  │ - embed()    │  │ - score()    │
//! └──────────────────────────┘  └──────────────┘  └──────────────┘
//!            │                     │        │        │        │
//!            ▼                     ▼        ▼        ▼        ▼
//!   OpenAI-compatible          Ollama   OpenAI   Cross-    LLM
//!   (Ollama /v1, ...)          native   compat   encoder   scored
//! ```

pub mod backend;
pub mod embeddings;
pub mod error;
pub mod openai;
pub mod rerank;
pub mod types;

pub use backend::{LlmBackend, MockBackend, MockResponse, SharedBackend};
pub use error::{LlmError, ResponseValidationError, Result};
pub use types::{
    CompletionRequest, CompletionResponse, Message, Role, ToolCall, ToolChoice, ToolDefinition,
};

pub use embeddings::{
    Embedder, EmbedderSpec, EmbeddingEndpoint, MockEmbedder, OllamaEmbedder, OpenAiEmbedder,
    SharedEmbedder, build_embedder,
};
pub use openai::{OpenAiBackend, OpenAiConfig, create_shared_backend, native_base_url};
pub use rerank::{
    LlmReranker, MockReranker, Reranker, RerankerSpec, SharedReranker, build_reranker,
};

#[cfg(feature = "local-rerank")]
pub use rerank::cross_encoder::CrossEncoderReranker;
