//! Embeddings support for knowledge retrieval.
//!
//! This module provides the [`Embedder`] trait and implementations for
//! generating vector embeddings from text. Embeddings are used both when
//! ingesting documentation chunks and when embedding a query at retrieval time,
//! so the same embedder must serve both sides.
//!
//! # Implementations
//!
//! - [`MockEmbedder`]: Returns deterministic embeddings for testing
//! - [`OllamaEmbedder`]: Uses Ollama's native `/api/embeddings` endpoint
//! - [`OpenAiEmbedder`]: Uses an OpenAI-compatible `/embeddings` endpoint

use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{LlmError, Result};

/// Default embedding model served by Ollama.
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";

/// Output size of `nomic-embed-text`.
const NOMIC_DIMENSIONS: usize = 768;

// ─────────────────────────────────────────────────────────────────────────────
// Embedder Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for generating text embeddings.
///
/// Embedders convert text into dense vector representations that capture
/// semantic meaning, enabling similarity search and retrieval.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts in a batch.
    ///
    /// Default implementation calls `embed` for each text sequentially.
    /// Implementations may override for more efficient batching.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Get the dimensionality of embeddings produced by this embedder.
    fn dimensions(&self) -> usize;

    /// Get the name of this embedder.
    fn name(&self) -> &str;
}

/// A shared embedder that can be used across threads.
pub type SharedEmbedder = Arc<dyn Embedder>;

// ─────────────────────────────────────────────────────────────────────────────
// Mock Embedder
// ─────────────────────────────────────────────────────────────────────────────

/// A mock embedder for testing purposes.
///
/// Generates deterministic embeddings based on text content, useful for
/// testing similarity search and ingestion without a model server. It can be
/// told to fail for texts containing a marker, to exercise error paths.
#[derive(Debug, Clone)]
pub struct MockEmbedder {
    dimensions: usize,
    fail_on: Option<String>,
}

impl MockEmbedder {
    /// Create a new mock embedder with the specified dimensions.
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            fail_on: None,
        }
    }

    /// Fail every `embed` call whose text contains `marker`.
    ///
    /// An empty marker makes every call fail.
    pub fn with_failure_on(mut self, marker: impl Into<String>) -> Self {
        self.fail_on = Some(marker.into());
        self
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(marker) = &self.fail_on
            && text.contains(marker.as_str())
        {
            return Err(LlmError::Backend(format!(
                "MockEmbedder: refusing to embed text containing '{}'",
                marker
            )));
        }

        // Same text always produces the same embedding
        let mut state = simple_hash(text);
        let mut embedding = vec![0.0f32; self.dimensions];
        for value in embedding.iter_mut() {
            state = state.wrapping_mul(1103515245).wrapping_add(12345);
            *value = ((state >> 16) as u16 as f32 / 32768.0) - 1.0;
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut embedding {
                *x /= norm;
            }
        }

        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Simple hash function for deterministic embedding generation.
fn simple_hash(s: &str) -> u64 {
    let mut hash: u64 = 5381;
    for byte in s.bytes() {
        hash = hash.wrapping_mul(33).wrapping_add(byte as u64);
    }
    hash
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP Embedders
// ─────────────────────────────────────────────────────────────────────────────

/// Where and how to reach an HTTP embedding service.
#[derive(Debug, Clone)]
pub struct EmbeddingEndpoint {
    /// Base URL. Ollama's native API takes it without `/v1`, OpenAI-compatible
    /// servers with it.
    pub base_url: String,
    pub model: String,
    /// Bearer token, sent only when set.
    pub api_key: Option<String>,
    /// Output size reported by [`Embedder::dimensions`].
    pub dimensions: usize,
    pub timeout: Duration,
}

impl EmbeddingEndpoint {
    /// `nomic-embed-text` at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            api_key: None,
            dimensions: NOMIC_DIMENSIONS,
            timeout: Duration::from_secs(60),
        }
    }

    fn from_spec(base_url: &str, spec: &EmbedderSpec) -> Self {
        let mut endpoint = Self::new(base_url);
        endpoint.model = spec.model.clone();
        endpoint.api_key = spec.api_key.clone().filter(|k| !k.is_empty());
        if let Some(dims) = spec.dimensions {
            endpoint.dimensions = dims;
        }
        endpoint
    }

    fn client(&self) -> Result<Client> {
        Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| LlmError::Internal(format!("Failed to create HTTP client: {}", e)))
    }

    /// POST `body` to `{base_url}{path}` and decode the JSON reply.
    async fn post<B, R>(&self, client: &Client, path: &str, body: &B) -> Result<R>
    where
        B: serde::Serialize + ?Sized,
        R: serde::de::DeserializeOwned,
    {
        let mut request = client.post(format!("{}{}", self.base_url, path)).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Backend(format!(
                "Embedding request failed: HTTP {} - {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| LlmError::Serialization(format!("Failed to parse embedding reply: {}", e)))
    }
}

/// Ollama's native `POST {base}/api/embeddings` with `{model, prompt}`.
///
/// The endpoint takes one text per call, so batches are sequential.
pub struct OllamaEmbedder {
    client: Client,
    endpoint: EmbeddingEndpoint,
}

impl OllamaEmbedder {
    pub fn new(endpoint: EmbeddingEndpoint) -> Result<Self> {
        Ok(Self {
            client: endpoint.client()?,
            endpoint,
        })
    }
}

#[derive(Debug, serde::Serialize)]
struct OllamaEmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, serde::Deserialize)]
struct OllamaEmbeddingResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = OllamaEmbeddingRequest {
            model: &self.endpoint.model,
            prompt: text,
        };
        let reply: OllamaEmbeddingResponse = self
            .endpoint
            .post(&self.client, "/api/embeddings", &request)
            .await?;

        if reply.embedding.is_empty() {
            return Err(LlmError::InvalidResponse(format!(
                "model '{}' returned an empty embedding",
                self.endpoint.model
            )));
        }
        Ok(reply.embedding)
    }

    fn dimensions(&self) -> usize {
        self.endpoint.dimensions
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

/// OpenAI-compatible `POST {base}/embeddings`, one request per batch.
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: EmbeddingEndpoint,
}

impl OpenAiEmbedder {
    pub fn new(endpoint: EmbeddingEndpoint) -> Result<Self> {
        Ok(Self {
            client: endpoint.client()?,
            endpoint,
        })
    }
}

#[derive(Debug, serde::Serialize)]
struct BatchEmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Debug, serde::Deserialize)]
struct BatchEmbeddingResponse {
    data: Vec<IndexedEmbedding>,
}

#[derive(Debug, serde::Deserialize)]
struct IndexedEmbedding {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])
            .await?
            .pop()
            .ok_or_else(|| LlmError::InvalidResponse("No embedding returned".to_string()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let request = BatchEmbeddingRequest {
            model: &self.endpoint.model,
            input: texts,
        };
        let mut reply: BatchEmbeddingResponse = self
            .endpoint
            .post(&self.client, "/embeddings", &request)
            .await?;

        // Servers may answer out of order
        reply.data.sort_by_key(|e| e.index);
        Ok(reply.data.into_iter().map(|e| e.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.endpoint.dimensions
    }

    fn name(&self) -> &str {
        "openai"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Embedder Factory
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for building an embedder from application config.
///
/// A provider-agnostic struct the CLI populates from its configuration, so
/// this crate does not depend on `devmind-config`.
#[derive(Debug, Clone)]
pub struct EmbedderSpec {
    /// Provider name: "ollama", "openai", or "mock".
    pub provider: String,
    /// Model name.
    pub model: String,
    /// OpenAI-compatible base URL (with `/v1`).
    pub base_url: String,
    /// API key for the "openai" provider.
    pub api_key: Option<String>,
    /// Expected dimensions, if known.
    pub dimensions: Option<usize>,
}

/// Build a `SharedEmbedder` from a spec.
pub fn build_embedder(spec: &EmbedderSpec) -> Result<SharedEmbedder> {
    match spec.provider.as_str() {
        "ollama" => {
            let native = crate::openai::native_base_url(&spec.base_url);
            Ok(Arc::new(OllamaEmbedder::new(EmbeddingEndpoint::from_spec(
                &native, spec,
            ))?))
        }
        "openai" => Ok(Arc::new(OpenAiEmbedder::new(EmbeddingEndpoint::from_spec(
            &spec.base_url,
            spec,
        ))?)),
        "mock" => Ok(Arc::new(MockEmbedder::new(spec.dimensions.unwrap_or(64)))),
        other => Err(LlmError::Config(format!(
            "Unknown embedding provider '{}'. Valid: ollama, openai, mock",
            other
        ))),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
