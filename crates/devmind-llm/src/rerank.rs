//! Relevance reranking for retrieved passages.
//!
//! A [`Reranker`] scores `(query, passage)` pairs; higher means more relevant.
//! Retrieval uses the scores to reorder nearest-neighbor candidates before
//! keeping the best few.
//!
//! # Implementations
//!
//! - [`MockReranker`]: Keyword-overlap or scripted scores for testing
//! - [`LlmReranker`]: Asks a chat model for JSON scores
//! - [`CrossEncoderReranker`]: Local ONNX cross-encoder (requires `local-rerank` feature)
//!
//! A cross-encoder that cannot be loaded falls back to [`LlmReranker`] on the
//! chat model. When no reranker can be built, [`build_reranker`] returns `None`
//! and callers keep the raw nearest-neighbor order.

use async_trait::async_trait;
use std::sync::Arc;

use crate::backend::SharedBackend;
use crate::error::{LlmError, Result};
use crate::types::{CompletionRequest, Message};

/// Default cross-encoder model.
pub const DEFAULT_RERANKER_MODEL: &str = "cross-encoder/ms-marco-MiniLM-L-6-v2";

// ─────────────────────────────────────────────────────────────────────────────
// Reranker Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for scoring passages against a query.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Score every passage against `query`.
    ///
    /// The returned vector has one score per passage, in input order.
    async fn score(&self, query: &str, passages: &[String]) -> Result<Vec<f32>>;

    /// Get the name of this reranker.
    fn name(&self) -> &str;
}

/// A reranker that can be shared across threads.
pub type SharedReranker = Arc<dyn Reranker>;

// ─────────────────────────────────────────────────────────────────────────────
// Mock Reranker
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum MockMode {
    KeywordOverlap,
    Fixed(Vec<f32>),
    Fail,
}

/// A mock reranker for testing purposes.
#[derive(Debug, Clone)]
pub struct MockReranker {
    mode: MockMode,
}

impl MockReranker {
    /// Score each passage by how many query words it contains.
    pub fn keyword_overlap() -> Self {
        Self {
            mode: MockMode::KeywordOverlap,
        }
    }

    /// Return exactly these scores regardless of input.
    pub fn with_scores(scores: Vec<f32>) -> Self {
        Self {
            mode: MockMode::Fixed(scores),
        }
    }

    /// Fail every call.
    pub fn failing() -> Self {
        Self {
            mode: MockMode::Fail,
        }
    }
}

#[async_trait]
impl Reranker for MockReranker {
    async fn score(&self, query: &str, passages: &[String]) -> Result<Vec<f32>> {
        match &self.mode {
            MockMode::KeywordOverlap => {
                let words: Vec<String> = query
                    .split_whitespace()
                    .map(|w| w.to_lowercase())
                    .collect();
                Ok(passages
                    .iter()
                    .map(|p| {
                        let lower = p.to_lowercase();
                        words.iter().filter(|w| lower.contains(w.as_str())).count() as f32
                    })
                    .collect())
            }
            MockMode::Fixed(scores) => Ok(scores.clone()),
            MockMode::Fail => Err(LlmError::Internal(
                "MockReranker: scoring failed".to_string(),
            )),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LLM Reranker
// ─────────────────────────────────────────────────────────────────────────────

/// Characters of each passage shown to the scoring model.
const LLM_PASSAGE_PREVIEW: usize = 400;

const LLM_RERANK_SYSTEM: &str = "Score how relevant each document is to the query. \
Output ONLY JSON: {\"scores\": [0.0, ...]} with one number between 0 and 1 per document, in order.";

/// Reranker that asks a chat model for relevance scores.
pub struct LlmReranker {
    backend: SharedBackend,
    model: String,
}

impl LlmReranker {
    /// Create a reranker using `model` on `backend`.
    pub fn new(backend: SharedBackend, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Reranker for LlmReranker {
    async fn score(&self, query: &str, passages: &[String]) -> Result<Vec<f32>> {
        if passages.is_empty() {
            return Ok(Vec::new());
        }

        let request = CompletionRequest::new(
            &self.model,
            vec![
                Message::system(LLM_RERANK_SYSTEM),
                Message::user(build_rerank_prompt(query, passages)),
            ],
        )
        .with_temperature(0.0);

        let response = self.backend.complete(request).await?;
        parse_scores(&response.text(), passages.len())
    }

    fn name(&self) -> &str {
        "llm"
    }
}

fn build_rerank_prompt(query: &str, passages: &[String]) -> String {
    let mut prompt = format!("Query: \"{}\"\nDocuments:\n", query);
    for (idx, passage) in passages.iter().enumerate() {
        let preview: String = passage.chars().take(LLM_PASSAGE_PREVIEW).collect();
        prompt.push_str(&format!("[{}] {}\n", idx, preview.replace('\n', " ")));
    }
    prompt.push_str("\nRespond with {\"scores\": [...]}");
    prompt
}

/// Extract `{"scores": [...]}` from a model reply.
fn parse_scores(reply: &str, expected: usize) -> Result<Vec<f32>> {
    let json_str = match (reply.find('{'), reply.rfind('}')) {
        (Some(start), Some(end)) if start < end => &reply[start..=end],
        _ => {
            return Err(LlmError::InvalidResponse(
                "reranker reply contained no JSON object".to_string(),
            ));
        }
    };

    let parsed: serde_json::Value = serde_json::from_str(json_str)?;
    let scores: Vec<f32> = parsed["scores"]
        .as_array()
        .ok_or_else(|| LlmError::InvalidResponse("reranker reply has no 'scores' array".to_string()))?
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect();

    if scores.len() != expected {
        return Err(LlmError::InvalidResponse(format!(
            "reranker returned {} scores for {} passages",
            scores.len(),
            expected
        )));
    }

    Ok(scores)
}

// ─────────────────────────────────────────────────────────────────────────────
// Cross-Encoder Reranker (ONNX Runtime)
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(feature = "local-rerank")]
pub mod cross_encoder {
    //! Local cross-encoder reranking using ONNX Runtime.
    //!
    //! This module requires the `local-rerank` feature to be enabled. The
    //! model directory must contain `model.onnx` and `tokenizer.json`, as
    //! exported from a sentence-transformers cross-encoder.

    use super::*;
    use ndarray::Array2;
    use ort::session::Session;
    use ort::session::builder::GraphOptimizationLevel;
    use ort::value::TensorRef;
    use parking_lot::Mutex;
    use std::path::Path;
    use tokenizers::{Tokenizer, TruncationParams};

    /// Longest `(query, passage)` pair the BERT-style cross-encoders accept.
    pub const MAX_SEQUENCE_LENGTH: usize = 512;

    /// Pair truncation applied at load, trimming the longer side first.
    pub fn truncation_params() -> TruncationParams {
        TruncationParams {
            max_length: MAX_SEQUENCE_LENGTH,
            ..TruncationParams::default()
        }
    }

    fn internal(context: &str, e: impl std::fmt::Display) -> LlmError {
        LlmError::Internal(format!("{}: {}", context, e))
    }

    /// Cross-encoder scoring `(query, passage)` pairs in a single batch.
    pub struct CrossEncoderReranker {
        session: Mutex<Session>,
        tokenizer: Tokenizer,
        name: String,
    }

    impl CrossEncoderReranker {
        /// Load a cross-encoder from a directory with `model.onnx` and `tokenizer.json`.
        pub fn load(model_dir: impl AsRef<Path>, name: impl Into<String>) -> Result<Self> {
            let model_path = model_dir.as_ref().join("model.onnx");
            let tokenizer_path = model_dir.as_ref().join("tokenizer.json");

            let session = Session::builder()
                .map_err(|e| internal("Failed to create ONNX session", e))?
                .with_optimization_level(GraphOptimizationLevel::Level3)
                .map_err(|e| internal("Failed to set optimization level", e))?
                .commit_from_file(&model_path)
                .map_err(|e| {
                    internal(&format!("Failed to load ONNX model from {:?}", model_path), e)
                })?;

            let mut tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|e| {
                internal(&format!("Failed to load tokenizer from {:?}", tokenizer_path), e)
            })?;
            tokenizer
                .with_truncation(Some(truncation_params()))
                .map_err(|e| internal("Failed to configure truncation", e))?;

            Ok(Self {
                session: Mutex::new(session),
                tokenizer,
                name: name.into(),
            })
        }

        fn run_batch(&self, query: &str, passages: &[String]) -> Result<Vec<f32>> {
            let encodings = passages
                .iter()
                .map(|p| {
                    self.tokenizer
                        .encode((query, p.as_str()), true)
                        .map_err(|e| internal("Tokenization failed", e))
                })
                .collect::<Result<Vec<_>>>()?;

            let batch_size = encodings.len();
            let max_len = encodings
                .iter()
                .map(|e| e.get_ids().len())
                .max()
                .unwrap_or(0);

            // Zero-padded (batch_size, max_len) inputs
            let mut input_ids = vec![0i64; batch_size * max_len];
            let mut attention_mask = vec![0i64; batch_size * max_len];
            let mut token_type_ids = vec![0i64; batch_size * max_len];

            for (i, enc) in encodings.iter().enumerate() {
                let offset = i * max_len;
                for (j, ((id, mask), ty)) in enc
                    .get_ids()
                    .iter()
                    .zip(enc.get_attention_mask())
                    .zip(enc.get_type_ids())
                    .enumerate()
                {
                    input_ids[offset + j] = *id as i64;
                    attention_mask[offset + j] = *mask as i64;
                    token_type_ids[offset + j] = *ty as i64;
                }
            }

            let shape = (batch_size, max_len);
            let input_ids = Array2::from_shape_vec(shape, input_ids)
                .map_err(|e| internal("Array error", e))?;
            let attention_mask = Array2::from_shape_vec(shape, attention_mask)
                .map_err(|e| internal("Array error", e))?;
            let token_type_ids = Array2::from_shape_vec(shape, token_type_ids)
                .map_err(|e| internal("Array error", e))?;

            let mut session = self.session.lock();
            let outputs = session
                .run(ort::inputs![
                    "input_ids" => TensorRef::from_array_view(&input_ids).map_err(|e| internal("Input error", e))?,
                    "attention_mask" => TensorRef::from_array_view(&attention_mask).map_err(|e| internal("Input error", e))?,
                    "token_type_ids" => TensorRef::from_array_view(&token_type_ids).map_err(|e| internal("Input error", e))?,
                ])
                .map_err(|e| internal("ONNX inference failed", e))?;

            // Logits are (batch_size, 1) for single-label cross-encoders
            let (_, logits) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| internal("Output extraction failed", e))?;

            if logits.len() < batch_size {
                return Err(LlmError::InvalidResponse(format!(
                    "cross-encoder produced {} logits for {} pairs",
                    logits.len(),
                    batch_size
                )));
            }
            let per_row = logits.len() / batch_size;
            Ok((0..batch_size).map(|i| logits[i * per_row]).collect())
        }
    }

    #[async_trait]
    impl Reranker for CrossEncoderReranker {
        async fn score(&self, query: &str, passages: &[String]) -> Result<Vec<f32>> {
            if passages.is_empty() {
                return Ok(Vec::new());
            }
            self.run_batch(query, passages)
        }

        fn name(&self) -> &str {
            &self.name
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Reranker Factory
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for building a reranker from application config.
#[derive(Debug, Clone)]
pub struct RerankerSpec {
    /// Provider name: "cross-encoder", "llm", "mock", or "none".
    pub provider: String,
    /// Cross-encoder repo id.
    pub model: String,
    /// Chat model used by the "llm" provider and the cross-encoder fallback.
    pub chat_model: String,
    /// Directory holding the exported cross-encoder files.
    pub model_dir: Option<std::path::PathBuf>,
}

/// Build a reranker, or `None` when it is disabled or cannot be loaded.
///
/// A cross-encoder load failure falls back to the LLM reranker when a backend
/// is given. Other failures are logged and degrade retrieval to raw vector
/// order.
pub fn build_reranker(spec: &RerankerSpec, backend: Option<SharedBackend>) -> Option<SharedReranker> {
    match spec.provider.as_str() {
        "none" | "" => {
            tracing::info!("Reranking disabled");
            None
        }
        "mock" => Some(Arc::new(MockReranker::keyword_overlap())),
        "llm" => llm_reranker(spec, backend),
        "cross-encoder" => load_cross_encoder(spec).or_else(|| {
            tracing::warn!(chat_model = %spec.chat_model, "Using the chat model for reranking");
            llm_reranker(spec, backend)
        }),
        other => {
            tracing::warn!(provider = other, "Unknown reranker provider; reranking disabled");
            None
        }
    }
}

fn llm_reranker(spec: &RerankerSpec, backend: Option<SharedBackend>) -> Option<SharedReranker> {
    match backend {
        Some(backend) => Some(Arc::new(LlmReranker::new(backend, &spec.chat_model))),
        None => {
            tracing::warn!("LLM reranker requested without a backend; reranking disabled");
            None
        }
    }
}

#[cfg(feature = "local-rerank")]
fn load_cross_encoder(spec: &RerankerSpec) -> Option<SharedReranker> {
    let dir = spec
        .model_dir
        .clone()
        .or_else(|| default_model_dir(&spec.model))?;
    if !dir.join("model.onnx").is_file() {
        tracing::warn!(model = %spec.model, dir = %dir.display(), "Reranker model not installed");
        return None;
    }

    tracing::info!(model = %spec.model, dir = %dir.display(), "Loading reranker model");
    match cross_encoder::CrossEncoderReranker::load(&dir, &spec.model) {
        Ok(reranker) => {
            tracing::info!("Reranker loaded successfully");
            Some(Arc::new(reranker))
        }
        Err(e) => {
            tracing::error!(error = %e, "Error loading reranker");
            None
        }
    }
}

#[cfg(not(feature = "local-rerank"))]
fn load_cross_encoder(spec: &RerankerSpec) -> Option<SharedReranker> {
    tracing::warn!(
        model = %spec.model,
        "Cross-encoder reranking requested but the 'local-rerank' feature is not enabled"
    );
    None
}

/// Default directory for an exported cross-encoder model.
pub fn default_model_dir(model: &str) -> Option<std::path::PathBuf> {
    let leaf = model.rsplit('/').next().unwrap_or(model);
    dirs::data_dir().map(|d| d.join("devmind").join("models").join(leaf))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
