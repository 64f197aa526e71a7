//! Agent core for DevMind.
//!
//! This crate provides the reasoning loop, the tool set, knowledge ingestion
//! and evaluation logging behind DevMind's answers.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Agent                                                      │
//! │  - Owns the conversation history                            │
//! │  - Runs the bounded model / tool loop                       │
//! │  - Logs completed turns to the evaluation tracker           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!              ┌───────────────┼────────────────┐
//!              ▼               ▼                ▼
//!       ┌────────────┐  ┌──────────────┐  ┌───────────────────┐
//!       │ LlmBackend │  │ ToolRegistry │  │ EvaluationTracker │
//!       │(devmind-llm)│ │              │  │                   │
//!       └────────────┘  └──────────────┘  └───────────────────┘
//!                              │
//!                              ▼
//!                  retrieve_knowledge (devmind-memory)
//!                  web_search · save_solution · create_plan
//! ```
//!
//! # Core Components
//!
//! - [`Agent`]: conversation owner and turn loop
//! - [`ToolRegistry`]: closed set of tools, dispatched by [`ToolCall`] variant
//! - [`EvaluationTracker`]: JSONL log of completed turns
//! - [`Ingestor`]: loads a documentation tree into the vector store
//! - [`RagJudge`]: scores logged turns on RAG quality metrics

pub mod agent;
pub mod chunker;
pub mod error;
pub mod evaluation;
pub mod history;
pub mod ingest;
pub mod prompt;
pub mod tool;
pub mod tools;
pub mod tracker;
pub mod types;

// Re-export core types
pub use error::{AgentError, Result};
pub use types::{
    AgentConfig, AgentEvent, CANCELLED_MESSAGE, DEFAULT_MAX_ITERATIONS, EventSender,
    MAX_STEPS_MESSAGE, SessionId, TurnOutcome, TurnStatus,
};

// Re-export agent
pub use agent::{Agent, AgentBuilder};
pub use history::ConversationHistory;
pub use prompt::DEFAULT_SYSTEM_PROMPT;

// Re-export tool types
pub use tool::{
    CreatePlanParams, KnowledgeParams, ParamExt, ParamResult, ParameterValidationError,
    SaveSolutionParams, ToolCall, ToolCallError, ToolName, ToolRegistry, ToolResult,
    WebSearchParams,
};
pub use tools::{
    CreatePlanTool, HttpSearcher, KnowledgeTool, SaveSolutionTool, SearchProvider, SearchResult,
    SharedSearcher, StaticSearcher, WebSearchTool, WebSearcher,
};

// Re-export ingestion and evaluation
pub use chunker::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, TextChunker};
pub use ingest::{FileOutcome, IngestProgress, IngestReport, Ingestor};
pub use evaluation::{EvaluationReport, Metric, RagJudge, RecordScores, average_precision};
pub use tracker::{EvaluationRecord, EvaluationSummary, EvaluationTracker, read_records};

pub use tokio_util::sync::CancellationToken;
