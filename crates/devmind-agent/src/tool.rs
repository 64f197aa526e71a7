//! Tool framework for agent capabilities.
//!
//! The agent exposes a fixed set of tools. A model-issued call is parsed into
//! the closed [`ToolCall`] enum, one variant per tool carrying its validated
//! parameters, and [`ToolRegistry::dispatch`] matches on it exhaustively. Tool
//! definitions sent to the model are generated from [`ToolName::ALL`], so the
//! advertised schema and the dispatcher cannot drift apart.
//!
//! # Example
//!
//! ```rust,ignore
//! use devmind_agent::{ToolRegistry, ToolResult};
//!
//! let result = registry
//!     .dispatch("create_plan", serde_json::json!({"steps": ["Read docs", "Write code"]}))
//!     .await;
//! assert_eq!(result.content(), "Plan created with 2 steps:\n1. Read docs\n2. Write code");
//! ```

use serde::{Deserialize, Serialize};

use devmind_llm::ToolDefinition;

use crate::error::AgentError;
use crate::tools::{CreatePlanTool, KnowledgeTool, SaveSolutionTool, WebSearchTool};

// ─────────────────────────────────────────────────────────────────────────────
// Parameter Validation
// ─────────────────────────────────────────────────────────────────────────────

/// Error type for tool parameter validation failures.
///
/// Provides detailed error messages that help the LLM understand what went wrong
/// and how to fix it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParameterValidationError {
    /// A parameter has an invalid type.
    #[error("invalid type for '{name}': expected {expected}, got {actual}")]
    InvalidType {
        /// The parameter name.
        name: &'static str,
        /// The expected type.
        expected: &'static str,
        /// The actual type found.
        actual: String,
    },

    /// The arguments were not a JSON object.
    #[error("arguments must be a JSON object, got {actual}")]
    NotAnObject {
        /// The actual type found.
        actual: String,
    },
}

impl ParameterValidationError {
    /// Create an invalid type error.
    pub fn invalid_type(
        name: &'static str,
        expected: &'static str,
        actual: impl Into<String>,
    ) -> Self {
        Self::InvalidType {
            name,
            expected,
            actual: actual.into(),
        }
    }
}

impl From<ParameterValidationError> for AgentError {
    fn from(err: ParameterValidationError) -> Self {
        AgentError::Tool(err.to_string())
    }
}

/// Result type for parameter validation.
pub type ParamResult<T> = std::result::Result<T, ParameterValidationError>;

/// Helper trait for extracting parameters from JSON arguments.
pub trait ParamExt {
    /// Get a string parameter; a missing or null value is the empty string.
    fn str_or_empty(&self, name: &'static str) -> ParamResult<String>;

    /// Get an array parameter, or `None` when absent or not an array.
    fn optional_array(&self, name: &str) -> Option<&Vec<serde_json::Value>>;
}

impl ParamExt for serde_json::Value {
    fn str_or_empty(&self, name: &'static str) -> ParamResult<String> {
        match self.get(name) {
            None | Some(serde_json::Value::Null) => Ok(String::new()),
            Some(serde_json::Value::String(s)) => Ok(s.clone()),
            Some(other) => Err(ParameterValidationError::invalid_type(
                name,
                "string",
                json_type_name(other),
            )),
        }
    }

    fn optional_array(&self, name: &str) -> Option<&Vec<serde_json::Value>> {
        self.get(name).and_then(|v| v.as_array())
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

fn ensure_object(params: &serde_json::Value) -> ParamResult<()> {
    if params.is_object() {
        Ok(())
    } else {
        Err(ParameterValidationError::NotAnObject {
            actual: json_type_name(params).to_string(),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Typed Parameter Structs
// ─────────────────────────────────────────────────────────────────────────────

/// Validated parameters for `retrieve_knowledge`.
#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeParams {
    /// The search query.
    pub query: String,
}

impl TryFrom<serde_json::Value> for KnowledgeParams {
    type Error = ParameterValidationError;

    fn try_from(params: serde_json::Value) -> std::result::Result<Self, Self::Error> {
        ensure_object(&params)?;
        Ok(Self {
            query: params.str_or_empty("query")?,
        })
    }
}

/// Validated parameters for `web_search`.
#[derive(Debug, Clone, PartialEq)]
pub struct WebSearchParams {
    /// The search query.
    pub query: String,
}

impl TryFrom<serde_json::Value> for WebSearchParams {
    type Error = ParameterValidationError;

    fn try_from(params: serde_json::Value) -> std::result::Result<Self, Self::Error> {
        ensure_object(&params)?;
        Ok(Self {
            query: params.str_or_empty("query")?,
        })
    }
}

/// Validated parameters for `save_solution`.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveSolutionParams {
    /// Requested file name; reduced to its base name before writing.
    pub filename: String,
    /// Content to write.
    pub content: String,
}

impl TryFrom<serde_json::Value> for SaveSolutionParams {
    type Error = ParameterValidationError;

    fn try_from(params: serde_json::Value) -> std::result::Result<Self, Self::Error> {
        ensure_object(&params)?;
        Ok(Self {
            filename: params.str_or_empty("filename")?,
            content: params.str_or_empty("content")?,
        })
    }
}

/// Validated parameters for `create_plan`.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatePlanParams {
    /// Plan steps in order.
    pub steps: Vec<String>,
}

impl TryFrom<serde_json::Value> for CreatePlanParams {
    type Error = ParameterValidationError;

    /// A missing or non-array `steps` is an empty plan; non-string entries are skipped.
    fn try_from(params: serde_json::Value) -> std::result::Result<Self, Self::Error> {
        let steps = params
            .optional_array("steps")
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        Ok(Self { steps })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Names & Calls
// ─────────────────────────────────────────────────────────────────────────────

/// The tools the agent can call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    RetrieveKnowledge,
    WebSearch,
    SaveSolution,
    CreatePlan,
}

impl ToolName {
    /// Every tool, in the order advertised to the model.
    pub const ALL: [ToolName; 4] = [
        ToolName::RetrieveKnowledge,
        ToolName::WebSearch,
        ToolName::SaveSolution,
        ToolName::CreatePlan,
    ];

    /// Wire name of the tool.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RetrieveKnowledge => KnowledgeTool::NAME,
            Self::WebSearch => WebSearchTool::NAME,
            Self::SaveSolution => SaveSolutionTool::NAME,
            Self::CreatePlan => CreatePlanTool::NAME,
        }
    }

    /// Look up a tool by wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }

    /// Whether this tool's output is recorded as grounding context for evaluation.
    pub fn feeds_context(&self) -> bool {
        match self {
            Self::RetrieveKnowledge | Self::WebSearch => true,
            Self::SaveSolution | Self::CreatePlan => false,
        }
    }

    /// Natural-language description shown to the model.
    pub fn description(&self) -> &'static str {
        match self {
            Self::RetrieveKnowledge => KnowledgeTool::DESCRIPTION,
            Self::WebSearch => WebSearchTool::DESCRIPTION,
            Self::SaveSolution => SaveSolutionTool::DESCRIPTION,
            Self::CreatePlan => CreatePlanTool::DESCRIPTION,
        }
    }

    /// JSON Schema of the tool's arguments.
    pub fn parameters(&self) -> serde_json::Value {
        match self {
            Self::RetrieveKnowledge => KnowledgeTool::parameters(),
            Self::WebSearch => WebSearchTool::parameters(),
            Self::SaveSolution => SaveSolutionTool::parameters(),
            Self::CreatePlan => CreatePlanTool::parameters(),
        }
    }

    /// Definition sent to the model.
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.as_str(), self.description(), self.parameters())
    }
}

impl std::fmt::Display for ToolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a raw call could not be turned into a [`ToolCall`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ToolCallError {
    /// No tool has this name.
    #[error("Unknown tool {0}")]
    Unknown(String),

    /// The arguments did not validate.
    #[error("invalid arguments for {tool}: {source}")]
    InvalidParams {
        tool: ToolName,
        #[source]
        source: ParameterValidationError,
    },
}

/// A validated tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    RetrieveKnowledge(KnowledgeParams),
    WebSearch(WebSearchParams),
    SaveSolution(SaveSolutionParams),
    CreatePlan(CreatePlanParams),
}

impl ToolCall {
    /// Parse a call from its wire name and arguments.
    pub fn parse(name: &str, args: serde_json::Value) -> std::result::Result<Self, ToolCallError> {
        let tool = ToolName::from_name(name).ok_or_else(|| ToolCallError::Unknown(name.to_string()))?;
        let invalid = |source| ToolCallError::InvalidParams { tool, source };

        Ok(match tool {
            ToolName::RetrieveKnowledge => Self::RetrieveKnowledge(args.try_into().map_err(invalid)?),
            ToolName::WebSearch => Self::WebSearch(args.try_into().map_err(invalid)?),
            ToolName::SaveSolution => Self::SaveSolution(args.try_into().map_err(invalid)?),
            ToolName::CreatePlan => Self::CreatePlan(args.try_into().map_err(invalid)?),
        })
    }

    /// The tool this call targets.
    pub fn tool(&self) -> ToolName {
        match self {
            Self::RetrieveKnowledge(_) => ToolName::RetrieveKnowledge,
            Self::WebSearch(_) => ToolName::WebSearch,
            Self::SaveSolution(_) => ToolName::SaveSolution,
            Self::CreatePlan(_) => ToolName::CreatePlan,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Result
// ─────────────────────────────────────────────────────────────────────────────

/// Result of a tool execution.
///
/// Both variants carry the exact text handed back to the model; errors are
/// ordinary tool output the model can reason about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolResult {
    /// Successful text output.
    Text {
        /// The text content.
        content: String,
    },
    /// Tool execution failed.
    Error {
        /// Error message.
        message: String,
    },
}

impl ToolResult {
    /// Create a text result.
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
        }
    }

    /// Create an error result.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Check if this result is an error.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Check if this result is successful.
    pub fn is_success(&self) -> bool {
        !self.is_error()
    }

    /// The text handed back to the model.
    pub fn content(&self) -> &str {
        match self {
            Self::Text { content } => content,
            Self::Error { message } => message,
        }
    }

    /// Consume the result, returning its text.
    pub fn into_content(self) -> String {
        match self {
            Self::Text { content } => content,
            Self::Error { message } => message,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Registry
// ─────────────────────────────────────────────────────────────────────────────

/// The agent's tools, dispatched by [`ToolCall`] variant.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    knowledge: KnowledgeTool,
    web: WebSearchTool,
    files: SaveSolutionTool,
    plan: CreatePlanTool,
}

impl ToolRegistry {
    /// Assemble a registry from its tools.
    pub fn new(knowledge: KnowledgeTool, web: WebSearchTool, files: SaveSolutionTool) -> Self {
        Self {
            knowledge,
            web,
            files,
            plan: CreatePlanTool,
        }
    }

    /// Definitions for every tool, in advertised order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        ToolName::ALL.iter().map(ToolName::definition).collect()
    }

    /// Wire names of every tool.
    pub fn names(&self) -> Vec<&'static str> {
        ToolName::ALL.iter().map(ToolName::as_str).collect()
    }

    /// Run a validated call.
    pub async fn execute(&self, call: ToolCall) -> crate::error::Result<ToolResult> {
        match call {
            ToolCall::RetrieveKnowledge(params) => self.knowledge.execute(params).await,
            ToolCall::WebSearch(params) => self.web.execute(params).await,
            ToolCall::SaveSolution(params) => self.files.execute(params).await,
            ToolCall::CreatePlan(params) => self.plan.execute(params),
        }
    }

    /// Parse and run a raw call. Always yields a result string.
    ///
    /// Unknown names become `Error: Unknown tool {name}`; invalid arguments and
    /// tool faults become `Error executing tool {name}: {error}`.
    pub async fn dispatch(&self, name: &str, args: serde_json::Value) -> ToolResult {
        let call = match ToolCall::parse(name, args) {
            Ok(call) => call,
            Err(ToolCallError::Unknown(name)) => {
                tracing::warn!(tool = %name, "Unknown tool requested");
                return ToolResult::error(format!("Error: Unknown tool {}", name));
            }
            Err(ToolCallError::InvalidParams { tool, source }) => {
                tracing::warn!(%tool, error = %source, "Tool parameters rejected");
                return ToolResult::error(format!("Error executing tool {}: {}", tool, source));
            }
        };

        let tool = call.tool();
        match self.execute(call).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(%tool, error = %e, "Tool execution failed");
                ToolResult::error(format!("Error executing tool {}: {}", tool, e))
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
