//! Core types for the agent crate.
//!
//! - [`SessionId`]: identifies one conversation
//! - [`AgentConfig`]: runtime configuration
//! - [`AgentEvent`]: tool lifecycle notifications
//! - [`TurnOutcome`]: result of one turn

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::prompt::DEFAULT_SYSTEM_PROMPT;

/// Reasoning iterations per turn unless configured otherwise.
pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// Answer returned when the iteration budget runs out.
pub const MAX_STEPS_MESSAGE: &str = "Error: Maximum steps exceeded.";

/// Answer returned when a turn is cancelled between iterations.
pub const CANCELLED_MESSAGE: &str = "Error: Turn cancelled.";

// ─────────────────────────────────────────────────────────────────────────────
// ID Types
// ─────────────────────────────────────────────────────────────────────────────

/// Unique identifier for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Create a new random session ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Agent Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for agent behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Model to use for completions.
    pub model: String,
    /// Maximum LLM calls per turn.
    pub max_iterations: u32,
    /// Cap on non-system history messages, enforced at turn start.
    pub history_limit: Option<usize>,
    /// System prompt.
    pub system_prompt: String,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Completion token limit.
    pub max_tokens: Option<u32>,
}

impl AgentConfig {
    /// Create a new config with the given model.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            history_limit: None,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            temperature: None,
            max_tokens: None,
        }
    }

    /// Set max iterations.
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the history cap.
    pub fn with_history_limit(mut self, limit: Option<usize>) -> Self {
        self.history_limit = limit;
        self
    }

    /// Set system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Set temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set max tokens.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::new("qwen3-vl:8b")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

/// Tool lifecycle notification sent to front-ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// A tool is about to run.
    ToolStart {
        name: String,
        args: serde_json::Value,
    },
    /// A tool finished; `result` is exactly what goes into history.
    ToolEnd { name: String, result: String },
}

/// Sender half of an event channel.
pub type EventSender = tokio::sync::mpsc::UnboundedSender<AgentEvent>;

// ─────────────────────────────────────────────────────────────────────────────
// Turn Outcome
// ─────────────────────────────────────────────────────────────────────────────

/// How a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    /// The model produced a final answer.
    Completed,
    /// The iteration budget ran out.
    MaxIterations,
    /// The model call failed.
    LlmError,
    /// The turn was cancelled between iterations.
    Cancelled,
}

/// Result of one turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnOutcome {
    /// Text shown to the user (final answer or error message).
    pub answer: String,
    /// How the turn ended.
    pub status: TurnStatus,
    /// LLM calls made.
    pub iterations: u32,
    /// Tool calls executed.
    pub tool_calls: usize,
    /// Retrieved and searched passages gathered during the turn.
    pub contexts: Vec<String>,
}

impl TurnOutcome {
    /// Whether the turn produced a real answer.
    pub fn is_completed(&self) -> bool {
        self.status == TurnStatus::Completed
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id() {
        let id1 = SessionId::new();
        let id2 = SessionId::new();
        assert_ne!(id1, id2);
        assert_eq!(id1.to_string(), id1.as_uuid().to_string());
    }

    #[test]
    fn test_agent_config() {
        let config = AgentConfig::new("llama3.1")
            .with_max_iterations(4)
            .with_history_limit(Some(50))
            .with_temperature(0.2)
            .with_max_tokens(2048)
            .with_system_prompt("You are terse.");

        assert_eq!(config.model, "llama3.1");
        assert_eq!(config.max_iterations, 4);
        assert_eq!(config.history_limit, Some(50));
        assert_eq!(config.temperature, Some(0.2));
        assert_eq!(config.max_tokens, Some(2048));
        assert_eq!(config.system_prompt, "You are terse.");
    }

    #[test]
    fn test_agent_config_default() {
        let config = AgentConfig::default();
        assert_eq!(config.max_iterations, 10);
        assert!(config.history_limit.is_none());
        assert!(config.system_prompt.starts_with("You are DevMind"));
    }

    #[test]
    fn test_event_serialization() {
        let event = AgentEvent::ToolStart {
            name: "web_search".to_string(),
            args: serde_json::json!({"query": "rust async"}),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "tool_start");
        assert_eq!(json["name"], "web_search");
        assert_eq!(json["args"]["query"], "rust async");
    }
}
