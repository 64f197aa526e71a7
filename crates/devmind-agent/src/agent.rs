//! Agent orchestration loop.
//!
//! An [`Agent`] owns one conversation. Each call to [`Agent::turn`] appends the
//! user's message and alternates between the model and the tool registry until
//! the model answers without requesting tools, the iteration budget runs out,
//! the model call fails, or the turn is cancelled.

use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use devmind_llm::{CompletionRequest, LlmBackend, Message, SharedBackend, ToolChoice};

use crate::error::{AgentError, Result};
use crate::history::ConversationHistory;
use crate::tool::{ToolName, ToolRegistry};
use crate::tracker::EvaluationTracker;
use crate::types::{
    AgentConfig, AgentEvent, CANCELLED_MESSAGE, EventSender, MAX_STEPS_MESSAGE, SessionId,
    TurnOutcome, TurnStatus,
};

// ─────────────────────────────────────────────────────────────────────────────
// Agent
// ─────────────────────────────────────────────────────────────────────────────

/// The core agent that orchestrates LLM calls and tool execution.
pub struct Agent {
    /// LLM backend for completions.
    backend: SharedBackend,
    /// The agent's tools.
    tools: ToolRegistry,
    /// Agent configuration.
    config: AgentConfig,
    /// Conversation so far, system prompt first.
    history: ConversationHistory,
    /// Identifies this conversation in logs.
    session_id: SessionId,
    /// Receives completed turns for evaluation.
    tracker: Option<Arc<EvaluationTracker>>,
    /// Receives tool lifecycle events.
    events: Option<EventSender>,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("backend", &self.backend.name())
            .field("tools", &self.tools)
            .field("config", &self.config)
            .field("session_id", &self.session_id)
            .field("history_len", &self.history.len())
            .field("tracker", &self.tracker.as_ref().map(|t| t.path().to_path_buf()))
            .finish()
    }
}

impl Agent {
    /// Create a new agent with the given backend and tools.
    pub fn new(backend: SharedBackend, tools: ToolRegistry, config: AgentConfig) -> Self {
        let history = ConversationHistory::new(config.system_prompt.clone());
        Self {
            backend,
            tools,
            config,
            history,
            session_id: SessionId::new(),
            tracker: None,
            events: None,
        }
    }

    /// Create an agent builder for fluent construction.
    pub fn builder() -> AgentBuilder {
        AgentBuilder::new()
    }

    /// Get the agent configuration.
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Get the tool registry.
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// The conversation so far.
    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    /// Identifier of the current conversation.
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Start a fresh conversation, keeping only the system prompt.
    pub fn reset(&mut self) {
        self.history.reset();
        self.session_id = SessionId::new();
        tracing::info!(session_id = %self.session_id, "Conversation reset");
    }

    /// Subscribe to tool lifecycle events, replacing any previous subscriber.
    pub fn set_event_sender(&mut self, events: Option<EventSender>) {
        self.events = events;
    }

    /// Answer `query`, returning the text shown to the user.
    ///
    /// Failures come back as error strings rather than `Err`.
    pub async fn run(&mut self, query: &str) -> String {
        self.turn(query, &CancellationToken::new()).await.answer
    }

    /// Execute a single turn of conversation.
    ///
    /// Cancellation is checked before every model call; a cancelled turn
    /// leaves history consistent (every tool call has its result).
    pub async fn turn(&mut self, query: &str, cancel: &CancellationToken) -> TurnOutcome {
        let session_id = self.session_id;

        if let Some(limit) = self.config.history_limit {
            let removed = self.history.enforce_limit(limit);
            if removed > 0 {
                tracing::debug!(%session_id, removed, limit, "History trimmed");
            }
        }
        self.history.push(Message::user(query));

        tracing::info!(
            %session_id,
            message_len = query.len(),
            history_len = self.history.len(),
            "Turn started"
        );

        let mut contexts: Vec<String> = Vec::new();
        let mut tool_calls = 0usize;
        let mut iterations = 0u32;

        while iterations < self.config.max_iterations {
            if cancel.is_cancelled() {
                tracing::info!(%session_id, iterations, "Turn cancelled");
                return self.outcome(CANCELLED_MESSAGE, TurnStatus::Cancelled, iterations, tool_calls, contexts);
            }
            iterations += 1;

            let request = self.build_request();
            tracing::debug!(
                %session_id,
                iteration = iterations,
                messages = request.messages.len(),
                model = %request.model,
                "Calling LLM"
            );

            let response = match self.backend.complete(request).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::error!(%session_id, iteration = iterations, error = %e, "LLM call failed");
                    return self.outcome(
                        format!("Error during agent execution: {}", e),
                        TurnStatus::LlmError,
                        iterations,
                        tool_calls,
                        contexts,
                    );
                }
            };

            if !response.has_tool_calls() {
                let answer = response.text();
                self.history.push(Message::assistant(answer.clone()));

                if let Some(tracker) = &self.tracker {
                    tracker.log_turn(query, &answer, &contexts).await;
                }

                tracing::info!(
                    %session_id,
                    iterations,
                    tool_calls,
                    contexts = contexts.len(),
                    response_len = answer.len(),
                    "Turn completed"
                );
                return self.outcome(answer, TurnStatus::Completed, iterations, tool_calls, contexts);
            }

            tracing::info!(
                %session_id,
                iteration = iterations,
                tool_count = response.tool_calls.len(),
                tools = %response.tool_calls.iter().map(|t| t.name.as_str()).collect::<Vec<_>>().join(", "),
                "Executing tools"
            );

            self.history.push(response.to_message());

            for call in &response.tool_calls {
                let args = parse_arguments(&call.name, &call.arguments);
                self.emit(AgentEvent::ToolStart {
                    name: call.name.clone(),
                    args: args.clone(),
                });

                let result = self.tools.dispatch(&call.name, args).await.into_content();
                tool_calls += 1;

                self.emit(AgentEvent::ToolEnd {
                    name: call.name.clone(),
                    result: result.clone(),
                });

                if ToolName::from_name(&call.name).is_some_and(|t| t.feeds_context()) {
                    contexts.push(result.clone());
                }
                self.history
                    .push(Message::tool(call.id.clone(), call.name.clone(), result));
            }
        }

        tracing::warn!(%session_id, iterations, "Max iterations exceeded");
        self.outcome(MAX_STEPS_MESSAGE, TurnStatus::MaxIterations, iterations, tool_calls, contexts)
    }

    fn build_request(&self) -> CompletionRequest {
        let mut request = CompletionRequest::new(&self.config.model, self.history.messages().to_vec())
            .with_tools(self.tools.definitions())
            .with_tool_choice(ToolChoice::Auto);
        if let Some(temperature) = self.config.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(max_tokens) = self.config.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }
        request
    }

    fn emit(&self, event: AgentEvent) {
        if let Some(events) = &self.events {
            // A dropped receiver only means nobody is watching
            let _ = events.send(event);
        }
    }

    fn outcome(
        &self,
        answer: impl Into<String>,
        status: TurnStatus,
        iterations: u32,
        tool_calls: usize,
        contexts: Vec<String>,
    ) -> TurnOutcome {
        TurnOutcome {
            answer: answer.into(),
            status,
            iterations,
            tool_calls,
            contexts,
        }
    }
}

/// Decode tool arguments, falling back to an empty object.
fn parse_arguments(tool: &str, raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ Value::Object(_)) => value,
        Ok(_) | Err(_) => {
            if !raw.trim().is_empty() {
                tracing::warn!(%tool, arguments = %raw, "Malformed tool arguments, using empty object");
            }
            Value::Object(serde_json::Map::new())
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Agent Builder
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for constructing an Agent with fluent API.
#[derive(Default)]
pub struct AgentBuilder {
    backend: Option<SharedBackend>,
    tools: Option<ToolRegistry>,
    config: AgentConfig,
    tracker: Option<Arc<EvaluationTracker>>,
    events: Option<EventSender>,
}

impl AgentBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the LLM backend.
    pub fn with_backend(mut self, backend: impl LlmBackend + 'static) -> Self {
        self.backend = Some(Arc::new(backend));
        self
    }

    /// Set the LLM backend from a shared reference.
    pub fn with_shared_backend(mut self, backend: SharedBackend) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set the tool registry.
    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Replace the whole configuration.
    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    /// Set the system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = prompt.into();
        self
    }

    /// Set max iterations.
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    /// Set the history cap.
    pub fn with_history_limit(mut self, limit: Option<usize>) -> Self {
        self.config.history_limit = limit;
        self
    }

    /// Log completed turns to `tracker`.
    pub fn with_tracker(mut self, tracker: Arc<EvaluationTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Send tool lifecycle events to `events`.
    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    /// Build the agent.
    pub fn build(self) -> Result<Agent> {
        let backend = self
            .backend
            .ok_or_else(|| AgentError::Config("LLM backend is required".to_string()))?;
        let tools = self
            .tools
            .ok_or_else(|| AgentError::Config("Tool registry is required".to_string()))?;
        if self.config.max_iterations == 0 {
            return Err(AgentError::config("max_iterations must be at least 1"));
        }

        let mut agent = Agent::new(backend, tools, self.config);
        agent.tracker = self.tracker;
        agent.events = self.events;
        Ok(agent)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
