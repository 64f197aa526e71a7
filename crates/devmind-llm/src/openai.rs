//! OpenAI-compatible API backend implementation.
//!
//! This module provides `OpenAiBackend`, which talks to any service exposing
//! `POST {base_url}/chat/completions` (Ollama's `/v1` endpoint, OpenAI,
//! vLLM, LM Studio, ...). Requests are sent once; failures are surfaced to the
//! caller without retrying.

use async_trait::async_trait;
use reqwest::{Client, Response, header};
use std::sync::Arc;
use std::time::Duration;

use crate::backend::{LlmBackend, SharedBackend};
use crate::error::{LlmError, ResponseValidationError, Result};
use crate::types::{CompletionRequest, CompletionResponse, Message, ToolCall, ToolChoice};

/// Default base URL, Ollama's OpenAI-compatible endpoint.
pub const DEFAULT_OLLAMA_BASE: &str = "http://localhost:11434/v1";

/// Default timeout for requests. Local inference can be slow.
const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Placeholder key sent when none is configured; Ollama ignores it.
const PLACEHOLDER_API_KEY: &str = "ollama";

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for the OpenAI-compatible backend.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// API key for authentication (optional for local services like Ollama).
    pub api_key: Option<String>,

    /// Base URL for the API, including the `/v1` suffix.
    pub base_url: String,

    /// Model to use when the request leaves it empty.
    pub model: Option<String>,

    /// Request timeout.
    pub timeout: Duration,

    /// Name for this backend instance.
    pub name: String,
}

impl OpenAiConfig {
    /// Create a config for a local Ollama server.
    pub fn ollama() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_OLLAMA_BASE.to_string(),
            model: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            name: "ollama".to_string(),
        }
    }

    /// Set a custom base URL. A trailing slash is dropped.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the default model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the backend name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self::ollama()
    }
}

/// Strip the OpenAI-compatibility suffix to reach Ollama's native API.
pub fn native_base_url(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    trimmed.strip_suffix("/v1").unwrap_or(trimmed).to_string()
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend
// ─────────────────────────────────────────────────────────────────────────────

/// OpenAI-compatible API backend.
pub struct OpenAiBackend {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiBackend {
    /// Create a new OpenAI-compatible backend with the given configuration.
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Build the chat completions endpoint URL.
    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url)
    }

    /// Add authentication headers to a request.
    fn add_headers(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .unwrap_or(PLACEHOLDER_API_KEY);
        builder
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {}", api_key))
    }

    /// Convert our CompletionRequest to the wire format.
    fn to_openai_request(&self, request: &CompletionRequest) -> OpenAiChatRequest {
        let model = if request.model.is_empty() {
            self.config.model.clone().unwrap_or_default()
        } else {
            request.model.clone()
        };

        let messages = request.messages.iter().map(OpenAiMessage::from).collect();

        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(
                request
                    .tools
                    .iter()
                    .map(|t| OpenAiTool {
                        tool_type: "function".to_string(),
                        function: OpenAiFunction {
                            name: t.name.clone(),
                            description: Some(t.description.clone()),
                            parameters: t.parameters.clone(),
                        },
                    })
                    .collect(),
            )
        };

        OpenAiChatRequest {
            model,
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stream: false,
            tool_choice: tools.as_ref().and(request.tool_choice),
            tools,
        }
    }

    /// Handle a response, successful or not.
    async fn handle_response(response: Response) -> Result<CompletionResponse> {
        if !response.status().is_success() {
            return Err(Self::handle_error_response(response).await);
        }

        let body = response.text().await?;
        let parsed: OpenAiChatResponse =
            serde_json::from_str(&body).map_err(|e| LlmError::Serialization(e.to_string()))?;

        let response = CompletionResponse::try_from(parsed)?;
        response.validate()?;
        Ok(response)
    }

    /// Handle an error response.
    async fn handle_error_response(response: Response) -> LlmError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        let message = serde_json::from_str::<OpenAiErrorResponse>(&body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| format!("HTTP {}: {}", status, body));

        match status.as_u16() {
            401 | 403 => LlmError::Auth(format!("Authentication failed: {}", message)),
            404 => LlmError::Backend(format!("Not found: {}", message)),
            429 => LlmError::RateLimit(message),
            500..=599 => LlmError::Backend(format!("Server error: {}", message)),
            _ => LlmError::Backend(message),
        }
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let openai_request = self.to_openai_request(&request);

        tracing::debug!(
            backend = %self.config.name,
            model = %openai_request.model,
            messages = openai_request.messages.len(),
            tools = openai_request.tools.as_ref().map(|t| t.len()).unwrap_or(0),
            "Sending chat completion request"
        );

        let response = self
            .add_headers(self.client.post(self.completions_url()))
            .json(&openai_request)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    fn name(&self) -> &str {
        &self.config.name
    }
}

/// Create a shared OpenAI-compatible backend.
pub fn create_shared_backend(config: OpenAiConfig) -> Result<SharedBackend> {
    Ok(Arc::new(OpenAiBackend::new(config)?))
}

// ─────────────────────────────────────────────────────────────────────────────
// OpenAI API Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, serde::Serialize)]
struct OpenAiChatRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
}

#[derive(Debug, serde::Serialize)]
struct OpenAiMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

impl From<&Message> for OpenAiMessage {
    fn from(message: &Message) -> Self {
        let blank = |role| OpenAiMessage {
            role,
            content: None,
            tool_calls: None,
            tool_call_id: None,
            name: None,
        };

        match message {
            Message::System { content } => OpenAiMessage {
                content: Some(content.clone()),
                ..blank("system")
            },
            Message::User { content } => OpenAiMessage {
                content: Some(content.clone()),
                ..blank("user")
            },
            Message::Assistant {
                content,
                tool_calls,
            } => OpenAiMessage {
                content: content.clone(),
                tool_calls: (!tool_calls.is_empty())
                    .then(|| tool_calls.iter().map(OpenAiToolCall::from).collect()),
                ..blank("assistant")
            },
            Message::Tool {
                tool_call_id,
                name,
                content,
            } => OpenAiMessage {
                content: Some(content.clone()),
                tool_call_id: Some(tool_call_id.clone()),
                name: Some(name.clone()),
                ..blank("tool")
            },
        }
    }
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct OpenAiTool {
    #[serde(rename = "type")]
    tool_type: String,
    function: OpenAiFunction,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct OpenAiFunction {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    parameters: serde_json::Value,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct OpenAiToolCall {
    #[serde(default)]
    id: String,
    #[serde(rename = "type", default = "default_call_type")]
    call_type: String,
    function: OpenAiFunctionCall,
}

fn default_call_type() -> String {
    "function".to_string()
}

impl From<&ToolCall> for OpenAiToolCall {
    fn from(call: &ToolCall) -> Self {
        Self {
            id: call.id.clone(),
            call_type: default_call_type(),
            function: OpenAiFunctionCall {
                name: call.name.clone(),
                arguments: serde_json::Value::String(call.arguments.clone()),
            },
        }
    }
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct OpenAiFunctionCall {
    name: String,
    /// A JSON-encoded string per the API, though some local servers send an
    /// object here instead.
    #[serde(default)]
    arguments: serde_json::Value,
}

impl OpenAiFunctionCall {
    fn arguments_string(&self) -> String {
        match &self.arguments {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, serde::Deserialize)]
struct OpenAiChatResponse {
    #[serde(default)]
    id: String,
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    model: String,
}

impl TryFrom<OpenAiChatResponse> for CompletionResponse {
    type Error = LlmError;

    fn try_from(resp: OpenAiChatResponse) -> Result<Self> {
        let choice = resp.choices.into_iter().next().ok_or_else(|| {
            LlmError::from(ResponseValidationError::MissingField("choices"))
        })?;

        let tool_calls: Vec<ToolCall> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(i, tc)| {
                let arguments = tc.function.arguments_string();
                let id = if tc.id.is_empty() {
                    format!("call_{}", i)
                } else {
                    tc.id
                };
                ToolCall::new(id, tc.function.name, arguments)
            })
            .collect();

        Ok(CompletionResponse {
            id: resp.id,
            model: resp.model,
            content: choice.message.content,
            tool_calls,
        })
    }
}

#[derive(Debug, serde::Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Debug, serde::Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[derive(Debug, serde::Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiError,
}

#[derive(Debug, serde::Deserialize)]
struct OpenAiError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToolDefinition;

    #[test]
    fn test_ollama_config() {
        let config = OpenAiConfig::ollama();
        assert!(config.api_key.is_none());
        assert_eq!(config.base_url, DEFAULT_OLLAMA_BASE);
        assert_eq!(config.name, "ollama");
        assert_eq!(config.timeout, Duration::from_secs(600));
    }

    #[test]
    fn test_config_builder() {
        let config = OpenAiConfig::ollama()
            .with_base_url("http://gpu-box:11434/v1/")
            .with_model("qwen3-vl:8b")
            .with_api_key("secret")
            .with_name("remote")
            .with_timeout(Duration::from_secs(60));

        assert_eq!(config.base_url, "http://gpu-box:11434/v1");
        assert_eq!(config.model.as_deref(), Some("qwen3-vl:8b"));
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.name, "remote");
        assert_eq!(config.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_native_base_url() {
        assert_eq!(
            native_base_url("http://localhost:11434/v1"),
            "http://localhost:11434"
        );
        assert_eq!(
            native_base_url("http://localhost:11434/v1/"),
            "http://localhost:11434"
        );
        assert_eq!(
            native_base_url("http://localhost:11434"),
            "http://localhost:11434"
        );
    }

    #[test]
    fn test_completions_url() {
        let backend = OpenAiBackend::new(OpenAiConfig::ollama()).unwrap();
        assert_eq!(
            backend.completions_url(),
            "http://localhost:11434/v1/chat/completions"
        );
        assert_eq!(backend.name(), "ollama");
    }

    #[test]
    fn test_openai_response_conversion() {
        let openai_resp = OpenAiChatResponse {
            id: "chatcmpl-123".to_string(),
            choices: vec![OpenAiChoice {
                message: OpenAiResponseMessage {
                    content: Some("Hello!".to_string()),
                    tool_calls: None,
                },
            }],
            model: "qwen3-vl:8b".to_string(),
        };

        let response = CompletionResponse::try_from(openai_resp).unwrap();
        assert_eq!(response.id, "chatcmpl-123");
        assert_eq!(response.text(), "Hello!");
        assert!(!response.has_tool_calls());
    }

    #[test]
    fn test_openai_response_with_tool_calls() {
        let body = r#"{
            "id": "chatcmpl-456",
            "model": "qwen3-vl:8b",
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [
                        {"id": "call_a", "type": "function",
                         "function": {"name": "retrieve_knowledge", "arguments": "{\"query\":\"ingest\"}"}},
                        {"type": "function",
                         "function": {"name": "create_plan", "arguments": {"steps": ["a"]}}}
                    ]
                },
                "finish_reason": "tool_calls"
            }]
        }"#;
        let parsed: OpenAiChatResponse = serde_json::from_str(body).unwrap();
        let response = CompletionResponse::try_from(parsed).unwrap();

        assert!(response.has_tool_calls());
        assert_eq!(response.tool_calls[0].name, "retrieve_knowledge");
        assert_eq!(response.tool_calls[0].arguments, r#"{"query":"ingest"}"#);
        // Missing id gets a positional one; object arguments are re-encoded.
        assert_eq!(response.tool_calls[1].id, "call_1");
        assert_eq!(response.tool_calls[1].arguments, r#"{"steps":["a"]}"#);
    }

    #[test]
    fn test_response_without_choices_is_rejected() {
        let parsed: OpenAiChatResponse =
            serde_json::from_str(r#"{"id":"x","model":"m","choices":[]}"#).unwrap();
        let err = CompletionResponse::try_from(parsed).unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse(_)));
    }

    #[test]
    fn test_to_openai_request() {
        let backend =
            OpenAiBackend::new(OpenAiConfig::ollama().with_model("qwen3-vl:8b")).unwrap();

        let request = CompletionRequest::new(
            "",
            vec![
                Message::system("You are DevMind."),
                Message::user("Hello"),
                Message::assistant_tool_calls(
                    None,
                    vec![ToolCall::new("call_1", "web_search", r#"{"query":"rust"}"#)],
                ),
                Message::tool("call_1", "web_search", "results"),
            ],
        )
        .with_tools(vec![ToolDefinition::new(
            "web_search",
            "Search the web",
            serde_json::json!({"type": "object"}),
        )])
        .with_tool_choice(ToolChoice::Auto);

        let openai_req = backend.to_openai_request(&request);
        // Empty request model falls back to the configured one
        assert_eq!(openai_req.model, "qwen3-vl:8b");
        assert_eq!(openai_req.messages.len(), 4);

        let json = serde_json::to_value(&openai_req).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][2]["role"], "assistant");
        assert_eq!(
            json["messages"][2]["tool_calls"][0]["function"]["arguments"],
            r#"{"query":"rust"}"#
        );
        assert_eq!(json["messages"][3]["tool_call_id"], "call_1");
        assert_eq!(json["tools"][0]["type"], "function");
        assert_eq!(json["tool_choice"], "auto");
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn test_tool_choice_omitted_without_tools() {
        let backend = OpenAiBackend::new(OpenAiConfig::ollama()).unwrap();
        let request = CompletionRequest::new("m", vec![Message::user("hi")])
            .with_tool_choice(ToolChoice::Auto);

        let json = serde_json::to_value(backend.to_openai_request(&request)).unwrap();
        assert!(json.get("tools").is_none());
        assert!(json.get("tool_choice").is_none());
    }
}
