//! Errors raised by the chat, embedding and reranking clients.

use thiserror::Error;

/// Result type alias using the LLM error type.
pub type Result<T> = std::result::Result<T, LlmError>;

/// Error type for LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The provider rejected the request or failed on its side.
    #[error("Backend error: {0}")]
    Backend(String),

    /// The provider could not be reached.
    #[error("Network error: {0}")]
    Network(String),

    /// Unusable client settings (unknown provider, bad header value).
    #[error("Configuration error: {0}")]
    Config(String),

    /// A request or response body failed to (de)serialize.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The provider answered with something we could not use.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// HTTP 429 from the provider.
    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    /// HTTP 401 or 403 from the provider.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Local failure, e.g. loading or running the reranker model.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A chat completion that did not have the expected shape.
#[derive(Debug, Clone, Error)]
pub enum ResponseValidationError {
    #[error("missing required field '{0}' in response")]
    MissingField(&'static str),

    #[error("invalid tool call '{id}': {reason}")]
    InvalidToolCall { id: String, reason: String },
}

impl ResponseValidationError {
    pub fn invalid_tool_call(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidToolCall {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

impl From<ResponseValidationError> for LlmError {
    fn from(err: ResponseValidationError) -> Self {
        LlmError::InvalidResponse(err.to_string())
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            "Request timed out: "
        } else if err.is_connect() {
            "Connection failed: "
        } else {
            ""
        };
        LlmError::Network(format!("{}{}", kind, err))
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LlmError::Backend("model not found".to_string());
        assert_eq!(err.to_string(), "Backend error: model not found");

        let err = LlmError::RateLimit("slow down".to_string());
        assert_eq!(err.to_string(), "Rate limit exceeded: slow down");
    }

    #[test]
    fn test_validation_error_into_llm_error() {
        let err: LlmError = ResponseValidationError::MissingField("choices").into();
        assert!(matches!(err, LlmError::InvalidResponse(_)));
        assert!(err.to_string().contains("'choices'"));

        let err: LlmError =
            ResponseValidationError::invalid_tool_call("call_1", "empty function name").into();
        assert_eq!(
            err.to_string(),
            "Invalid response: invalid tool call 'call_1': empty function name"
        );
    }

    #[test]
    fn test_json_error_is_serialization() {
        let err: LlmError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert!(matches!(err, LlmError::Serialization(_)));
    }
}
