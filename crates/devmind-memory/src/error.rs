//! Error types for the memory crate.

use thiserror::Error;

/// Errors that can occur in the memory crate.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Database connection or operation failed.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem error while preparing the store location.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid query or parameters.
    #[error("Query error: {0}")]
    Query(String),

    /// Invalid data or state.
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Result type alias for memory operations.
pub type Result<T> = std::result::Result<T, MemoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MemoryError::InvalidData("expected 768 dimensions, got 3".to_string());
        assert_eq!(err.to_string(), "Invalid data: expected 768 dimensions, got 3");

        let err: MemoryError = rusqlite::Error::InvalidQuery.into();
        assert!(err.to_string().starts_with("Database error"));
    }
}
