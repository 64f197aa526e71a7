//! Fixed-size text chunking with overlap.
//!
//! Sizes count Unicode scalar values, never bytes.

use crate::error::{AgentError, Result};

/// Characters per chunk unless configured otherwise.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Characters shared between consecutive chunks unless configured otherwise.
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

/// Splits text into overlapping windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
}

impl TextChunker {
    /// Create a chunker. Requires `chunk_size > 0` and `overlap < chunk_size`.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(AgentError::config("chunk size must be greater than zero"));
        }
        if overlap >= chunk_size {
            return Err(AgentError::config(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                overlap, chunk_size
            )));
        }
        Ok(Self { chunk_size, overlap })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split `text` into windows of `chunk_size` characters starting every
    /// `chunk_size - overlap` characters.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }

        let chars: Vec<char> = text.chars().collect();
        if chars.len() <= self.chunk_size {
            return vec![text.to_string()];
        }

        let step = self.chunk_size - self.overlap;
        (0..chars.len())
            .step_by(step)
            .map(|start| {
                let end = (start + self.chunk_size).min(chars.len());
                chars[start..end].iter().collect()
            })
            .collect()
    }
}

impl Default for TextChunker {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_sizes() {
        assert!(TextChunker::new(0, 0).is_err());
        assert!(TextChunker::new(10, 10).is_err());
        assert!(TextChunker::new(10, 20).is_err());
        assert!(TextChunker::new(10, 9).is_ok());
    }

    #[test]
    fn test_empty_and_short_text() {
        let chunker = TextChunker::new(10, 2).unwrap();
        assert!(chunker.chunk("").is_empty());
        assert_eq!(chunker.chunk("short"), vec!["short"]);
        assert_eq!(chunker.chunk("exactly10!"), vec!["exactly10!"]);
    }

    #[test]
    fn test_overlapping_windows() {
        let chunker = TextChunker::new(4, 1).unwrap();
        assert_eq!(
            chunker.chunk("abcdefghij"),
            vec!["abcd", "defg", "ghij", "j"]
        );
    }

    #[test]
    fn test_default_sizes() {
        let chunker = TextChunker::default();
        assert_eq!((chunker.chunk_size(), chunker.overlap()), (1000, 100));

        let text = "a".repeat(2500);
        let chunks = chunker.chunk(&text);
        let lengths: Vec<_> = chunks.iter().map(|c| c.len()).collect();
        assert_eq!(lengths, vec![1000, 1000, 700]);
    }

    #[test]
    fn test_counts_characters_not_bytes() {
        let chunker = TextChunker::new(3, 1).unwrap();
        let chunks = chunker.chunk("привет");
        assert_eq!(chunks, vec!["при", "иве", "ет"]);
        assert!(chunks.iter().all(|c| c.chars().count() <= 3));
    }
}
