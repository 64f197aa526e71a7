//! Evaluation dataset logging.
//!
//! Every completed turn is appended to a JSONL file as a
//! `{question, answer, contexts, ground_truth, timestamp}` record, the shape
//! RAG evaluation frameworks consume. `ground_truth` is always written empty
//! and filled in offline by whoever curates the dataset.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AgentError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Record
// ─────────────────────────────────────────────────────────────────────────────

/// One evaluated turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub question: String,
    pub answer: String,
    /// Passages returned by context-feeding tools, in call order.
    pub contexts: Vec<String>,
    #[serde(default)]
    pub ground_truth: String,
    /// ISO-8601 time the record was written.
    pub timestamp: String,
}

impl EvaluationRecord {
    /// Build a record stamped with the current time.
    pub fn new(question: impl Into<String>, answer: impl Into<String>, contexts: Vec<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            contexts,
            ground_truth: String::new(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tracker
// ─────────────────────────────────────────────────────────────────────────────

/// Append-only JSONL writer for evaluation records.
///
/// Appends are serialized so concurrent turns never interleave lines.
#[derive(Debug)]
pub struct EvaluationTracker {
    path: PathBuf,
    lock: Mutex<()>,
}

impl EvaluationTracker {
    /// Create a tracker writing to `path`. Parent directories are created lazily.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Log file location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record a completed turn. Failures are logged and swallowed.
    pub async fn log_turn(&self, question: &str, answer: &str, contexts: &[String]) {
        let record = EvaluationRecord::new(question, answer, contexts.to_vec());
        if let Err(e) = self.append(&record).await {
            tracing::error!(path = %self.path.display(), error = %e, "Error logging to Ragas dataset");
        }
    }

    /// Append one record as a single line.
    pub async fn append(&self, record: &EvaluationRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.lock.lock().await;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        tracing::debug!(
            path = %self.path.display(),
            contexts = record.contexts.len(),
            "Evaluation record written"
        );
        Ok(())
    }
}

/// Load every record from an evaluation log. Blank lines are ignored.
pub fn read_records(path: impl AsRef<Path>) -> Result<Vec<EvaluationRecord>> {
    let path = path.as_ref();
    let file = fs::File::open(path)?;

    let mut records = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|e| {
            AgentError::internal(format!("{}:{}: {}", path.display(), index + 1, e))
        })?;
        records.push(record);
    }
    Ok(records)
}

// ─────────────────────────────────────────────────────────────────────────────
// Summary
// ─────────────────────────────────────────────────────────────────────────────

/// Aggregate statistics over an evaluation log.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvaluationSummary {
    pub records: usize,
    /// Records with at least one context passage.
    pub with_contexts: usize,
    pub total_contexts: usize,
    /// Records whose `ground_truth` has been filled in.
    pub with_ground_truth: usize,
    pub first_timestamp: Option<String>,
    pub last_timestamp: Option<String>,
}

impl EvaluationSummary {
    /// Summarize `records`.
    pub fn from_records(records: &[EvaluationRecord]) -> Self {
        let mut summary = Self {
            records: records.len(),
            ..Self::default()
        };

        for record in records {
            if !record.contexts.is_empty() {
                summary.with_contexts += 1;
            }
            summary.total_contexts += record.contexts.len();
            if !record.ground_truth.is_empty() {
                summary.with_ground_truth += 1;
            }
        }

        summary.first_timestamp = records.iter().map(|r| r.timestamp.clone()).min();
        summary.last_timestamp = records.iter().map(|r| r.timestamp.clone()).max();
        summary
    }

    /// Mean number of contexts per record.
    pub fn average_contexts(&self) -> f64 {
        if self.records == 0 {
            0.0
        } else {
            self.total_contexts as f64 / self.records as f64
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
