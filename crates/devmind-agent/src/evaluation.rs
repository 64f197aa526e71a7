//! LLM-judged scoring of the evaluation log.
//!
//! Each logged turn is scored on three RAG metrics, each in `[0, 1]`:
//!
//! - **context precision**: the model marks every retrieved passage as useful
//!   or not for answering the question; the score is the average precision of
//!   those verdicts in retrieval order, so useful passages ranked early score
//!   higher.
//! - **faithfulness**: the model counts the answer's factual claims and how
//!   many of them the passages support; the score is `supported / total`.
//! - **answer relevancy**: the model rates how directly the answer addresses
//!   the question.
//!
//! Turns without contexts get no context precision or faithfulness score. A
//! metric whose judge call fails or returns unusable JSON is left empty for
//! that record and excluded from the means.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use devmind_llm::{CompletionRequest, Message, SharedBackend};

use crate::error::{AgentError, Result};
use crate::tracker::EvaluationRecord;

/// Characters of each context passage shown to the judge.
const CONTEXT_PREVIEW: usize = 1500;

// ─────────────────────────────────────────────────────────────────────────────
// Metrics
// ─────────────────────────────────────────────────────────────────────────────

/// A scored RAG metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    ContextPrecision,
    Faithfulness,
    AnswerRelevancy,
}

impl Metric {
    /// Every metric, in report column order.
    pub const ALL: [Metric; 3] = [
        Metric::ContextPrecision,
        Metric::Faithfulness,
        Metric::AnswerRelevancy,
    ];

    /// Column name used in reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContextPrecision => "context_precision",
            Self::Faithfulness => "faithfulness",
            Self::AnswerRelevancy => "answer_relevancy",
        }
    }

    fn needs_contexts(&self) -> bool {
        !matches!(self, Self::AnswerRelevancy)
    }

    fn instructions(&self) -> &'static str {
        match self {
            Self::ContextPrecision => {
                "You judge retrieval quality. For each numbered context, decide whether it \
                 was useful for answering the question. Output ONLY JSON: \
                 {\"verdicts\": [1, 0, ...]} with one 1 (useful) or 0 (not useful) per \
                 context, in order."
            }
            Self::Faithfulness => {
                "You judge answer faithfulness. Break the answer into its factual claims, \
                 then count how many can be inferred from the contexts. Output ONLY JSON: \
                 {\"claims\": <total claims>, \"supported\": <supported claims>}."
            }
            Self::AnswerRelevancy => {
                "You judge answer relevancy. Rate how directly and completely the answer \
                 addresses the question, ignoring whether it is correct. Output ONLY JSON: \
                 {\"score\": <number between 0 and 1>}."
            }
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Scores
// ─────────────────────────────────────────────────────────────────────────────

/// Metric scores for one logged turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordScores {
    pub question: String,
    pub answer: String,
    pub context_count: usize,
    pub context_precision: Option<f64>,
    pub faithfulness: Option<f64>,
    pub answer_relevancy: Option<f64>,
}

impl RecordScores {
    /// The score for `metric`, if it was computed.
    pub fn get(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::ContextPrecision => self.context_precision,
            Metric::Faithfulness => self.faithfulness,
            Metric::AnswerRelevancy => self.answer_relevancy,
        }
    }

    fn set(&mut self, metric: Metric, score: Option<f64>) {
        match metric {
            Metric::ContextPrecision => self.context_precision = score,
            Metric::Faithfulness => self.faithfulness = score,
            Metric::AnswerRelevancy => self.answer_relevancy = score,
        }
    }
}

/// Per-record scores plus their means.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub rows: Vec<RecordScores>,
}

impl EvaluationReport {
    /// Mean of `metric` over the records that have it.
    pub fn mean(&self, metric: Metric) -> Option<f64> {
        let scores: Vec<f64> = self.rows.iter().filter_map(|r| r.get(metric)).collect();
        if scores.is_empty() {
            None
        } else {
            Some(scores.iter().sum::<f64>() / scores.len() as f64)
        }
    }

    /// Number of records scored on `metric`.
    pub fn scored(&self, metric: Metric) -> usize {
        self.rows.iter().filter(|r| r.get(metric).is_some()).count()
    }

    /// Write one CSV row per record. Missing scores are empty cells.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut writer = csv::Writer::from_path(path)?;
        for row in &self.rows {
            writer.serialize(row)?;
        }
        writer.flush()?;

        tracing::info!(path = %path.display(), rows = self.rows.len(), "Evaluation report written");
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Judge
// ─────────────────────────────────────────────────────────────────────────────

/// Scores evaluation records with a chat model.
pub struct RagJudge {
    backend: SharedBackend,
    model: String,
}

impl std::fmt::Debug for RagJudge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagJudge")
            .field("backend", &self.backend.name())
            .field("model", &self.model)
            .finish()
    }
}

impl RagJudge {
    /// Judge with `model` on `backend`.
    pub fn new(backend: SharedBackend, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
        }
    }

    /// Score every record, calling `progress` after each one.
    pub async fn evaluate<F>(&self, records: &[EvaluationRecord], mut progress: F) -> EvaluationReport
    where
        F: FnMut(usize, &RecordScores),
    {
        let mut rows = Vec::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            let scores = self.score_record(record).await;
            progress(i + 1, &scores);
            rows.push(scores);
        }
        EvaluationReport { rows }
    }

    /// Score a single record on every metric.
    pub async fn score_record(&self, record: &EvaluationRecord) -> RecordScores {
        let mut scores = RecordScores {
            question: record.question.clone(),
            answer: record.answer.clone(),
            context_count: record.contexts.len(),
            context_precision: None,
            faithfulness: None,
            answer_relevancy: None,
        };

        for metric in Metric::ALL {
            if metric.needs_contexts() && record.contexts.is_empty() {
                continue;
            }
            match self.score(metric, record).await {
                Ok(score) => scores.set(metric, Some(score)),
                Err(e) => {
                    tracing::warn!(%metric, question = %record.question, error = %e, "Judge call failed");
                }
            }
        }
        scores
    }

    async fn score(&self, metric: Metric, record: &EvaluationRecord) -> Result<f64> {
        let request = CompletionRequest::new(
            &self.model,
            vec![
                Message::system(metric.instructions()),
                Message::user(judge_prompt(metric, record)),
            ],
        )
        .with_temperature(0.0);

        let reply = self.backend.complete(request).await?.text();
        let json = extract_json(&reply)?;

        match metric {
            Metric::ContextPrecision => {
                let verdicts = verdicts(&json, record.contexts.len())?;
                Ok(average_precision(&verdicts))
            }
            Metric::Faithfulness => {
                let claims = number(&json, "claims")?;
                let supported = number(&json, "supported")?;
                if claims <= 0.0 {
                    return Err(AgentError::internal("judge found no claims in the answer"));
                }
                Ok((supported / claims).clamp(0.0, 1.0))
            }
            Metric::AnswerRelevancy => Ok(number(&json, "score")?.clamp(0.0, 1.0)),
        }
    }
}

fn judge_prompt(metric: Metric, record: &EvaluationRecord) -> String {
    let mut prompt = format!("Question: {}\n", record.question);
    if metric.needs_contexts() {
        prompt.push_str("Contexts:\n");
        for (i, context) in record.contexts.iter().enumerate() {
            let preview: String = context.chars().take(CONTEXT_PREVIEW).collect();
            prompt.push_str(&format!("[{}] {}\n", i + 1, preview));
        }
    }
    prompt.push_str(&format!("Answer: {}\n", record.answer));
    prompt
}

/// The outermost `{...}` in a model reply.
fn extract_json(reply: &str) -> Result<Value> {
    match (reply.find('{'), reply.rfind('}')) {
        (Some(start), Some(end)) if start < end => Ok(serde_json::from_str(&reply[start..=end])?),
        _ => Err(AgentError::internal("judge reply contained no JSON object")),
    }
}

fn number(json: &Value, field: &str) -> Result<f64> {
    json[field]
        .as_f64()
        .ok_or_else(|| AgentError::internal(format!("judge reply has no numeric '{}'", field)))
}

fn verdicts(json: &Value, expected: usize) -> Result<Vec<bool>> {
    let verdicts: Vec<bool> = json["verdicts"]
        .as_array()
        .ok_or_else(|| AgentError::internal("judge reply has no 'verdicts' array"))?
        .iter()
        .map(|v| v.as_f64().map(|n| n >= 0.5).or_else(|| v.as_bool()).unwrap_or(false))
        .collect();

    if verdicts.len() != expected {
        return Err(AgentError::internal(format!(
            "judge returned {} verdicts for {} contexts",
            verdicts.len(),
            expected
        )));
    }
    Ok(verdicts)
}

/// Average precision of relevance verdicts in rank order; 0 when none is relevant.
pub fn average_precision(verdicts: &[bool]) -> f64 {
    let mut relevant = 0usize;
    let mut total = 0.0;
    for (k, &useful) in verdicts.iter().enumerate() {
        if useful {
            relevant += 1;
            total += relevant as f64 / (k + 1) as f64;
        }
    }
    if relevant == 0 { 0.0 } else { total / relevant as f64 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devmind_llm::{CompletionResponse, LlmError, MockBackend, MockResponse};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn reply(text: &str) -> MockResponse {
        CompletionResponse::text_response("judge", "mock-model", text).into()
    }

    fn record(question: &str, contexts: &[&str]) -> EvaluationRecord {
        EvaluationRecord::new(
            question,
            "DevMind is a developer assistant.",
            contexts.iter().map(|c| c.to_string()).collect(),
        )
    }

    fn assert_close(actual: Option<f64>, expected: f64) {
        let actual = actual.unwrap();
        assert!((actual - expected).abs() < 1e-9, "{} != {}", actual, expected);
    }

    #[test]
    fn test_average_precision() {
        assert_eq!(average_precision(&[]), 0.0);
        assert_eq!(average_precision(&[false, false]), 0.0);
        assert_eq!(average_precision(&[true, true]), 1.0);
        // (1/1 + 2/3) / 2
        assert!((average_precision(&[true, false, true]) - 5.0 / 6.0).abs() < 1e-9);
        // Relevant passage ranked last scores lower than ranked first
        assert!(average_precision(&[false, true]) < average_precision(&[true, false]));
    }

    #[tokio::test]
    async fn test_scores_all_metrics() {
        let backend = Arc::new(MockBackend::with_results(vec![
            reply(r#"{"verdicts": [1, 0, 1]}"#),
            reply(r#"Here you go: {"claims": 4, "supported": 3}"#),
            reply(r#"{"score": 0.9}"#),
        ]));
        let judge = RagJudge::new(backend.clone(), "qwen3-vl:8b");

        let scores = judge
            .score_record(&record("What is DevMind?", &["a", "b", "c"]))
            .await;

        assert_close(scores.context_precision, 5.0 / 6.0);
        assert_close(scores.faithfulness, 0.75);
        assert_close(scores.answer_relevancy, 0.9);
        assert_eq!(scores.context_count, 3);

        let requests = backend.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].model, "qwen3-vl:8b");
        assert_eq!(requests[0].temperature, Some(0.0));
        let prompt = requests[0].messages[1].text().unwrap();
        assert!(prompt.contains("Question: What is DevMind?"));
        assert!(prompt.contains("[3] c"));
        // Relevancy is judged on question and answer only
        assert!(!requests[2].messages[1].text().unwrap().contains("Contexts:"));
    }

    #[tokio::test]
    async fn test_turn_without_contexts_only_gets_relevancy() {
        let backend = Arc::new(MockBackend::with_results(vec![reply(r#"{"score": 0.5}"#)]));
        let judge = RagJudge::new(backend.clone(), "m");

        let scores = judge.score_record(&record("hi", &[])).await;

        assert_eq!(scores.context_precision, None);
        assert_eq!(scores.faithfulness, None);
        assert_close(scores.answer_relevancy, 0.5);
        assert_eq!(backend.request_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_judgements_leave_gaps() {
        let backend = Arc::new(MockBackend::with_results(vec![
            reply(r#"{"verdicts": [1]}"#),
            MockResponse::Error(LlmError::Network("Connection failed: refused".to_string())),
            reply("no json at all"),
        ]));
        let judge = RagJudge::new(backend, "m");

        let scores = judge.score_record(&record("q", &["a", "b"])).await;

        // One verdict for two contexts is rejected
        assert_eq!(scores.context_precision, None);
        assert_eq!(scores.faithfulness, None);
        assert_eq!(scores.answer_relevancy, None);
    }

    #[tokio::test]
    async fn test_scores_are_clamped() {
        let backend = Arc::new(MockBackend::with_results(vec![
            reply(r#"{"verdicts": [true]}"#),
            reply(r#"{"claims": 2, "supported": 5}"#),
            reply(r#"{"score": 7}"#),
        ]));
        let scores = RagJudge::new(backend, "m")
            .score_record(&record("q", &["a"]))
            .await;

        assert_close(scores.context_precision, 1.0);
        assert_close(scores.faithfulness, 1.0);
        assert_close(scores.answer_relevancy, 1.0);
    }

    #[tokio::test]
    async fn test_report_means_skip_missing_scores() {
        let backend = Arc::new(MockBackend::with_results(vec![
            reply(r#"{"verdicts": [0, 1]}"#),
            reply(r#"{"claims": 2, "supported": 2}"#),
            reply(r#"{"score": 1.0}"#),
            reply(r#"{"score": 0.5}"#),
        ]));
        let judge = RagJudge::new(backend, "m");
        let records = vec![record("q1", &["a", "b"]), record("q2", &[])];

        let mut seen = Vec::new();
        let report = judge
            .evaluate(&records, |index, scores| seen.push((index, scores.question.clone())))
            .await;

        assert_eq!(seen, vec![(1, "q1".to_string()), (2, "q2".to_string())]);
        assert_close(report.mean(Metric::ContextPrecision), 0.5);
        assert_close(report.mean(Metric::Faithfulness), 1.0);
        assert_close(report.mean(Metric::AnswerRelevancy), 0.75);
        assert_eq!(report.scored(Metric::Faithfulness), 1);
        assert_eq!(report.scored(Metric::AnswerRelevancy), 2);
        assert_eq!(EvaluationReport::default().mean(Metric::Faithfulness), None);
    }

    #[test]
    fn test_write_csv() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("evaluation").join("report.csv");
        let report = EvaluationReport {
            rows: vec![RecordScores {
                question: "What is DevMind?".to_string(),
                answer: "An assistant, with tools".to_string(),
                context_count: 2,
                context_precision: Some(0.5),
                faithfulness: None,
                answer_relevancy: Some(1.0),
            }],
        };

        report.write_csv(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next(),
            Some("question,answer,context_count,context_precision,faithfulness,answer_relevancy")
        );
        assert_eq!(
            lines.next(),
            Some("What is DevMind?,\"An assistant, with tools\",2,0.5,,1.0")
        );
    }
}
