//! CLI integration tests for the DevMind command-line interface.
//!
//! Every test runs in a scratch directory with a scrubbed environment, the
//! mock embedder and reranking disabled, so no model server is needed. Turns
//! that reach the LLM point at a closed local port.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a command for the devmind binary, isolated inside `dir`.
fn devmind(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("devmind").unwrap();
    cmd.current_dir(dir)
        .env_clear()
        .env("DEVMIND_CONFIG_DIR", dir.join("config"))
        .env("EMBEDDING_PROVIDER", "mock")
        .env("RERANKER_PROVIDER", "none")
        .env("OLLAMA_BASE_URL", "http://127.0.0.1:9/v1");
    cmd
}

// ─────────────────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_help_displays() {
    let dir = TempDir::new().unwrap();
    devmind(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("DevMind"))
        .stdout(predicate::str::contains("--query"))
        .stdout(predicate::str::contains("ingest"))
        .stdout(predicate::str::contains("eval"));
}

#[test]
fn test_version_displays() {
    let dir = TempDir::new().unwrap();
    devmind(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("devmind"));
}

#[test]
fn test_ingest_help_lists_flags() {
    let dir = TempDir::new().unwrap();
    devmind(dir.path())
        .args(["ingest", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--source"))
        .stdout(predicate::str::contains("--ext"));
}

#[test]
fn test_unknown_subcommand_fails() {
    let dir = TempDir::new().unwrap();
    devmind(dir.path()).arg("frobnicate").assert().failure();
}

// ─────────────────────────────────────────────────────────────────────────────
// Chat Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_query_reports_unreachable_model() {
    let dir = TempDir::new().unwrap();
    devmind(dir.path())
        .args(["--query", "What is DevMind?"])
        .assert()
        .success()
        .stdout(predicate::str::contains("User: What is DevMind?"))
        .stdout(predicate::str::contains("Agent: Error during agent execution:"));

    // Failed turns are not logged for evaluation
    assert!(!dir.path().join("data/evaluation/ragas_dataset.jsonl").exists());
}

#[test]
fn test_repl_exits_on_exit() {
    let dir = TempDir::new().unwrap();
    devmind(dir.path())
        .write_stdin("EXIT\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("DevMind AI ready. Type 'exit' to quit."));
}

#[test]
fn test_repl_exits_on_eof() {
    let dir = TempDir::new().unwrap();
    devmind(dir.path())
        .write_stdin("/help\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Available Commands"))
        .stdout(predicate::str::contains("retrieve_knowledge"));
}

#[test]
fn test_dotenv_file_is_loaded() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join(".env"), "SEARCH_PROVIDER=altavista\n").unwrap();

    devmind(dir.path())
        .args(["--query", "hi"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown search provider"));
}

#[test]
fn test_log_dir_blocked_by_file_falls_back_to_console() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("data")).unwrap();
    std::fs::write(dir.path().join("data/logs"), "not a directory").unwrap();
    std::fs::write(dir.path().join("eval.jsonl"), "").unwrap();

    devmind(dir.path())
        .args(["eval", "--log", "eval.jsonl"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Dataset is empty."))
        .stderr(predicate::str::contains("file logging disabled"));
}

#[test]
fn test_unknown_search_provider_is_fatal() {
    let dir = TempDir::new().unwrap();
    devmind(dir.path())
        .env("SEARCH_PROVIDER", "altavista")
        .args(["--query", "hi"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown search provider"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Ingest Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_ingest_markdown_tree() {
    let dir = TempDir::new().unwrap();
    let docs = dir.path().join("docs");
    std::fs::create_dir_all(docs.join("guides")).unwrap();
    std::fs::write(docs.join("intro.md"), "DevMind answers technical questions.").unwrap();
    std::fs::write(docs.join("guides/setup.md"), "Run ollama serve first.").unwrap();
    std::fs::write(docs.join("notes.txt"), "not ingested").unwrap();

    devmind(dir.path())
        .args(["ingest", "--source", "docs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Ingestion complete"))
        .stdout(predicate::str::contains("Files ingested:  2"))
        .stdout(predicate::str::contains("Total in store:  2"));

    assert!(dir.path().join("data/vector_db/knowledge.db").exists());
}

#[test]
fn test_ingest_extension_flag() {
    let dir = TempDir::new().unwrap();
    let docs = dir.path().join("docs");
    std::fs::create_dir_all(&docs).unwrap();
    std::fs::write(docs.join("a.md"), "markdown").unwrap();
    std::fs::write(docs.join("b.rst"), "restructured").unwrap();

    devmind(dir.path())
        .args(["ingest", "--source", "docs", "--ext", "rst"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Files found:     1"));
}

#[test]
fn test_ingest_missing_source_fails() {
    let dir = TempDir::new().unwrap();
    devmind(dir.path())
        .args(["ingest", "--source", "nowhere"])
        .assert()
        .failure();
}

// ─────────────────────────────────────────────────────────────────────────────
// Eval Tests
// ─────────────────────────────────────────────────────────────────────────────

fn write_eval_log(dir: &Path) {
    std::fs::write(
        dir.join("eval.jsonl"),
        concat!(
            r#"{"question":"q1","answer":"a1","contexts":["c1","c2"],"ground_truth":"","timestamp":"2026-01-01T00:00:00+00:00"}"#,
            "\n",
            r#"{"question":"q2","answer":"a2","contexts":[],"ground_truth":"","timestamp":"2026-01-02T00:00:00+00:00"}"#,
            "\n",
        ),
    )
    .unwrap();
}

#[test]
fn test_eval_summarizes_log() {
    let dir = TempDir::new().unwrap();
    write_eval_log(dir.path());

    devmind(dir.path())
        .args(["eval", "--log", "eval.jsonl", "--no-judge"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Records:              2"))
        .stdout(predicate::str::contains("Turns with contexts:  1"))
        .stdout(predicate::str::contains("Avg contexts / turn:  1.00"))
        .stdout(predicate::str::contains("Scores").not());

    assert!(!dir.path().join("report.csv").exists());
}

#[test]
fn test_eval_writes_report_when_judge_is_unreachable() {
    let dir = TempDir::new().unwrap();
    write_eval_log(dir.path());

    devmind(dir.path())
        .args(["eval", "--log", "eval.jsonl", "--report", "out/report.csv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Records:              2"))
        .stdout(predicate::str::contains("faithfulness"))
        .stdout(predicate::str::contains("n/a"))
        .stdout(predicate::str::contains("Report saved to out/report.csv"));

    let report = std::fs::read_to_string(dir.path().join("out/report.csv")).unwrap();
    let mut lines = report.lines();
    assert_eq!(
        lines.next(),
        Some("question,answer,context_count,context_precision,faithfulness,answer_relevancy")
    );
    assert_eq!(lines.next(), Some("q1,a1,2,,,"));
    assert_eq!(lines.next(), Some("q2,a2,0,,,"));
}

#[test]
fn test_eval_empty_log() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("eval.jsonl"), "").unwrap();

    devmind(dir.path())
        .args(["eval", "--log", "eval.jsonl"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Dataset is empty."));
}

#[test]
fn test_eval_missing_log_fails() {
    let dir = TempDir::new().unwrap();
    devmind(dir.path())
        .args(["eval", "--log", "missing.jsonl"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read evaluation log"));
}
