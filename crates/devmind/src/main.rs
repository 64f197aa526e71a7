//! DevMind - tool-augmented assistant for software developers
//!
//! Main entry point for the DevMind CLI.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};

mod commands;
mod setup;

use commands::{chat, eval, ingest};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// DevMind - tool-augmented assistant for software developers
#[derive(Parser)]
#[command(name = "devmind")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Ask a single question and exit instead of starting the REPL
    #[arg(short, long)]
    pub query: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Load this config file on top of the user and project configs
    #[arg(long, global = true, env = "DEVMIND_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load a documentation tree into the knowledge base
    Ingest(ingest::IngestArgs),

    /// Score the evaluation log and write a CSV report
    Eval(eval::EvalArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Variables from .env never override ones already set
    let dotenv = dotenvy::dotenv().ok();

    let mut options = devmind_config::LoadOptions::default();
    if let Some(ref path) = cli.config {
        options = options.with_config_file(path);
    }
    let loaded = devmind_config::load_config_with_options(&options)?;

    let log_dir = log_dir(&loaded.config.storage().vector_db_path);
    let _guard = init_tracing(cli.verbose, &log_dir);

    if let Some(path) = &dotenv {
        tracing::debug!(path = %path.display(), "Loaded .env");
    }

    for warning in &loaded.warnings {
        tracing::warn!("{}", warning);
    }
    tracing::debug!(
        sources = ?loaded.loaded_from(),
        env_overrides = ?loaded.env_overrides,
        "Configuration loaded"
    );

    let ctx = commands::Context {
        config: loaded.config,
        verbose: cli.verbose,
    };

    match cli.command {
        Some(Commands::Ingest(args)) => ingest::run(args, &ctx).await,
        Some(Commands::Eval(args)) => eval::run(args, &ctx).await,
        None => match cli.query {
            Some(query) => chat::run_once(&query, &ctx).await,
            None => chat::run_repl(&ctx).await,
        },
    }
}

/// Logs live next to the vector store, under the data directory.
fn log_dir(vector_db_path: &Path) -> PathBuf {
    vector_db_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
}

/// Daily-rotated JSON log file in `log_dir`, or `None` if the directory
/// cannot be created.
fn file_writer(log_dir: &Path) -> Option<(NonBlocking, WorkerGuard)> {
    let appender = std::fs::create_dir_all(log_dir)
        .map_err(|e| e.to_string())
        .and_then(|()| {
            RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("devmind.log")
                .build(log_dir)
                .map_err(|e| e.to_string())
        });

    match appender {
        Ok(appender) => Some(tracing_appender::non_blocking(appender)),
        Err(e) => {
            eprintln!(
                "warning: file logging disabled, cannot use {}: {}",
                log_dir.display(),
                e
            );
            None
        }
    }
}

/// Console (human-readable, stderr) + rotating JSON file when available.
fn init_tracing(verbose: bool, log_dir: &Path) -> Option<WorkerGuard> {
    use tracing_subscriber::prelude::*;

    let filter = if verbose {
        "devmind=debug,devmind_agent=debug,devmind_llm=debug,devmind_memory=debug,devmind_config=debug,info"
    } else {
        "devmind=info,devmind_agent=info,devmind_llm=info,devmind_memory=info,warn"
    };

    let (file_layer, guard) = match file_writer(log_dir) {
        Some((writer, guard)) => {
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "devmind=trace,devmind_agent=trace,devmind_llm=trace,devmind_memory=trace,devmind_config=trace,info",
                ));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(file_layer)
        .init();

    guard
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_log_dir_is_beside_vector_store() {
        assert_eq!(log_dir(Path::new("./data/vector_db")), PathBuf::from("./data/logs"));
        assert_eq!(log_dir(Path::new("vector_db")), PathBuf::from("logs"));
    }

    #[test]
    fn test_file_writer_creates_log_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let logs = dir.path().join("data").join("logs");

        let writer = file_writer(&logs);

        assert!(writer.is_some());
        assert!(logs.is_dir());
    }

    #[test]
    fn test_file_writer_falls_back_when_dir_is_unusable() {
        let dir = tempfile::TempDir::new().unwrap();
        let blocker = dir.path().join("data");
        std::fs::write(&blocker, "not a directory").unwrap();

        assert!(file_writer(&blocker.join("logs")).is_none());
    }

    #[test]
    fn test_parse_query_and_subcommands() {
        let cli = Cli::try_parse_from(["devmind", "--query", "What is DevMind?"]).unwrap();
        assert_eq!(cli.query.as_deref(), Some("What is DevMind?"));
        assert!(cli.command.is_none());

        let cli = Cli::try_parse_from(["devmind", "ingest", "--source", "docs", "--ext", "md", "--ext", "rst"])
            .unwrap();
        match cli.command {
            Some(Commands::Ingest(args)) => {
                assert_eq!(args.source, Some(PathBuf::from("docs")));
                assert_eq!(args.ext, vec!["md", "rst"]);
            }
            _ => panic!("expected ingest"),
        }

        let cli = Cli::try_parse_from(["devmind", "-v", "eval", "--log", "x.jsonl", "--no-judge"]).unwrap();
        assert!(cli.verbose);
        match cli.command {
            Some(Commands::Eval(args)) => {
                assert_eq!(args.log, Some(PathBuf::from("x.jsonl")));
                assert!(args.no_judge);
                assert_eq!(args.report, None);
            }
            _ => panic!("expected eval"),
        }
    }
}
