//! Environment variable overrides.
//!
//! Environment variables form the last configuration layer. Each recognized
//! variable overwrites one field, creating the section from defaults when the
//! file layers did not define it.

use std::path::PathBuf;

use tracing::debug;

use crate::{ConfigError, DevMindConfig, Result};

/// Variables read by [`apply_env_overrides`], in application order.
pub const ENV_VARS: &[&str] = &[
    "OLLAMA_BASE_URL",
    "LLM_MODEL",
    "LLM_API_KEY",
    "EMBEDDING_PROVIDER",
    "EMBEDDING_MODEL",
    "CHROMA_DB_PATH",
    "VECTOR_DB_PATH",
    "DOCS_SOURCE_PATH",
    "OUTPUT_DIR",
    "EVALUATION_LOG_FILE",
    "RERANKER_PROVIDER",
    "RERANKER_MODEL",
    "SEARCH_PROVIDER",
    "SEARCH_API_KEY",
    "AGENT_MAX_ITERATIONS",
    "AGENT_HISTORY_LIMIT",
];

/// Apply overrides from the process environment.
pub fn apply_process_env(config: &mut DevMindConfig) -> Result<Vec<&'static str>> {
    apply_env_overrides(config, |name| std::env::var(name).ok())
}

/// Apply overrides using `lookup` to read variables.
///
/// Empty values are ignored. `VECTOR_DB_PATH` wins over its legacy alias
/// `CHROMA_DB_PATH` when both are set. Returns the names of the variables
/// that were applied.
pub fn apply_env_overrides<F>(config: &mut DevMindConfig, lookup: F) -> Result<Vec<&'static str>>
where
    F: Fn(&str) -> Option<String>,
{
    let mut applied = Vec::new();

    for &var in ENV_VARS {
        let Some(value) = lookup(var).filter(|v| !v.trim().is_empty()) else {
            continue;
        };

        match var {
            "OLLAMA_BASE_URL" => {
                config.llm.get_or_insert_with(Default::default).base_url = value;
            }
            "LLM_MODEL" => {
                config.llm.get_or_insert_with(Default::default).model = value;
            }
            "LLM_API_KEY" => {
                config.llm.get_or_insert_with(Default::default).api_key = Some(value);
            }
            "EMBEDDING_PROVIDER" => {
                config.embedding.get_or_insert_with(Default::default).provider = value;
            }
            "EMBEDDING_MODEL" => {
                config.embedding.get_or_insert_with(Default::default).model = value;
            }
            "CHROMA_DB_PATH" | "VECTOR_DB_PATH" => {
                config.storage.get_or_insert_with(Default::default).vector_db_path =
                    PathBuf::from(value);
            }
            "DOCS_SOURCE_PATH" => {
                config.paths.get_or_insert_with(Default::default).docs_source =
                    PathBuf::from(value);
            }
            "OUTPUT_DIR" => {
                config.paths.get_or_insert_with(Default::default).output_dir = PathBuf::from(value);
            }
            "EVALUATION_LOG_FILE" => {
                config.paths.get_or_insert_with(Default::default).evaluation_log =
                    PathBuf::from(value);
            }
            "RERANKER_PROVIDER" => {
                config.reranker.get_or_insert_with(Default::default).provider = value;
            }
            "RERANKER_MODEL" => {
                config.reranker.get_or_insert_with(Default::default).model = value;
            }
            "SEARCH_PROVIDER" => {
                config.search.get_or_insert_with(Default::default).provider = value;
            }
            "SEARCH_API_KEY" => {
                config.search.get_or_insert_with(Default::default).api_key = Some(value);
            }
            "AGENT_MAX_ITERATIONS" => {
                let parsed = parse_positive(var, &value)?;
                config.agent.get_or_insert_with(Default::default).max_iterations = parsed;
            }
            "AGENT_HISTORY_LIMIT" => {
                let limit = if value.eq_ignore_ascii_case("none") {
                    None
                } else {
                    Some(value.trim().parse::<usize>().map_err(|_| invalid(var, &value))?)
                };
                config.agent.get_or_insert_with(Default::default).history_limit = limit;
            }
            _ => continue,
        }

        debug!(var, "Applied environment override");
        applied.push(var);
    }

    Ok(applied)
}

fn parse_positive(var: &str, value: &str) -> Result<u32> {
    match value.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(invalid(var, value)),
    }
}

fn invalid(var: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnv {
        var: var.to_string(),
        value: value.to_string(),
        reason: "expected a positive integer".to_string(),
    }
}
