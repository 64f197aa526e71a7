//! Configuration system for DevMind.
//!
//! Provides TOML-based configuration with:
//! - One section per component (`[llm]`, `[embedding]`, `[storage]`, `[paths]`,
//!   `[reranker]`, `[search]`, `[agent]`, `[ingest]`)
//! - Config file layering (XDG user config + project-local + explicit file)
//! - Environment variable overrides applied last (`LLM_MODEL`, `OUTPUT_DIR`, ...)
//!
//! The loaded [`DevMindConfig`] is built once by the binary and handed to each
//! component at construction.

pub mod discovery;
pub mod env;
pub mod error;
pub mod types;

pub use discovery::{
    ConfigSource, LoadOptions, LoadedConfig, load_config, load_config_file,
    load_config_with_options, save_config, xdg_config_dir, xdg_config_path,
};
pub use env::{ENV_VARS, apply_env_overrides, apply_process_env};
pub use error::{ConfigError, Result};
pub use types::*;
