//! CLI command handlers.

pub mod chat;
pub mod eval;
pub mod ingest;
pub mod repl;

use devmind_config::DevMindConfig;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Fully layered configuration.
    pub config: DevMindConfig,
    /// Verbose output enabled.
    pub verbose: bool,
}
