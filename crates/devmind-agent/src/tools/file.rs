//! Solution file tool.
//!
//! Writes model-produced artifacts into a single output directory. Only the
//! final path component of the requested name is used, so a request can
//! never escape the directory.

use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::{AgentError, Result};
use crate::tool::{SaveSolutionParams, ToolResult};

/// Tool for saving solutions to the output directory.
#[derive(Debug, Clone)]
pub struct SaveSolutionTool {
    output_dir: PathBuf,
}

impl SaveSolutionTool {
    pub const NAME: &'static str = "save_solution";
    pub const DESCRIPTION: &'static str = "Save generated code or documentation to a file.";

    /// Create a tool writing into `output_dir`.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Directory files are written to.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn parameters() -> Value {
        json!({
            "type": "object",
            "properties": {
                "filename": {
                    "type": "string",
                    "description": "The name of the file (e.g., 'script.py', 'guide.md')."
                },
                "content": {
                    "type": "string",
                    "description": "The content of the file."
                }
            },
            "required": ["filename", "content"]
        })
    }

    pub async fn execute(&self, params: SaveSolutionParams) -> Result<ToolResult> {
        match self.save(&params.filename, &params.content).await {
            Ok(path) => {
                tracing::info!(path = %path.display(), bytes = params.content.len(), "Solution saved");
                Ok(ToolResult::text(format!(
                    "File saved successfully: {}",
                    path.display()
                )))
            }
            Err(e) => Ok(ToolResult::error(format!("Error saving file: {}", e))),
        }
    }

    /// Write `content` under the output directory, replacing any existing file.
    async fn save(&self, filename: &str, content: &str) -> Result<PathBuf> {
        let name = sanitize_filename(filename)?;
        fs::create_dir_all(&self.output_dir).await?;

        let target = self.output_dir.join(name);
        let temp = self
            .output_dir
            .join(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4().simple()));

        if let Err(e) = fs::write(&temp, content).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&temp, &target).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }
        Ok(target)
    }
}

/// Reduce a requested name to its last path component.
///
/// Both `/` and `\` count as separators. Empty names and `.`/`..` are rejected.
pub fn sanitize_filename(filename: &str) -> Result<&str> {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    match name {
        "" | "." | ".." => Err(AgentError::tool(format!("invalid filename '{}'", filename))),
        name => Ok(name),
    }
}
