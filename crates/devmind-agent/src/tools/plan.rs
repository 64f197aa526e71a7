//! Planning tool.
//!
//! Lets the model commit to an ordered list of steps before acting. The plan
//! is echoed back so it stays in the transcript.

use serde_json::{Value, json};

use crate::error::Result;
use crate::tool::{CreatePlanParams, ToolResult};

/// Tool for recording a step-by-step plan.
#[derive(Debug, Clone, Copy, Default)]
pub struct CreatePlanTool;

impl CreatePlanTool {
    pub const NAME: &'static str = "create_plan";
    pub const DESCRIPTION: &'static str = "Create a step-by-step plan to solve a complex task. Use this for multi-step problems.";

    pub fn parameters() -> Value {
        json!({
            "type": "object",
            "properties": {
                "steps": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "List of steps to execute."
                }
            },
            "required": ["steps"]
        })
    }

    pub fn execute(&self, params: CreatePlanParams) -> Result<ToolResult> {
        Ok(ToolResult::text(format_plan(&params.steps)))
    }
}

/// The header always says "steps", even for a single step.
fn format_plan(steps: &[String]) -> String {
    if steps.is_empty() {
        return "Plan created with 0 steps.".to_string();
    }

    let numbered: Vec<String> = steps
        .iter()
        .enumerate()
        .map(|(i, step)| format!("{}. {}", i + 1, step))
        .collect();
    format!("Plan created with {} steps:\n{}", steps.len(), numbered.join("\n"))
}
