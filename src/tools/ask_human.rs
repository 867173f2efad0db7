//! Clarification prompt to the human operator.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::Result;

use super::{parse_args, Tool, ToolContext, ToolOutput};

#[derive(Debug, Deserialize)]
struct AskArgs {
    question: String,
}

/// Ask the operator a question and return the answer.
#[derive(Debug, Default, Clone, Copy)]
pub struct AskHumanTool;

#[async_trait]
impl Tool for AskHumanTool {
    fn name(&self) -> &str {
        "ask_human"
    }

    fn description(&self) -> &str {
        "Ask the human operator a clarifying question and wait for the answer"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "question": {
                    "type": "string",
                    "description": "Question to show the operator"
                }
            },
            "required": ["question"]
        })
    }

    fn awaits_operator(&self) -> bool {
        true
    }

    async fn execute(&self, args: Value, ctx: &mut ToolContext<'_>) -> Result<ToolOutput> {
        let args: AskArgs = parse_args(self.name(), args)?;
        let operator = ctx.gate.operator();
        match operator.ask(&args.question).await? {
            Some(answer) if !answer.trim().is_empty() => Ok(ToolOutput::text(answer.trim())),
            _ => Ok(ToolOutput::failure("No answer received from the operator", 1)),
        }
    }
}
