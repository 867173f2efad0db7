//! The `finished` sentinel.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::Result;

use super::{Tool, ToolContext, ToolOutput};

/// Name the agent loop treats as end of task.
pub const FINISHED_TOOL: &str = "finished";

/// Takes no arguments and ends the agent loop.
#[derive(Debug, Default, Clone, Copy)]
pub struct FinishedTool;

#[async_trait]
impl Tool for FinishedTool {
    fn name(&self) -> &str {
        FINISHED_TOOL
    }

    fn description(&self) -> &str {
        "Call this when the task is complete to end the session"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _args: Value, _ctx: &mut ToolContext<'_>) -> Result<ToolOutput> {
        Ok(ToolOutput::finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::Harness;
    use crate::tools::ToolSignal;

    #[tokio::test]
    async fn test_signals_finish_and_ignores_args() {
        let mut h = Harness::permissive();
        let out = FinishedTool
            .execute(json!({"unexpected": 1}), &mut h.ctx())
            .await
            .unwrap();
        assert_eq!(out.signal, Some(ToolSignal::Finish));
        assert_eq!(out.exit_code, 0);
    }
}
