//! Shell tool for Ferrule
//!
//! Runs a command line through `bash -c` after the permission gate has
//! approved its leading binary.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::error::Result;
use crate::process::run_shell;
use crate::safety::Verdict;

use super::{parse_args, Tool, ToolContext, ToolOutput};

#[derive(Debug, Deserialize)]
struct BashArgs {
    command: String,
}

/// Tool for executing shell commands.
///
/// # Parameters
/// - `command`: The shell command to execute (required)
///
/// # Example
/// ```rust
/// use std::sync::Arc;
/// use ferrule::safety::{MutationGuard, PermissionGate, ScriptedOperator};
/// use ferrule::tools::{shell::BashTool, Tool, ToolContext};
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let mut guard = MutationGuard::new();
/// let mut gate = PermissionGate::non_interactive(Arc::new(ScriptedOperator::default()));
/// let mut ctx = ToolContext::new(&mut guard, &mut gate);
///
/// let output = BashTool.execute(json!({"command": "echo hello"}), &mut ctx).await.unwrap();
/// assert_eq!(output.stdout.trim(), "hello");
/// # });
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct BashTool;

#[async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn description(&self) -> &str {
        "Execute a shell command using bash. The operator may be asked to approve the command first."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                }
            },
            "required": ["command"]
        })
    }

    fn awaits_operator(&self) -> bool {
        true
    }

    async fn execute(&self, args: Value, ctx: &mut ToolContext<'_>) -> Result<ToolOutput> {
        let args: BashArgs = parse_args(self.name(), args)?;

        match ctx.gate.check(&args.command).await? {
            Verdict::Allowed => {
                info!(command = %args.command, "Running shell command");
                Ok(run_shell(&args.command, &ctx.exec_options()).await.into())
            }
            Verdict::Denied(reason) => Ok(ToolOutput::failure(reason, 1)),
            Verdict::Redirect(instruction) => Ok(ToolOutput::redirect(instruction)),
        }
    }
}
