//! Tool types for Ferrule
//!
//! This module defines the core types for tool execution: the `Tool` trait
//! every tool implements, the `ToolContext` handed to a running tool, the
//! `ToolOutput` it returns, and the per-tool argument decode step.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::conversation::{ToolResult, INVALID_ARGUMENTS_KEY};
use crate::error::{FerruleError, Result};
use crate::process::{CommandOutput, ExecOptions, DEFAULT_TIMEOUT};
use crate::safety::{MutationGuard, PermissionGate};

/// Control-flow signal a tool can raise alongside its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolSignal {
    /// The task is complete; stop the loop.
    Finish,
    /// The operator replaced the current plan with a new instruction.
    Redirect(String),
}

/// What a tool produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub signal: Option<ToolSignal>,
}

impl ToolOutput {
    /// Successful output with only stdout.
    pub fn text(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: 0,
            signal: None,
        }
    }

    /// Failed output with a message in stderr.
    pub fn failure(stderr: impl Into<String>, exit_code: i32) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code,
            signal: None,
        }
    }

    /// Output signalling the end of the task.
    pub fn finish() -> Self {
        Self {
            signal: Some(ToolSignal::Finish),
            ..Self::text("Task finished")
        }
    }

    /// Output signalling that the operator supplied a new instruction.
    pub fn redirect(instruction: impl Into<String>) -> Self {
        Self {
            signal: Some(ToolSignal::Redirect(instruction.into())),
            ..Self::failure("Cancelled: user provided alternative instructions", 1)
        }
    }

    /// Attach the invocation id.
    pub fn into_result(self, invocation_id: &str) -> ToolResult {
        ToolResult::new(invocation_id, self.stdout, self.stderr, self.exit_code)
    }
}

impl From<CommandOutput> for ToolOutput {
    fn from(output: CommandOutput) -> Self {
        Self {
            stdout: output.stdout,
            stderr: output.stderr,
            exit_code: output.exit_code,
            signal: None,
        }
    }
}

/// Trait that all tools must implement.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use serde::Deserialize;
/// use serde_json::Value;
/// use ferrule::tools::{parse_args, Tool, ToolContext, ToolOutput};
/// use ferrule::error::Result;
///
/// #[derive(Deserialize)]
/// struct EchoArgs {
///     message: String,
/// }
///
/// struct EchoTool;
///
/// #[async_trait]
/// impl Tool for EchoTool {
///     fn name(&self) -> &str { "echo" }
///     fn description(&self) -> &str { "Echo a message" }
///     fn parameters(&self) -> Value {
///         serde_json::json!({
///             "type": "object",
///             "properties": { "message": { "type": "string" } },
///             "required": ["message"]
///         })
///     }
///     async fn execute(&self, args: Value, _ctx: &mut ToolContext<'_>) -> Result<ToolOutput> {
///         let args: EchoArgs = parse_args(self.name(), args)?;
///         Ok(ToolOutput::text(args.message))
///     }
/// }
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name the model uses to invoke the tool.
    fn name(&self) -> &str;

    /// Description advertised to the model.
    fn description(&self) -> &str;

    /// JSON schema of the tool's parameters.
    fn parameters(&self) -> Value;

    /// Deadline override; the registry default applies when `None`.
    fn timeout(&self) -> Option<Duration> {
        None
    }

    /// Whether the handler waits on the operator. The registry does not put
    /// a deadline on such handlers, so they bound any process they start.
    fn awaits_operator(&self) -> bool {
        false
    }

    /// Run the tool.
    ///
    /// Errors are reported back to the model as a failed tool result. An
    /// [`FerruleError::InvalidArguments`] error maps to exit code 2, any
    /// other error to exit code 1.
    async fn execute(&self, args: Value, ctx: &mut ToolContext<'_>) -> Result<ToolOutput>;
}

/// Decode a tool's arguments into its typed argument struct.
///
/// # Example
/// ```
/// use ferrule::tools::parse_args;
/// use serde::Deserialize;
/// use serde_json::json;
///
/// #[derive(Deserialize)]
/// struct Args { command: String }
///
/// let args: Args = parse_args("bash", json!({"command": "ls"})).unwrap();
/// assert_eq!(args.command, "ls");
/// assert!(parse_args::<Args>("bash", json!({})).is_err());
/// ```
pub fn parse_args<T: DeserializeOwned>(tool: &str, args: Value) -> Result<T> {
    if let Some(raw) = args.get(INVALID_ARGUMENTS_KEY) {
        return Err(FerruleError::InvalidArguments {
            tool: tool.to_string(),
            reason: format!("arguments are not a JSON object: {}", raw),
        });
    }
    serde_json::from_value(args).map_err(|e| FerruleError::InvalidArguments {
        tool: tool.to_string(),
        reason: e.to_string(),
    })
}

/// Context handed to a running tool.
///
/// Carries the process-lifetime safety state by mutable reference so tools
/// never reach for globals.
pub struct ToolContext<'a> {
    /// Directory relative paths resolve against
    pub workspace: Option<PathBuf>,
    /// Deadline for any process the tool starts
    pub timeout: Duration,
    pub guard: &'a mut MutationGuard,
    pub gate: &'a mut PermissionGate,
}

impl<'a> ToolContext<'a> {
    pub fn new(guard: &'a mut MutationGuard, gate: &'a mut PermissionGate) -> Self {
        Self {
            workspace: None,
            timeout: DEFAULT_TIMEOUT,
            guard,
            gate,
        }
    }

    pub fn with_workspace(mut self, workspace: impl Into<PathBuf>) -> Self {
        self.workspace = Some(workspace.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolve a possibly relative path against the workspace.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let candidate = Path::new(path);
        match &self.workspace {
            Some(ws) if candidate.is_relative() => ws.join(candidate),
            _ => candidate.to_path_buf(),
        }
    }

    /// Process options carrying the workspace and the current deadline.
    pub fn exec_options(&self) -> ExecOptions {
        let options = ExecOptions::new().with_timeout(self.timeout);
        match &self.workspace {
            Some(ws) => options.with_workdir(ws.clone()),
            None => options,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safety::ScriptedOperator;
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::Arc;

    #[derive(Debug, Deserialize)]
    struct SearchArgs {
        pattern: String,
        #[serde(default)]
        ignore_case: bool,
    }

    #[test]
    fn test_parse_args_defaults() {
        let args: SearchArgs = parse_args("search", json!({"pattern": "fn"})).unwrap();
        assert_eq!(args.pattern, "fn");
        assert!(!args.ignore_case);
    }

    #[test]
    fn test_parse_args_missing_field() {
        let err = parse_args::<SearchArgs>("search", json!({"ignore_case": true})).unwrap_err();
        match err {
            FerruleError::InvalidArguments { tool, reason } => {
                assert_eq!(tool, "search");
                assert!(reason.contains("pattern"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_args_wrong_type() {
        assert!(parse_args::<SearchArgs>("search", json!({"pattern": 5})).is_err());
    }

    #[test]
    fn test_parse_args_invalid_marker() {
        let mut map = serde_json::Map::new();
        map.insert(INVALID_ARGUMENTS_KEY.to_string(), json!("[1]"));
        let err = parse_args::<SearchArgs>("search", Value::Object(map)).unwrap_err();
        assert!(err.to_string().contains("not a JSON object"));
    }

    #[test]
    fn test_tool_output_into_result() {
        let result = ToolOutput::failure("nope", 3).into_result("call_1");
        assert_eq!(result.invocation_id, "call_1");
        assert_eq!(result.exit_code, 3);
        assert_eq!(result.stderr, "nope");
    }

    #[test]
    fn test_tool_output_signals() {
        assert_eq!(ToolOutput::finish().signal, Some(ToolSignal::Finish));
        let redirect = ToolOutput::redirect("try again");
        assert_eq!(
            redirect.signal,
            Some(ToolSignal::Redirect("try again".into()))
        );
        assert_ne!(redirect.exit_code, 0);
    }

    #[test]
    fn test_from_command_output() {
        let out: ToolOutput = CommandOutput::new("a".into(), "b".into(), 4).into();
        assert_eq!((out.stdout.as_str(), out.stderr.as_str(), out.exit_code), ("a", "b", 4));
    }

    #[test]
    fn test_context_resolves_relative_paths() {
        let mut guard = MutationGuard::new();
        let mut gate = PermissionGate::new(Arc::new(ScriptedOperator::default()));
        let ctx = ToolContext::new(&mut guard, &mut gate).with_workspace("/work");

        assert_eq!(ctx.resolve_path("src/main.rs"), PathBuf::from("/work/src/main.rs"));
        assert_eq!(ctx.resolve_path("/etc/hosts"), PathBuf::from("/etc/hosts"));
        assert_eq!(ctx.exec_options().workdir, Some(PathBuf::from("/work")));
    }

    #[test]
    fn test_context_timeout() {
        let mut guard = MutationGuard::new();
        let mut gate = PermissionGate::new(Arc::new(ScriptedOperator::default()));
        let ctx = ToolContext::new(&mut guard, &mut gate).with_timeout(Duration::from_secs(3));
        assert_eq!(ctx.exec_options().timeout, Duration::from_secs(3));
    }
}
