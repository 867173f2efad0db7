//! Tool registry and dispatcher for Ferrule
//!
//! This module provides the `ToolRegistry` struct for managing tools and
//! dispatching invocations to them. Dispatch never lets a tool failure escape:
//! handler errors and panics become failed tool results. Only an invocation
//! naming an unregistered tool is surfaced as an error.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tracing::{error, info, warn};

use crate::conversation::{ToolInvocation, ToolResult};
use crate::error::{FerruleError, Result};
use crate::process::DEFAULT_TIMEOUT;
use crate::providers::ToolDefinition;

use super::{Tool, ToolContext, ToolSignal};

/// Exit code for invocations whose arguments failed to decode.
pub const INVALID_ARGUMENTS_EXIT_CODE: i32 = 2;

/// Exit code for handler errors and panics.
pub const HANDLER_FAILURE_EXIT_CODE: i32 = 1;

/// Slack past the tool's deadline before dispatch abandons the handler, so a
/// process-level timeout reports first.
const DISPATCH_GRACE: Duration = Duration::from_secs(1);

/// How a dispatched invocation affects the loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Append the result and carry on.
    Completed(ToolResult),
    /// Append the result, then the operator's instruction as a user message.
    Redirected {
        result: ToolResult,
        instruction: String,
    },
    /// Stop the loop.
    Finished,
}

/// A registry that holds tools and dispatches invocations to them.
///
/// # Example
///
/// ```rust
/// use ferrule::tools::{ToolRegistry, FinishedTool};
///
/// let mut registry = ToolRegistry::new();
/// registry.register(Box::new(FinishedTool));
/// assert!(registry.has("finished"));
/// assert_eq!(registry.definitions()[0].name, "finished");
/// ```
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
    default_timeout: Duration,
}

impl ToolRegistry {
    /// Create an empty registry with the default ten second tool deadline.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            default_timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the deadline used for tools that do not define their own.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Register a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        info!(tool = %name, "Registering tool");
        self.tools.insert(name, tool);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Schemas advertised to the model, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|t| ToolDefinition::new(t.name(), t.description(), t.parameters()))
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Run one invocation.
    ///
    /// # Errors
    /// Returns [`FerruleError::Protocol`] when no tool with the invoked name
    /// is registered. Every other failure is folded into the returned result.
    pub async fn dispatch(
        &self,
        invocation: &ToolInvocation,
        ctx: &mut ToolContext<'_>,
    ) -> Result<Dispatch> {
        let Some(tool) = self.tools.get(&invocation.name) else {
            return Err(FerruleError::Protocol(format!(
                "Model invoked unknown tool '{}'",
                invocation.name
            )));
        };

        let limit = tool.timeout().unwrap_or(self.default_timeout);
        ctx.timeout = limit;
        let start = Instant::now();

        let handler =
            AssertUnwindSafe(tool.execute(invocation.arguments_value(), ctx)).catch_unwind();
        let outcome = if tool.awaits_operator() {
            handler.await
        } else {
            match tokio::time::timeout(limit + DISPATCH_GRACE, handler).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(tool = %invocation.name, timeout_secs = limit.as_secs(), "Tool timed out");
                    return Ok(Dispatch::Completed(ToolResult::failure(
                        &invocation.id,
                        format!(
                            "Tool '{}' timed out after {} seconds",
                            invocation.name,
                            limit.as_secs()
                        ),
                        HANDLER_FAILURE_EXIT_CODE,
                    )));
                }
            }
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        let mut output = match outcome {
            Ok(Ok(output)) => {
                info!(
                    tool = %invocation.name,
                    exit_code = output.exit_code,
                    duration_ms,
                    "Tool executed"
                );
                output
            }
            Ok(Err(FerruleError::InvalidArguments { tool, reason })) => {
                warn!(tool = %tool, reason = %reason, "Invalid tool arguments");
                return Ok(Dispatch::Completed(ToolResult::failure(
                    &invocation.id,
                    format!("Invalid arguments for '{}': {}", tool, reason),
                    INVALID_ARGUMENTS_EXIT_CODE,
                )));
            }
            Ok(Err(e)) => {
                error!(tool = %invocation.name, error = %e, duration_ms, "Tool execution failed");
                return Ok(Dispatch::Completed(ToolResult::failure(
                    &invocation.id,
                    e.to_string(),
                    HANDLER_FAILURE_EXIT_CODE,
                )));
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(tool = %invocation.name, panic = %message, "Tool panicked");
                return Ok(Dispatch::Completed(ToolResult::failure(
                    &invocation.id,
                    format!("Tool '{}' panicked: {}", invocation.name, message),
                    HANDLER_FAILURE_EXIT_CODE,
                )));
            }
        };

        Ok(match output.signal.take() {
            Some(ToolSignal::Finish) => Dispatch::Finished,
            Some(ToolSignal::Redirect(instruction)) => Dispatch::Redirected {
                result: output.into_result(&invocation.id),
                instruction,
            },
            None => Dispatch::Completed(output.into_result(&invocation.id)),
        })
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safety::{MutationGuard, PermissionGate, ScriptedOperator};
    use crate::tools::{parse_args, ToolOutput};
    use async_trait::async_trait;
    use serde::Deserialize;
    use serde_json::{json, Value};
    use std::sync::Arc;

    #[derive(Deserialize)]
    struct EchoArgs {
        message: String,
    }

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the provided message"
        }
        fn parameters(&self) -> Value {
            json!({
                "type": "object",
                "properties": { "message": { "type": "string" } },
                "required": ["message"]
            })
        }
        async fn execute(&self, args: Value, _ctx: &mut ToolContext<'_>) -> Result<ToolOutput> {
            let args: EchoArgs = parse_args(self.name(), args)?;
            Ok(ToolOutput::text(args.message))
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "fail"
        }
        fn description(&self) -> &str {
            "Always errors"
        }
        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }
        async fn execute(&self, _args: Value, _ctx: &mut ToolContext<'_>) -> Result<ToolOutput> {
            Err(FerruleError::Tool("disk on fire".into()))
        }
    }

    struct PanickingTool;

    #[async_trait]
    impl Tool for PanickingTool {
        fn name(&self) -> &str {
            "panic"
        }
        fn description(&self) -> &str {
            "Always panics"
        }
        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }
        async fn execute(&self, _args: Value, _ctx: &mut ToolContext<'_>) -> Result<ToolOutput> {
            panic!("handler exploded");
        }
    }

    struct DeadlineReporter;

    #[async_trait]
    impl Tool for DeadlineReporter {
        fn name(&self) -> &str {
            "deadline"
        }
        fn description(&self) -> &str {
            "Reports its deadline"
        }
        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }
        fn timeout(&self) -> Option<Duration> {
            Some(Duration::from_secs(42))
        }
        async fn execute(&self, _args: Value, ctx: &mut ToolContext<'_>) -> Result<ToolOutput> {
            Ok(ToolOutput::text(ctx.timeout.as_secs().to_string()))
        }
    }

    struct SleepyTool {
        waits_on_operator: bool,
    }

    #[async_trait]
    impl Tool for SleepyTool {
        fn name(&self) -> &str {
            if self.waits_on_operator {
                "patient"
            } else {
                "sleepy"
            }
        }
        fn description(&self) -> &str {
            "Sleeps far past its deadline"
        }
        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }
        fn timeout(&self) -> Option<Duration> {
            Some(Duration::from_secs(5))
        }
        fn awaits_operator(&self) -> bool {
            self.waits_on_operator
        }
        async fn execute(&self, _args: Value, _ctx: &mut ToolContext<'_>) -> Result<ToolOutput> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(ToolOutput::text("woke up"))
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        registry.register(Box::new(FailingTool));
        registry.register(Box::new(PanickingTool));
        registry.register(Box::new(DeadlineReporter));
        registry.register(Box::new(SleepyTool {
            waits_on_operator: false,
        }));
        registry.register(Box::new(SleepyTool {
            waits_on_operator: true,
        }));
        registry
    }

    async fn run(registry: &ToolRegistry, inv: ToolInvocation) -> Result<Dispatch> {
        let mut guard = MutationGuard::new();
        let mut gate = PermissionGate::new(Arc::new(ScriptedOperator::default()));
        let mut ctx = ToolContext::new(&mut guard, &mut gate);
        registry.dispatch(&inv, &mut ctx).await
    }

    fn completed(dispatch: Dispatch) -> ToolResult {
        match dispatch {
            Dispatch::Completed(result) => result,
            other => panic!("expected Completed, got {:?}", other),
        }
    }

    #[test]
    fn test_registry_new() {
        let registry = ToolRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.default_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_registry_replace_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        registry.register(Box::new(EchoTool));
        assert_eq!(registry.len(), 1);
        assert!(registry.get("echo").is_some());
    }

    #[test]
    fn test_definitions_sorted() {
        let names: Vec<String> = registry()
            .definitions()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["deadline", "echo", "fail", "panic", "patient", "sleepy"]);
        assert_eq!(registry().names(), vec!["deadline", "echo", "fail", "panic", "patient", "sleepy"]);
    }

    #[tokio::test]
    async fn test_dispatch_success() {
        let inv = ToolInvocation::new("c1", "echo", json!({"message": "hello"}));
        let result = completed(run(&registry(), inv).await.unwrap());
        assert_eq!(result.invocation_id, "c1");
        assert_eq!(result.stdout, "hello");
        assert_eq!(result.exit_code, 0);
    }

    #[tokio::test]
    async fn test_dispatch_unknown_tool_is_protocol_error() {
        let inv = ToolInvocation::new("c1", "teleport", json!({}));
        let err = run(&registry(), inv).await.unwrap_err();
        assert!(matches!(err, FerruleError::Protocol(_)));
        assert!(err.to_string().contains("teleport"));
    }

    #[tokio::test]
    async fn test_dispatch_missing_argument_is_tagged_result() {
        let inv = ToolInvocation::new("c1", "echo", json!({}));
        let result = completed(run(&registry(), inv).await.unwrap());
        assert_eq!(result.exit_code, INVALID_ARGUMENTS_EXIT_CODE);
        assert!(result.stderr.contains("message"));
    }

    #[tokio::test]
    async fn test_dispatch_unparseable_arguments() {
        let inv = ToolInvocation::from_json_arguments("c1", "echo", "not json");
        let result = completed(run(&registry(), inv).await.unwrap());
        assert_eq!(result.exit_code, INVALID_ARGUMENTS_EXIT_CODE);
        assert!(result.stderr.contains("not a JSON object"));
    }

    #[tokio::test]
    async fn test_dispatch_handler_error() {
        let inv = ToolInvocation::new("c1", "fail", json!({}));
        let result = completed(run(&registry(), inv).await.unwrap());
        assert_eq!(result.exit_code, HANDLER_FAILURE_EXIT_CODE);
        assert!(result.stderr.contains("disk on fire"));
    }

    #[tokio::test]
    async fn test_dispatch_panic_is_caught() {
        let inv = ToolInvocation::new("c1", "panic", json!({}));
        let result = completed(run(&registry(), inv).await.unwrap());
        assert_eq!(result.exit_code, HANDLER_FAILURE_EXIT_CODE);
        assert!(result.stderr.contains("handler exploded"));
    }

    #[tokio::test]
    async fn test_dispatch_sets_tool_timeout() {
        let inv = ToolInvocation::new("c1", "deadline", json!({}));
        let result = completed(run(&registry(), inv).await.unwrap());
        assert_eq!(result.stdout, "42");
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_bounds_slow_handler() {
        let start = tokio::time::Instant::now();
        let inv = ToolInvocation::new("c1", "sleepy", json!({}));
        let result = completed(run(&registry(), inv).await.unwrap());
        assert_eq!(result.exit_code, HANDLER_FAILURE_EXIT_CODE);
        assert!(result.stderr.contains("timed out after 5 seconds"));
        assert!(start.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_leaves_operator_tools_unbounded() {
        let inv = ToolInvocation::new("c1", "patient", json!({}));
        let result = completed(run(&registry(), inv).await.unwrap());
        assert!(result.is_success());
        assert_eq!(result.stdout, "woke up");
    }
}
