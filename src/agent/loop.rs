//! Agent loop implementation
//!
//! Drives one instruction to completion: call the model, run the tools it
//! asks for, feed the results back, and stop when it invokes `finished`.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::conversation::{Conversation, ConversationMessage, ToolInvocation, ToolResult};
use crate::error::{FerruleError, Result};
use crate::providers::{ChatOptions, LLMProvider, ToolDefinition};
use crate::safety::{MutationGuard, PermissionGate};
use crate::tools::{Dispatch, ToolContext, ToolRegistry};

use super::context::ContextBuilder;

/// User message sent when the model replies without invoking a tool.
pub const NUDGE_MESSAGE: &str = "You must use either the 'bash' tool to execute commands or the 'finished' tool to complete the task. Please call one of the available tools.";

/// Result text for invocations dropped after an operator redirect.
pub const SKIPPED_MESSAGE: &str = "Skipped: the operator provided alternative instructions";

/// Default cap on model calls per instruction.
pub const DEFAULT_MAX_TURNS: u32 = 100;

/// Where the loop is between steps.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopState {
    /// Next step is a model call.
    AwaitingModel,
    /// The model answered with prose only.
    Nudge,
    /// The model asked for these invocations, in order.
    Dispatch(Vec<ToolInvocation>),
    /// `finished` was invoked.
    Terminated,
}

/// Summary of a completed instruction.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Identifier attached to every log line of the run.
    pub run_id: String,
    /// Number of model calls made.
    pub turns: u32,
    /// Number of nudges sent.
    pub nudges: u32,
    /// Number of invocations dispatched, `finished` included.
    pub tool_calls: u32,
    /// Full message history at termination.
    pub transcript: Vec<ConversationMessage>,
}

/// The main agent loop.
///
/// Owns the process-lifetime safety state (mutation guard and permission
/// gate), so approvals and the allow-list carry over between instructions
/// handled by the same loop.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use ferrule::agent::AgentLoop;
/// use ferrule::config::ToolsConfig;
/// use ferrule::providers::ClaudeProvider;
/// use ferrule::safety::{PermissionGate, TerminalOperator};
/// use ferrule::tools::default_registry;
///
/// async fn run() -> ferrule::error::Result<()> {
///     let provider = Arc::new(ClaudeProvider::new("your-api-key"));
///     let tools = default_registry(&ToolsConfig::default())?;
///     let gate = PermissionGate::new(Arc::new(TerminalOperator::new()));
///     let mut agent = AgentLoop::new(provider, tools, gate);
///     let outcome = agent.run("Count the Rust files in src/").await?;
///     println!("done after {} turns", outcome.turns);
///     Ok(())
/// }
/// ```
pub struct AgentLoop {
    provider: Arc<dyn LLMProvider>,
    tools: ToolRegistry,
    guard: MutationGuard,
    gate: PermissionGate,
    context_builder: ContextBuilder,
    workspace: Option<PathBuf>,
    model: Option<String>,
    options: ChatOptions,
    max_turns: u32,
}

impl AgentLoop {
    pub fn new(provider: Arc<dyn LLMProvider>, tools: ToolRegistry, gate: PermissionGate) -> Self {
        Self {
            provider,
            tools,
            guard: MutationGuard::new(),
            gate,
            context_builder: ContextBuilder::new(),
            workspace: None,
            model: None,
            options: ChatOptions::new(),
            max_turns: DEFAULT_MAX_TURNS,
        }
    }

    pub fn with_context_builder(mut self, context_builder: ContextBuilder) -> Self {
        self.context_builder = context_builder;
        self
    }

    /// Directory tools resolve relative paths against and run in.
    pub fn with_workspace(mut self, workspace: impl Into<PathBuf>) -> Self {
        self.workspace = Some(workspace.into());
        self
    }

    /// Model override; the provider default is used otherwise.
    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn with_chat_options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }

    /// Cap on model calls per instruction; 0 disables the cap.
    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn guard(&self) -> &MutationGuard {
        &self.guard
    }

    pub fn gate(&self) -> &PermissionGate {
        &self.gate
    }

    /// Work on `instruction` until the model invokes `finished`.
    ///
    /// # Errors
    /// Remote failures that survive retries, protocol violations (including
    /// an invocation of an unregistered tool) and the turn limit. Tool
    /// failures never surface here; they are reported to the model.
    pub async fn run(&mut self, instruction: &str) -> Result<RunOutcome> {
        let run_id = Uuid::new_v4().to_string();
        let span = info_span!("agent_run", run_id = %run_id, provider = self.provider.name());
        let result = self.run_inner(instruction, run_id).instrument(span).await;
        if let Err(e) = &result {
            error!(error = %e, "Agent run terminated with error");
        }
        result
    }

    async fn run_inner(&mut self, instruction: &str, run_id: String) -> Result<RunOutcome> {
        let mut conversation = self.context_builder.seed(instruction);
        let definitions = self.tools.definitions();
        let mut state = LoopState::AwaitingModel;
        let (mut turns, mut nudges, mut tool_calls) = (0u32, 0u32, 0u32);

        info!(tools = definitions.len(), "Starting agent run");

        loop {
            state = match state {
                LoopState::AwaitingModel => {
                    if self.max_turns > 0 && turns >= self.max_turns {
                        return Err(FerruleError::TurnLimit(turns));
                    }
                    turns += 1;
                    self.call_model(&mut conversation, &definitions, turns).await?
                }
                LoopState::Nudge => {
                    nudges += 1;
                    warn!(turn = turns, "Model replied without a tool call, nudging");
                    conversation.push_user(NUDGE_MESSAGE)?;
                    LoopState::AwaitingModel
                }
                LoopState::Dispatch(invocations) => {
                    let (dispatched, finished) =
                        self.dispatch_batch(&mut conversation, invocations).await?;
                    tool_calls += dispatched;
                    if finished {
                        LoopState::Terminated
                    } else {
                        LoopState::AwaitingModel
                    }
                }
                LoopState::Terminated => break,
            };
        }

        info!(turns, nudges, tool_calls, "Agent run finished");
        Ok(RunOutcome {
            run_id,
            turns,
            nudges,
            tool_calls,
            transcript: conversation.into_messages(),
        })
    }

    async fn call_model(
        &self,
        conversation: &mut Conversation,
        definitions: &[ToolDefinition],
        turn: u32,
    ) -> Result<LoopState> {
        debug!(turn, messages = conversation.len(), "Calling model");
        let response = self
            .provider
            .chat(
                conversation.messages().to_vec(),
                definitions.to_vec(),
                self.model.as_deref(),
                self.options.clone(),
            )
            .await?;

        if let Some(usage) = &response.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Token usage"
            );
        }
        if !response.content.is_empty() {
            info!(turn, text = %response.content, "Assistant");
        }

        let invocations = response.tool_calls.clone();
        conversation.push_assistant(response.into_message())?;

        Ok(if invocations.is_empty() {
            LoopState::Nudge
        } else {
            LoopState::Dispatch(invocations)
        })
    }

    /// Run a batch in order. Returns how many invocations ran and whether
    /// `finished` was reached.
    async fn dispatch_batch(
        &mut self,
        conversation: &mut Conversation,
        invocations: Vec<ToolInvocation>,
    ) -> Result<(u32, bool)> {
        let mut dispatched = 0;
        let mut redirect: Option<String> = None;

        for invocation in invocations {
            if redirect.is_some() {
                debug!(tool = %invocation.name, id = %invocation.id, "Skipping after redirect");
                conversation
                    .push_tool_result(&ToolResult::failure(&invocation.id, SKIPPED_MESSAGE, 1))?;
                continue;
            }

            info!(tool = %invocation.name, id = %invocation.id, "Executing tool");
            dispatched += 1;

            let mut ctx = ToolContext::new(&mut self.guard, &mut self.gate);
            if let Some(ws) = &self.workspace {
                ctx = ctx.with_workspace(ws.clone());
            }

            match self.tools.dispatch(&invocation, &mut ctx).await? {
                Dispatch::Completed(result) => conversation.push_tool_result(&result)?,
                Dispatch::Redirected {
                    result,
                    instruction,
                } => {
                    info!(tool = %invocation.name, "Operator redirected the agent");
                    conversation.push_tool_result(&result)?;
                    redirect = Some(instruction);
                }
                Dispatch::Finished => {
                    info!("Agent finished the task");
                    return Ok((dispatched, true));
                }
            }
        }

        if let Some(instruction) = redirect {
            conversation.push_user(&instruction)?;
        }
        Ok((dispatched, false))
    }
}
