//! Context builder for agent conversations
//!
//! Builds the system prompt and seeds each new conversation. `RuntimeContext`
//! appends environment details (tools, workspace, platform) to the prompt.

use crate::conversation::Conversation;

/// Default system prompt for the agent.
const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a software engineering agent working on the user's machine.

You MUST use tools to complete tasks. Call one of the available tools in every response and never reply with prose alone.
Use 'bash' to run commands. Before applying an edit with 'substitute', preview it with dry_run=true.
When the task is complete, call the 'finished' tool."#;

/// Runtime details appended to the system prompt.
///
/// # Example
///
/// ```rust
/// use ferrule::agent::RuntimeContext;
///
/// let ctx = RuntimeContext::new()
///     .with_tools(vec!["bash".to_string(), "finished".to_string()])
///     .with_workspace("/home/user/project");
///
/// let rendered = ctx.render().unwrap();
/// assert!(rendered.contains("bash, finished"));
/// assert!(rendered.contains("/home/user/project"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct RuntimeContext {
    pub available_tools: Vec<String>,
    pub workspace: Option<String>,
    /// e.g. "linux x86_64"
    pub os_info: Option<String>,
}

impl RuntimeContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.available_tools = tools;
        self
    }

    pub fn with_workspace(mut self, workspace: &str) -> Self {
        self.workspace = Some(workspace.to_string());
        self
    }

    /// Fill in the OS and architecture of the current process.
    pub fn with_os_info(mut self) -> Self {
        self.os_info = Some(format!(
            "{} {}",
            std::env::consts::OS,
            std::env::consts::ARCH
        ));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.available_tools.is_empty() && self.workspace.is_none() && self.os_info.is_none()
    }

    /// Render as a markdown section, or `None` when nothing is set.
    pub fn render(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        let mut lines = vec!["## Runtime Context".to_string(), String::new()];
        if !self.available_tools.is_empty() {
            lines.push(format!("Available tools: {}", self.available_tools.join(", ")));
        }
        if let Some(ws) = &self.workspace {
            lines.push(format!("Workspace: {}", ws));
        }
        if let Some(os) = &self.os_info {
            lines.push(format!("Platform: {}", os));
        }
        Some(lines.join("\n"))
    }
}

/// Builds the system prompt and the initial conversation for an instruction.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    system_prompt: String,
    runtime: Option<RuntimeContext>,
}

impl ContextBuilder {
    /// # Example
    /// ```rust
    /// use ferrule::agent::ContextBuilder;
    ///
    /// let builder = ContextBuilder::new();
    /// assert!(builder.build_system_prompt().contains("MUST use tools"));
    /// ```
    pub fn new() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            runtime: None,
        }
    }

    /// Replace the base prompt.
    pub fn with_system_prompt(mut self, prompt: &str) -> Self {
        self.system_prompt = prompt.to_string();
        self
    }

    pub fn with_runtime_context(mut self, ctx: RuntimeContext) -> Self {
        self.runtime = Some(ctx);
        self
    }

    pub fn build_system_prompt(&self) -> String {
        match self.runtime.as_ref().and_then(RuntimeContext::render) {
            Some(section) => format!("{}\n\n{}", self.system_prompt, section),
            None => self.system_prompt.clone(),
        }
    }

    /// A fresh conversation holding the system prompt and `instruction`.
    pub fn seed(&self, instruction: &str) -> Conversation {
        Conversation::seeded(&self.build_system_prompt(), instruction)
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}
