//! Permission gate for arbitrary shell commands.
//!
//! Before a command runs, the gate extracts its leading binary. Binaries on
//! the allow-list proceed silently; anything else is put to the operator,
//! whose reply is mapped to a [`Verdict`]. Replies outside the recognised set
//! are treated as a denial.
//!
//! The operator is an injected capability ([`Operator`]), so tests drive the
//! gate with a [`ScriptedOperator`] instead of a terminal.

use std::collections::{HashMap, VecDeque};
use std::io::{self, BufRead, Write};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{FerruleError, Result};

// ============================================================================
// Operator capability
// ============================================================================

/// The human on the other side of the terminal.
///
/// Implementations only perform I/O. Interpreting the reply is the gate's job.
/// `None` means no input was available (EOF or an exhausted script).
#[async_trait]
pub trait Operator: Send + Sync {
    /// Show a command awaiting approval and return the raw reply.
    async fn confirm_command(&self, command: &str, binary: &str) -> Result<Option<String>>;

    /// Ask a free-form question and return the raw reply.
    async fn ask(&self, prompt: &str) -> Result<Option<String>>;
}

/// Operator backed by the process's stdin and stdout.
///
/// Reads happen on the blocking thread pool so the runtime is never stalled.
#[derive(Debug, Default, Clone)]
pub struct TerminalOperator;

impl TerminalOperator {
    pub fn new() -> Self {
        Self
    }

    async fn prompt_line(prompt: String) -> Result<Option<String>> {
        tokio::task::spawn_blocking(move || -> Result<Option<String>> {
            let mut stdout = io::stdout();
            stdout.write_all(prompt.as_bytes())?;
            stdout.flush()?;

            let mut input = String::new();
            let read = io::stdin().lock().read_line(&mut input)?;
            if read == 0 {
                return Ok(None);
            }
            Ok(Some(input.trim().to_string()))
        })
        .await
        .map_err(|e| FerruleError::Tool(format!("Prompt task failed: {}", e)))?
    }
}

#[async_trait]
impl Operator for TerminalOperator {
    async fn confirm_command(&self, command: &str, binary: &str) -> Result<Option<String>> {
        Self::prompt_line(format!(
            "Agent wants to execute: {}\nAllow this command? (y)es, (n)o, (a)lways allow '{}', (i)nstruct: ",
            command, binary
        ))
        .await
    }

    async fn ask(&self, prompt: &str) -> Result<Option<String>> {
        Self::prompt_line(format!("{} ", prompt.trim_end())).await
    }
}

/// Operator that replays a fixed queue of replies and records every prompt.
#[derive(Debug, Default)]
pub struct ScriptedOperator {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedOperator {
    /// Create an operator that answers with `replies` in order.
    ///
    /// # Example
    /// ```
    /// use ferrule::safety::{Operator, ScriptedOperator};
    ///
    /// # tokio_test::block_on(async {
    /// let op = ScriptedOperator::new(["y"]);
    /// assert_eq!(op.ask("ok?").await.unwrap().as_deref(), Some("y"));
    /// assert_eq!(op.ask("again?").await.unwrap(), None);
    /// # });
    /// ```
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Prompts shown so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// Replies not yet consumed.
    pub fn remaining(&self) -> usize {
        self.replies.lock().map(|r| r.len()).unwrap_or(0)
    }

    fn next(&self, prompt: String) -> Option<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt);
        }
        self.replies.lock().ok().and_then(|mut r| r.pop_front())
    }
}

#[async_trait]
impl Operator for ScriptedOperator {
    async fn confirm_command(&self, command: &str, _binary: &str) -> Result<Option<String>> {
        Ok(self.next(command.to_string()))
    }

    async fn ask(&self, prompt: &str) -> Result<Option<String>> {
        Ok(self.next(prompt.to_string()))
    }
}

// ============================================================================
// Gate
// ============================================================================

/// Outcome of a permission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Run the command.
    Allowed,
    /// Do not run the command; the reason is reported to the model.
    Denied(String),
    /// Do not run the command; the operator supplied a new instruction.
    Redirect(String),
}

/// Interactive allow/deny decision per command binary.
pub struct PermissionGate {
    allow_list: HashMap<String, bool>,
    operator: Arc<dyn Operator>,
    interactive: bool,
}

impl std::fmt::Debug for PermissionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionGate")
            .field("allow_list", &self.allowed_binaries())
            .field("interactive", &self.interactive)
            .finish()
    }
}

impl PermissionGate {
    /// Create a gate that prompts `operator` for unknown binaries.
    pub fn new(operator: Arc<dyn Operator>) -> Self {
        Self {
            allow_list: HashMap::new(),
            operator,
            interactive: true,
        }
    }

    /// Create a gate that allows every command without prompting.
    ///
    /// The operator is still reachable for clarification questions.
    pub fn non_interactive(operator: Arc<dyn Operator>) -> Self {
        Self {
            interactive: false,
            ..Self::new(operator)
        }
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    /// The injected operator.
    pub fn operator(&self) -> Arc<dyn Operator> {
        Arc::clone(&self.operator)
    }

    pub fn is_allowed(&self, binary: &str) -> bool {
        self.allow_list.get(binary).copied().unwrap_or(false)
    }

    /// Mark a binary as always allowed for the rest of the process.
    pub fn allow(&mut self, binary: &str) {
        self.allow_list.insert(binary.to_string(), true);
    }

    /// Allowed binaries, sorted.
    pub fn allowed_binaries(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .allow_list
            .iter()
            .filter(|(_, allowed)| **allowed)
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Decide whether `command` may run.
    ///
    /// Only the leading binary is consulted. Whatever follows it on the line,
    /// including `;`, `&&` or `|` chains, rides on that binary's permission.
    pub async fn check(&mut self, command: &str) -> Result<Verdict> {
        let Some(binary) = leading_binary(command) else {
            return Ok(Verdict::Denied("Permission denied - empty command".into()));
        };
        let binary = binary.to_string();

        if !self.interactive || self.is_allowed(&binary) {
            debug!(binary = %binary, "Command allowed without prompt");
            return Ok(Verdict::Allowed);
        }

        let reply = self.operator.confirm_command(command, &binary).await?;
        let Some(reply) = reply else {
            return Ok(Verdict::Denied(
                "Permission denied - no input received".into(),
            ));
        };

        let verdict = match reply.trim().to_lowercase().as_str() {
            "y" | "yes" => Verdict::Allowed,
            "n" | "no" => Verdict::Denied("Permission denied by user".into()),
            "a" | "always" => {
                self.allow(&binary);
                info!(binary = %binary, "Binary added to allow-list");
                Verdict::Allowed
            }
            "i" | "instruct" => {
                let instruction = self
                    .operator
                    .ask("Enter alternative instructions for the agent:")
                    .await?
                    .map(|s| s.trim().to_string())
                    .unwrap_or_default();
                if instruction.is_empty() {
                    Verdict::Denied(
                        "Permission denied - no alternative instructions provided".into(),
                    )
                } else {
                    Verdict::Redirect(instruction)
                }
            }
            _ => Verdict::Denied("Permission denied - invalid response".into()),
        };

        debug!(binary = %binary, verdict = ?verdict, "Permission decided");
        Ok(verdict)
    }
}

/// First whitespace token of a command line, skipping `VAR=value` prefixes.
///
/// # Example
/// ```
/// use ferrule::safety::leading_binary;
///
/// assert_eq!(leading_binary("ls -la"), Some("ls"));
/// assert_eq!(leading_binary("RUST_LOG=debug cargo test"), Some("cargo"));
/// assert_eq!(leading_binary("   "), None);
/// ```
pub fn leading_binary(command: &str) -> Option<&str> {
    command
        .split_whitespace()
        .find(|token| !is_env_assignment(token))
}

fn is_env_assignment(token: &str) -> bool {
    match token.split_once('=') {
        Some((name, _)) => {
            !name.is_empty()
                && !name.starts_with(|c: char| c.is_ascii_digit())
                && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    }
}
