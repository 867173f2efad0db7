//! Tools module - Tool definitions and dispatch for model function calling
//!
//! Tools are the only way the model acts on the machine. Each tool decodes
//! its own typed arguments, runs, and reports `(stdout, stderr, exit_code)`.
//!
//! # Overview
//!
//! - `Tool` trait: The interface that all tools must implement
//! - `ToolContext`: Per-call context (workspace, timeout, safety state)
//! - `ToolRegistry`: Holds the tools and dispatches invocations to them
//!
//! # Built-in Tools
//!
//! - `BashTool`: Permission-gated shell execution
//! - `SearchTool`: ripgrep text search
//! - `SubstituteTool`: Regex replace behind the mutation guard
//! - `AstRewriteTool`: ast-grep structural rewrite
//! - `FormatTool`: Source formatter
//! - `DocLookupTool`: Documentation lookup
//! - `ChecklistTool`: `TODO.md` checklist manager
//! - `AskHumanTool`: Clarifying question to the operator
//! - `FinishedTool`: End-of-task sentinel

pub mod ask_human;
pub mod ast_rewrite;
pub mod checklist;
pub mod docs;
pub mod finished;
pub mod format;
mod registry;
pub mod search;
pub mod shell;
pub mod substitute;
mod types;

use std::time::Duration;

pub use ask_human::AskHumanTool;
pub use ast_rewrite::AstRewriteTool;
pub use checklist::{ChecklistTool, DEFAULT_CHECKLIST_FILE};
pub use docs::{DocLookupTool, DEFAULT_DOC_COMMAND};
pub use finished::{FinishedTool, FINISHED_TOOL};
pub use format::{FormatTool, DEFAULT_FORMATTER};
pub use registry::{Dispatch, ToolRegistry, HANDLER_FAILURE_EXIT_CODE, INVALID_ARGUMENTS_EXIT_CODE};
pub use search::SearchTool;
pub use shell::BashTool;
pub use substitute::SubstituteTool;
pub use types::{parse_args, Tool, ToolContext, ToolOutput, ToolSignal};

use crate::config::ToolsConfig;
use crate::error::Result;

/// Build a registry holding every built-in tool, configured from `config`.
pub fn default_registry(config: &ToolsConfig) -> Result<ToolRegistry> {
    let mut registry =
        ToolRegistry::new().with_default_timeout(Duration::from_secs(config.timeout_secs.max(1)));

    registry.register(Box::new(BashTool));
    registry.register(Box::new(DocLookupTool::from_command(&config.doc_command)?));
    registry.register(Box::new(SearchTool::with_program(&config.search_command)));
    registry.register(Box::new(SubstituteTool));
    registry.register(Box::new(AstRewriteTool::with_program(&config.ast_rewrite_command)));
    registry.register(Box::new(FormatTool::new(&config.format_command)?));
    registry.register(Box::new(ChecklistTool::new(&config.checklist_path)));
    registry.register(Box::new(AskHumanTool));
    registry.register(Box::new(FinishedTool));

    Ok(registry)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    use crate::safety::{MutationGuard, PermissionGate, ScriptedOperator};

    use super::ToolContext;

    /// Owns the safety state a `ToolContext` borrows.
    pub struct Harness {
        pub guard: MutationGuard,
        pub gate: PermissionGate,
        workspace: Option<PathBuf>,
    }

    impl Harness {
        /// Gate that never prompts.
        pub fn permissive() -> Self {
            Self {
                guard: MutationGuard::new(),
                gate: PermissionGate::non_interactive(Arc::new(ScriptedOperator::default())),
                workspace: None,
            }
        }

        /// Interactive gate answered from `replies`.
        pub fn scripted(replies: &[&str]) -> (Self, Arc<ScriptedOperator>) {
            let operator = Arc::new(ScriptedOperator::new(replies.iter().copied()));
            let harness = Self {
                guard: MutationGuard::new(),
                gate: PermissionGate::new(operator.clone()),
                workspace: None,
            };
            (harness, operator)
        }

        pub fn with_workspace(mut self, dir: &Path) -> Self {
            self.workspace = Some(dir.to_path_buf());
            self
        }

        pub fn ctx(&mut self) -> ToolContext<'_> {
            let ctx = ToolContext::new(&mut self.guard, &mut self.gate);
            match &self.workspace {
                Some(ws) => ctx.with_workspace(ws.clone()),
                None => ctx,
            }
        }
    }

    /// Whether `name` resolves to an executable on PATH.
    pub fn binary_available(name: &str) -> bool {
        std::env::var_os("PATH")
            .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(name).is_file()))
            .unwrap_or(false)
    }
}
