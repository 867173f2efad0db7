//! Structural search-and-rewrite tool backed by ast-grep (`sg`).
//!
//! - Pattern mode runs `sg run --pattern P [--rewrite R] [--lang L] [PATH]`.
//! - Rule mode runs `sg scan --inline-rules RULE [PATH]`.
//!
//! Without `in_place` nothing is written; ast-grep prints the would-be diff.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{FerruleError, Result};
use crate::process::{run_program, CommandOutput};

use super::{parse_args, Tool, ToolContext, ToolOutput};

#[derive(Debug, Deserialize)]
struct AstRewriteArgs {
    pattern: String,
    #[serde(default)]
    rewrite: Option<String>,
    #[serde(default)]
    lang: Option<String>,
    #[serde(default)]
    rule: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    match_only: bool,
    #[serde(default)]
    in_place: bool,
    #[serde(default)]
    diff: bool,
}

/// Template-based structural search and rewrite.
#[derive(Debug, Clone)]
pub struct AstRewriteTool {
    program: String,
}

impl AstRewriteTool {
    pub fn new() -> Self {
        Self {
            program: "sg".to_string(),
        }
    }

    pub fn with_program(program: &str) -> Self {
        Self {
            program: program.to_string(),
        }
    }

    /// Argument vector for one ast-grep invocation.
    fn build_args(args: &AstRewriteArgs, update: bool) -> Result<Vec<String>> {
        let mut argv = Vec::new();

        if let Some(rule) = args.rule.as_deref().filter(|r| !r.trim().is_empty()) {
            argv.push("scan".to_string());
            argv.push("--inline-rules".to_string());
            argv.push(rule.to_string());
        } else {
            if args.pattern.trim().is_empty() {
                return Err(FerruleError::InvalidArguments {
                    tool: "ast_rewrite".into(),
                    reason: "pattern must not be empty".into(),
                });
            }
            argv.push("run".to_string());
            argv.push("--pattern".to_string());
            argv.push(args.pattern.clone());
            if !args.match_only {
                if let Some(rewrite) = &args.rewrite {
                    argv.push("--rewrite".to_string());
                    argv.push(rewrite.clone());
                }
            }
            if let Some(lang) = args.lang.as_deref().filter(|l| !l.is_empty()) {
                argv.push("--lang".to_string());
                argv.push(lang.to_string());
            }
        }

        if update {
            argv.push("--update-all".to_string());
        }
        if let Some(path) = args.path.as_deref().filter(|p| !p.is_empty()) {
            argv.push(path.to_string());
        }
        Ok(argv)
    }

    fn writes(args: &AstRewriteArgs) -> bool {
        args.in_place && !args.match_only && (args.rewrite.is_some() || args.rule.is_some())
    }
}

impl Default for AstRewriteTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for AstRewriteTool {
    fn name(&self) -> &str {
        "ast_rewrite"
    }

    fn description(&self) -> &str {
        "Structural code search and rewrite with ast-grep. Use $VAR metavariables in pattern and rewrite templates. \
         Without in_place the changes are only shown; with in_place and diff the diff is shown before writing."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": { "type": "string", "description": "Code pattern to match" },
                "rewrite": { "type": "string", "description": "Replacement template" },
                "lang": { "type": "string", "description": "Language of the source files" },
                "rule": { "type": "string", "description": "Inline YAML rule used instead of pattern" },
                "path": { "type": "string", "description": "File or directory to search" },
                "match_only": { "type": "boolean", "description": "Only report matches, never rewrite" },
                "in_place": { "type": "boolean", "description": "Write rewrites to disk" },
                "diff": { "type": "boolean", "description": "Show the diff (before writing when in_place)" }
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, args: Value, ctx: &mut ToolContext<'_>) -> Result<ToolOutput> {
        let args: AstRewriteArgs = parse_args(self.name(), args)?;
        let options = ctx.exec_options();

        if !Self::writes(&args) {
            let argv = Self::build_args(&args, false)?;
            return Ok(run_program(&self.program, &argv, &options).await.into());
        }

        let mut preview = CommandOutput::new(String::new(), String::new(), 0);
        if args.diff {
            preview = run_program(&self.program, &Self::build_args(&args, false)?, &options).await;
            if !preview.success() {
                return Ok(preview.into());
            }
        }

        let applied = run_program(&self.program, &Self::build_args(&args, true)?, &options).await;
        Ok(ToolOutput {
            stdout: format!("{}{}", preview.stdout, applied.stdout),
            stderr: format!("{}{}", preview.stderr, applied.stderr),
            exit_code: applied.exit_code,
            signal: None,
        })
    }
}
