//! Documentation lookup tool.
//!
//! Runs a configurable documentation command (by default `go doc`) with the
//! requested symbol appended.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{FerruleError, Result};
use crate::process::run_program;

use super::{parse_args, Tool, ToolContext, ToolOutput};

/// Default documentation command.
pub const DEFAULT_DOC_COMMAND: &str = "go doc";

#[derive(Debug, Deserialize)]
struct DocArgs {
    symbol: String,
}

/// Look up documentation for a package or symbol.
#[derive(Debug, Clone)]
pub struct DocLookupTool {
    program: String,
    base_args: Vec<String>,
}

impl DocLookupTool {
    /// Build from a command line such as `"go doc"` or `"pydoc3"`.
    pub fn from_command(command: &str) -> Result<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| FerruleError::Config("Documentation command is empty".into()))?;
        Ok(Self {
            program,
            base_args: parts.collect(),
        })
    }

    fn argv(&self, symbol: &str) -> Vec<String> {
        let mut argv = self.base_args.clone();
        argv.push(symbol.to_string());
        argv
    }
}

impl Default for DocLookupTool {
    fn default() -> Self {
        Self {
            program: "go".to_string(),
            base_args: vec!["doc".to_string()],
        }
    }
}

#[async_trait]
impl Tool for DocLookupTool {
    fn name(&self) -> &str {
        "doc_lookup"
    }

    fn description(&self) -> &str {
        "Show documentation for a package or symbol (e.g. 'fmt' or 'fmt.Println')"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "symbol": {
                    "type": "string",
                    "description": "Package or symbol to document"
                }
            },
            "required": ["symbol"]
        })
    }

    async fn execute(&self, args: Value, ctx: &mut ToolContext<'_>) -> Result<ToolOutput> {
        let args: DocArgs = parse_args(self.name(), args)?;
        if args.symbol.trim().is_empty() {
            return Err(FerruleError::InvalidArguments {
                tool: self.name().to_string(),
                reason: "symbol must not be empty".into(),
            });
        }
        Ok(run_program(&self.program, &self.argv(&args.symbol), &ctx.exec_options())
            .await
            .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::Harness;

    #[test]
    fn test_default_is_go_doc() {
        let tool = DocLookupTool::default();
        assert_eq!(tool.program, "go");
        assert_eq!(tool.argv("fmt.Println"), vec!["doc", "fmt.Println"]);
    }

    #[test]
    fn test_from_command() {
        let tool = DocLookupTool::from_command("python3 -m pydoc").unwrap();
        assert_eq!(tool.program, "python3");
        assert_eq!(tool.argv("json"), vec!["-m", "pydoc", "json"]);
        assert!(DocLookupTool::from_command("  ").is_err());
    }

    #[tokio::test]
    async fn test_runs_configured_command() {
        let tool = DocLookupTool::from_command("echo docs for").unwrap();
        let mut h = Harness::permissive();
        let out = tool
            .execute(json!({"symbol": "fmt"}), &mut h.ctx())
            .await
            .unwrap();
        assert_eq!(out.stdout.trim(), "docs for fmt");
    }

    #[tokio::test]
    async fn test_empty_symbol_rejected() {
        let mut h = Harness::permissive();
        let err = DocLookupTool::default()
            .execute(json!({"symbol": " "}), &mut h.ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, FerruleError::InvalidArguments { .. }));
    }
}
