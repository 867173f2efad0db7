//! Source formatter tool (default `gofmt`).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{FerruleError, Result};
use crate::process::run_program;

use super::{parse_args, Tool, ToolContext, ToolOutput};

/// Default formatter binary.
pub const DEFAULT_FORMATTER: &str = "gofmt";

#[derive(Debug, Deserialize)]
struct FormatArgs {
    path: String,
    #[serde(default)]
    list: bool,
    #[serde(default)]
    diff: bool,
    #[serde(default)]
    write: bool,
}

/// Run a gofmt-style formatter on a file or directory.
///
/// The formatter must understand `-l` (list files whose formatting differs),
/// `-d` (print diffs) and `-w` (write result back to the source file).
#[derive(Debug, Clone)]
pub struct FormatTool {
    program: String,
}

impl FormatTool {
    pub fn new(program: &str) -> Result<Self> {
        let program = program.trim();
        if program.is_empty() {
            return Err(FerruleError::Config("Formatter command is empty".into()));
        }
        Ok(Self {
            program: program.to_string(),
        })
    }

    fn build_args(args: &FormatArgs) -> Vec<String> {
        let mut argv = Vec::new();
        if args.list {
            argv.push("-l".to_string());
        }
        if args.diff {
            argv.push("-d".to_string());
        }
        if args.write {
            argv.push("-w".to_string());
        }
        argv.push(args.path.clone());
        argv
    }
}

impl Default for FormatTool {
    fn default() -> Self {
        Self {
            program: DEFAULT_FORMATTER.to_string(),
        }
    }
}

#[async_trait]
impl Tool for FormatTool {
    fn name(&self) -> &str {
        "format"
    }

    fn description(&self) -> &str {
        "Format source files. Without flags the formatted source is printed; use list, diff or write to change that."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File or directory to format"
                },
                "list": {
                    "type": "boolean",
                    "description": "List files whose formatting differs"
                },
                "diff": {
                    "type": "boolean",
                    "description": "Show diffs instead of rewriting files"
                },
                "write": {
                    "type": "boolean",
                    "description": "Write the result back to the source files"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: Value, ctx: &mut ToolContext<'_>) -> Result<ToolOutput> {
        let args: FormatArgs = parse_args(self.name(), args)?;
        let argv = Self::build_args(&args);
        Ok(run_program(&self.program, &argv, &ctx.exec_options())
            .await
            .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::Harness;

    #[test]
    fn test_build_args() {
        let args: FormatArgs =
            serde_json::from_value(json!({"path": "main.go", "list": true, "write": true}))
                .unwrap();
        assert_eq!(FormatTool::build_args(&args), vec!["-l", "-w", "main.go"]);
    }

    #[test]
    fn test_empty_program_rejected() {
        assert!(FormatTool::new("").is_err());
        assert_eq!(FormatTool::default().program, "gofmt");
    }

    #[tokio::test]
    async fn test_runs_program_with_path() {
        let tool = FormatTool::new("echo").unwrap();
        let mut h = Harness::permissive();
        let out = tool
            .execute(json!({"path": "pkg/", "diff": true}), &mut h.ctx())
            .await
            .unwrap();
        assert_eq!(out.stdout.trim(), "-d pkg/");
    }

    #[tokio::test]
    async fn test_missing_path() {
        let mut h = Harness::permissive();
        let err = FormatTool::default()
            .execute(json!({"list": true}), &mut h.ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, FerruleError::InvalidArguments { .. }));
    }
}
