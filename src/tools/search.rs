//! Text search tool backed by ripgrep.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::Result;
use crate::process::run_program;

use super::{parse_args, Tool, ToolContext, ToolOutput};

#[derive(Debug, Deserialize)]
struct SearchArgs {
    pattern: String,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    ignore_case: bool,
    #[serde(default)]
    line_numbers: bool,
    #[serde(default)]
    files_with_matches: bool,
}

/// Search file contents with `rg`.
///
/// Exit code 1 from ripgrep means "no matches" and is passed through as is.
#[derive(Debug, Clone)]
pub struct SearchTool {
    program: String,
}

impl SearchTool {
    pub fn new() -> Self {
        Self {
            program: "rg".to_string(),
        }
    }

    /// Use a different ripgrep binary.
    pub fn with_program(program: &str) -> Self {
        Self {
            program: program.to_string(),
        }
    }

    fn build_args(args: &SearchArgs) -> Vec<String> {
        let mut argv = Vec::new();
        if args.ignore_case {
            argv.push("--ignore-case".to_string());
        }
        if args.line_numbers {
            argv.push("--line-number".to_string());
        }
        if args.files_with_matches {
            argv.push("--files-with-matches".to_string());
        }
        argv.push("--".to_string());
        argv.push(args.pattern.clone());
        if let Some(path) = args.path.as_deref().filter(|p| !p.is_empty()) {
            argv.push(path.to_string());
        }
        argv
    }
}

impl Default for SearchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Search file contents for a regular expression using ripgrep. Exit code 1 means no matches."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Regular expression to search for"
                },
                "path": {
                    "type": "string",
                    "description": "File or directory to search (default: workspace root)"
                },
                "ignore_case": {
                    "type": "boolean",
                    "description": "Match case-insensitively"
                },
                "line_numbers": {
                    "type": "boolean",
                    "description": "Prefix matches with line numbers"
                },
                "files_with_matches": {
                    "type": "boolean",
                    "description": "Only list the paths of files that match"
                }
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, args: Value, ctx: &mut ToolContext<'_>) -> Result<ToolOutput> {
        let args: SearchArgs = parse_args(self.name(), args)?;
        let argv = Self::build_args(&args);
        Ok(run_program(&self.program, &argv, &ctx.exec_options())
            .await
            .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{binary_available, Harness};

    fn args(value: Value) -> SearchArgs {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_build_args_minimal() {
        let argv = SearchTool::build_args(&args(json!({"pattern": "fn main"})));
        assert_eq!(argv, vec!["--", "fn main"]);
    }

    #[test]
    fn test_build_args_all_flags() {
        let argv = SearchTool::build_args(&args(json!({
            "pattern": "-dash",
            "path": "src",
            "ignore_case": true,
            "line_numbers": true,
            "files_with_matches": true
        })));
        assert_eq!(
            argv,
            vec![
                "--ignore-case",
                "--line-number",
                "--files-with-matches",
                "--",
                "-dash",
                "src"
            ]
        );
    }

    #[test]
    fn test_build_args_empty_path_ignored() {
        let argv = SearchTool::build_args(&args(json!({"pattern": "x", "path": ""})));
        assert_eq!(argv, vec!["--", "x"]);
    }

    #[tokio::test]
    async fn test_search_finds_and_misses() {
        if !binary_available("rg") {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("sample.txt"),
            "The word \"example\" appears here.\nFinal line.\n",
        )
        .unwrap();
        let mut h = Harness::permissive().with_workspace(dir.path());

        let hit = SearchTool::new()
            .execute(
                json!({"pattern": "EXAMPLE", "ignore_case": true, "line_numbers": true}),
                &mut h.ctx(),
            )
            .await
            .unwrap();
        assert_eq!(hit.exit_code, 0);
        assert!(hit.stdout.contains("1:"));

        let miss = SearchTool::new()
            .execute(json!({"pattern": "nonexistent-pattern-xyz"}), &mut h.ctx())
            .await
            .unwrap();
        assert_eq!(miss.exit_code, 1);
    }

    #[tokio::test]
    async fn test_search_missing_binary_reports_failure() {
        let mut h = Harness::permissive();
        let out = SearchTool::with_program("ferrule-no-such-rg")
            .execute(json!({"pattern": "x"}), &mut h.ctx())
            .await
            .unwrap();
        assert_eq!(out.exit_code, 1);
        assert!(out.stderr.contains("Failed to execute"));
    }
}
