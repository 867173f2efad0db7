//! In-place substitution tool, gated by the mutation guard.
//!
//! `dry_run: true` previews the substitution and records approval for the
//! exact arguments. `dry_run: false` applies it only if that approval exists.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::Result;

use super::{parse_args, Tool, ToolContext, ToolOutput};

#[derive(Debug, Deserialize)]
struct SubstituteArgs {
    file_path: String,
    search_pattern: String,
    replace_pattern: String,
    dry_run: bool,
}

/// Regex search-and-replace over a single file.
#[derive(Debug, Default, Clone, Copy)]
pub struct SubstituteTool;

#[async_trait]
impl Tool for SubstituteTool {
    fn name(&self) -> &str {
        "substitute"
    }

    fn description(&self) -> &str {
        "Replace every match of a regular expression in a file. Always call with dry_run=true first \
         to preview the diff, then call again with identical arguments and dry_run=false to apply. \
         The replacement may reference capture groups as $1, $2, ..."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "File to edit"
                },
                "search_pattern": {
                    "type": "string",
                    "description": "Regular expression to search for"
                },
                "replace_pattern": {
                    "type": "string",
                    "description": "Replacement text"
                },
                "dry_run": {
                    "type": "boolean",
                    "description": "Preview only (true) or apply a previewed change (false)"
                }
            },
            "required": ["file_path", "search_pattern", "replace_pattern", "dry_run"]
        })
    }

    async fn execute(&self, args: Value, ctx: &mut ToolContext<'_>) -> Result<ToolOutput> {
        let args: SubstituteArgs = parse_args(self.name(), args)?;
        let target = ctx.resolve_path(&args.file_path);

        if args.dry_run {
            let preview = ctx
                .guard
                .preview(&target, &args.search_pattern, &args.replace_pattern)
                .await?;
            let body = if preview.replacements == 0 {
                "No matches: the file would not change.\n".to_string()
            } else {
                preview.diff
            };
            Ok(ToolOutput::text(format!(
                "{}\nPreview recorded ({} replacement(s)). Call again with dry_run=false and identical arguments to apply.",
                body, preview.replacements
            )))
        } else {
            let applied = ctx
                .guard
                .apply(&target, &args.search_pattern, &args.replace_pattern)
                .await?;
            Ok(ToolOutput::text(format!(
                "Applied {} replacement(s) to {}",
                applied.replacements, args.file_path
            )))
        }
    }
}
