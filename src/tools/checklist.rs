//! Checklist file manager.
//!
//! The checklist is a markdown file with a `# TODO` heading followed by
//! `- [ ] text` (pending) and `- [x] text` (done) lines. Items are
//! addressed by substring match.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{FerruleError, Result};

use super::{parse_args, Tool, ToolContext, ToolOutput};

/// Default checklist file name, resolved against the workspace.
pub const DEFAULT_CHECKLIST_FILE: &str = "TODO.md";

pub const HEADING: &str = "# TODO";
const PENDING: &str = "- [ ] ";
const DONE: &str = "- [x] ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Action {
    Read,
    Write,
    Add,
    Complete,
    Update,
}

#[derive(Debug, Deserialize)]
struct ChecklistArgs {
    action: Action,
    #[serde(default)]
    content: Option<String>,
}

// ============================================================================
// Pure edits
// ============================================================================

fn split_item(line: &str) -> Option<(&'static str, &str)> {
    if let Some(text) = line.strip_prefix(PENDING) {
        Some((PENDING, text))
    } else {
        line.strip_prefix(DONE).map(|text| (DONE, text))
    }
}

fn join_lines(lines: &[String]) -> String {
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Append a pending item, adding the heading when the checklist is blank.
pub fn add_item(checklist: &str, item: &str) -> String {
    let mut out = if checklist.trim().is_empty() {
        format!("{}\n\n", HEADING)
    } else if checklist.ends_with('\n') {
        checklist.to_string()
    } else {
        format!("{}\n", checklist)
    };
    out.push_str(PENDING);
    out.push_str(item);
    out.push('\n');
    out
}

/// Mark the first pending item containing `needle` as done.
pub fn complete_item(checklist: &str, needle: &str) -> Result<String> {
    let mut lines: Vec<String> = checklist.lines().map(str::to_string).collect();
    let index = lines
        .iter()
        .position(|line| {
            line.strip_prefix(PENDING)
                .is_some_and(|text| text.contains(needle))
        })
        .ok_or_else(|| FerruleError::Tool(format!("No pending item matching '{}'", needle)))?;
    lines[index] = lines[index].replacen(PENDING, DONE, 1);
    Ok(join_lines(&lines))
}

/// Apply an `<old> -> <new>` rename to the first item containing `<old>`.
///
/// Both sides are taken verbatim, whitespace included. The item's marker is
/// kept, so a done item stays done.
pub fn update_item(checklist: &str, edit: &str) -> Result<String> {
    let (old, new) = edit
        .split_once(" -> ")
        .filter(|(o, n)| !o.is_empty() && !n.is_empty())
        .ok_or_else(|| FerruleError::InvalidArguments {
            tool: "checklist".into(),
            reason: format!("update expects '<old> -> <new>', got '{}'", edit),
        })?;

    let mut lines: Vec<String> = checklist.lines().map(str::to_string).collect();
    let (index, marker) = lines
        .iter()
        .enumerate()
        .find_map(|(i, line)| match split_item(line) {
            Some((marker, text)) if text.contains(old) => Some((i, marker)),
            _ => None,
        })
        .ok_or_else(|| FerruleError::Tool(format!("No item matching '{}'", old)))?;
    lines[index] = format!("{}{}", marker, new);
    Ok(join_lines(&lines))
}

// ============================================================================
// Tool
// ============================================================================

/// Read and edit the checklist file.
#[derive(Debug, Clone)]
pub struct ChecklistTool {
    file: PathBuf,
}

impl ChecklistTool {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self { file: file.into() }
    }

    async fn load(path: &std::path::Path) -> Result<String> {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn require_content(args: &ChecklistArgs) -> Result<&str> {
        args.content
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| FerruleError::InvalidArguments {
                tool: "checklist".into(),
                reason: "content is required for this action".into(),
            })
    }
}

impl Default for ChecklistTool {
    fn default() -> Self {
        Self::new(DEFAULT_CHECKLIST_FILE)
    }
}

#[async_trait]
impl Tool for ChecklistTool {
    fn name(&self) -> &str {
        "checklist"
    }

    fn description(&self) -> &str {
        "Manage the task checklist. Actions: read, write (replace the whole file), add (append a \
         pending item), complete (mark the first pending item containing content as done), \
         update (content is '<old> -> <new>')."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["read", "write", "add", "complete", "update"],
                    "description": "Operation to perform"
                },
                "content": {
                    "type": "string",
                    "description": "Item text, full file content for write, or '<old> -> <new>' for update"
                }
            },
            "required": ["action"]
        })
    }

    async fn execute(&self, args: Value, ctx: &mut ToolContext<'_>) -> Result<ToolOutput> {
        let args: ChecklistArgs = parse_args(self.name(), args)?;
        let path = ctx.resolve_path(&self.file.to_string_lossy());
        let current = Self::load(&path).await?;
        debug!(action = ?args.action, path = %path.display(), "Checklist action");

        let (updated, message) = match args.action {
            Action::Read => {
                if current.trim().is_empty() {
                    return Ok(ToolOutput::text("Checklist is empty"));
                }
                return Ok(ToolOutput::text(current));
            }
            Action::Write => {
                let content = args.content.clone().unwrap_or_default();
                (content, "Checklist written".to_string())
            }
            Action::Add => {
                let item = Self::require_content(&args)?;
                (add_item(&current, item), format!("Added: {}", item))
            }
            Action::Complete => {
                let item = Self::require_content(&args)?;
                (complete_item(&current, item)?, format!("Completed: {}", item))
            }
            Action::Update => {
                let edit = Self::require_content(&args)?;
                (update_item(&current, edit)?, format!("Updated: {}", edit))
            }
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(&path, updated).await?;
        Ok(ToolOutput::text(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::Harness;

    #[test]
    fn test_add_to_blank_creates_heading() {
        assert_eq!(add_item("", "Task 1"), "# TODO\n\n- [ ] Task 1\n");
        assert_eq!(
            add_item("# TODO\n\n- [ ] a", "b"),
            "# TODO\n\n- [ ] a\n- [ ] b\n"
        );
    }

    #[test]
    fn test_complete_skips_done_items() {
        let list = "# TODO\n\n- [x] Task 1\n- [ ] Task 1 again\n";
        assert_eq!(
            complete_item(list, "Task 1").unwrap(),
            "# TODO\n\n- [x] Task 1\n- [x] Task 1 again\n"
        );
        assert!(complete_item("# TODO\n\n- [x] only\n", "only").is_err());
    }

    #[test]
    fn test_update_preserves_marker() {
        let list = "# TODO\n\n- [x] Task 1\n";
        assert_eq!(
            update_item(list, "Task 1 -> Task 1 revised").unwrap(),
            "# TODO\n\n- [x] Task 1 revised\n"
        );
    }

    #[test]
    fn test_update_ignores_heading() {
        let list = "# TODO\n\n- [ ] write TODO docs\n";
        assert_eq!(
            update_item(list, "TODO -> notes").unwrap(),
            "# TODO\n\n- [ ] notes\n"
        );
    }

    #[test]
    fn test_update_matches_whitespace_verbatim() {
        let list = "# TODO\n\n- [ ] Task 1\n- [ ] Task 10 ship\n";
        assert_eq!(
            update_item(list, "Task 1  -> Task 1b").unwrap_err().to_string(),
            "Tool error: No item matching 'Task 1 '"
        );
        assert_eq!(
            update_item(list, " ship -> Task 10 shipped").unwrap(),
            "# TODO\n\n- [ ] Task 1\n- [ ] Task 10 shipped\n"
        );
        assert_eq!(
            update_item(list, "Task 1 ->  spaced").unwrap(),
            "# TODO\n\n- [ ]  spaced\n- [ ] Task 10 ship\n"
        );
    }

    #[test]
    fn test_update_requires_arrow() {
        let err = update_item("- [ ] a\n", "a to b").unwrap_err();
        assert!(matches!(err, FerruleError::InvalidArguments { .. }));
        assert!(matches!(
            update_item("- [ ] a\n", "zzz -> b"),
            Err(FerruleError::Tool(_))
        ));
    }

    #[tokio::test]
    async fn test_tool_add_complete_update() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("TODO.md"), "").unwrap();
        let mut h = Harness::permissive().with_workspace(dir.path());
        let tool = ChecklistTool::default();

        for args in [
            json!({"action": "add", "content": "Task 1"}),
            json!({"action": "complete", "content": "Task 1"}),
            json!({"action": "update", "content": "Task 1 -> Task 1 revised"}),
        ] {
            let out = tool.execute(args, &mut h.ctx()).await.unwrap();
            assert_eq!(out.exit_code, 0);
        }

        let read = tool
            .execute(json!({"action": "read"}), &mut h.ctx())
            .await
            .unwrap();
        assert_eq!(read.stdout, "# TODO\n\n- [x] Task 1 revised\n");
    }

    #[tokio::test]
    async fn test_tool_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut h = Harness::permissive().with_workspace(dir.path());
        let out = ChecklistTool::default()
            .execute(json!({"action": "read"}), &mut h.ctx())
            .await
            .unwrap();
        assert_eq!(out.stdout, "Checklist is empty");
    }

    #[tokio::test]
    async fn test_tool_write_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let mut h = Harness::permissive().with_workspace(dir.path());
        let tool = ChecklistTool::new("plan/list.md");
        tool.execute(
            json!({"action": "write", "content": "# TODO\n\n- [ ] fresh\n"}),
            &mut h.ctx(),
        )
        .await
        .unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("plan/list.md")).unwrap(),
            "# TODO\n\n- [ ] fresh\n"
        );
    }

    #[tokio::test]
    async fn test_tool_unknown_action() {
        let mut h = Harness::permissive();
        let err = ChecklistTool::default()
            .execute(json!({"action": "delete"}), &mut h.ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, FerruleError::InvalidArguments { .. }));
    }
}
