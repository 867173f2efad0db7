//! Conversation message types for Ferrule
//!
//! This module defines the internal message model shared by the agent loop,
//! the tool dispatcher and both wire codecs: roles, content items, tool
//! invocations and tool results.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Argument key used when an invocation's arguments were not a JSON object.
///
/// The raw payload is kept under this key so the dispatcher can report the
/// problem back to the model instead of dropping the call.
pub const INVALID_ARGUMENTS_KEY: &str = "_invalid_arguments";

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Seeded system prompt
    System,
    /// Human (or synthetic nudge) input
    User,
    /// Model output
    Assistant,
    /// Result of a tool invocation
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// A named request, with arguments, for the loop to run a specific tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Identifier assigned by the remote model; tool results echo it back
    pub id: String,
    /// Name of the tool to run
    pub name: String,
    /// Decoded arguments
    pub arguments: Map<String, Value>,
}

impl ToolInvocation {
    /// Create a new invocation.
    ///
    /// # Example
    /// ```
    /// use ferrule::conversation::ToolInvocation;
    /// use serde_json::json;
    ///
    /// let inv = ToolInvocation::new("call_1", "bash", json!({"command": "ls"}));
    /// assert_eq!(inv.arguments["command"], "ls");
    /// ```
    pub fn new(id: &str, name: &str, arguments: Value) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments_from_value(arguments),
        }
    }

    /// Decode invocation arguments from a JSON-encoded string.
    ///
    /// Unparseable payloads and payloads that are not an object are kept
    /// verbatim under [`INVALID_ARGUMENTS_KEY`].
    pub fn from_json_arguments(id: &str, name: &str, raw: &str) -> Self {
        let arguments = match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => map,
            _ => invalid_arguments(Value::String(raw.to_string())),
        };
        Self {
            id: id.to_string(),
            name: name.to_string(),
            arguments,
        }
    }

    /// Arguments as a JSON value (an object).
    pub fn arguments_value(&self) -> Value {
        Value::Object(self.arguments.clone())
    }

    /// Arguments serialized to a compact JSON string.
    pub fn arguments_json(&self) -> String {
        Value::Object(self.arguments.clone()).to_string()
    }
}

fn invalid_arguments(raw: Value) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(INVALID_ARGUMENTS_KEY.to_string(), raw);
    map
}

/// Convert any JSON value into an argument map.
pub fn arguments_from_value(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => invalid_arguments(other),
    }
}

/// One item of structured message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentItem {
    /// Plain text
    Text { value: String },
    /// Request to run a tool
    ToolInvocation(ToolInvocation),
}

/// Message content: plain text or a list of content items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Items(Vec<ContentItem>),
}

/// A single message in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    /// The role of the message sender
    pub role: Role,
    /// Text or structured content
    pub content: Content,
    /// Invocation id this message answers (tool messages only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl ConversationMessage {
    /// Create a system message.
    pub fn system(content: &str) -> Self {
        Self {
            role: Role::System,
            content: Content::Text(content.to_string()),
            correlation_id: None,
        }
    }

    /// Create a user message.
    ///
    /// # Example
    /// ```
    /// use ferrule::conversation::{ConversationMessage, Role};
    ///
    /// let msg = ConversationMessage::user("List the files");
    /// assert_eq!(msg.role, Role::User);
    /// assert_eq!(msg.text(), "List the files");
    /// ```
    pub fn user(content: &str) -> Self {
        Self {
            role: Role::User,
            content: Content::Text(content.to_string()),
            correlation_id: None,
        }
    }

    /// Create a text-only assistant message.
    pub fn assistant(content: &str) -> Self {
        Self {
            role: Role::Assistant,
            content: Content::Text(content.to_string()),
            correlation_id: None,
        }
    }

    /// Create an assistant message carrying tool invocations.
    ///
    /// This is the canonical shape both wire codecs decode into: plain text
    /// when there are no invocations, otherwise a leading text item (only if
    /// non-empty) followed by the invocations in order.
    pub fn assistant_with_invocations(text: &str, invocations: Vec<ToolInvocation>) -> Self {
        if invocations.is_empty() {
            return Self::assistant(text);
        }

        let mut items = Vec::with_capacity(invocations.len() + 1);
        if !text.is_empty() {
            items.push(ContentItem::Text {
                value: text.to_string(),
            });
        }
        items.extend(invocations.into_iter().map(ContentItem::ToolInvocation));

        Self {
            role: Role::Assistant,
            content: Content::Items(items),
            correlation_id: None,
        }
    }

    /// Rewrite an assistant message into the shape `assistant_with_invocations`
    /// builds. Text items are joined with newlines ahead of the invocations and
    /// an item list without invocations becomes plain text. Other roles are
    /// returned unchanged.
    pub fn into_canonical(self) -> Self {
        match (self.role, self.content) {
            (Role::Assistant, Content::Items(items)) => {
                let mut texts = Vec::new();
                let mut invocations = Vec::new();
                for item in items {
                    match item {
                        ContentItem::Text { value } if value.is_empty() => {}
                        ContentItem::Text { value } => texts.push(value),
                        ContentItem::ToolInvocation(inv) => invocations.push(inv),
                    }
                }
                Self {
                    correlation_id: self.correlation_id,
                    ..Self::assistant_with_invocations(&texts.join("\n"), invocations)
                }
            }
            (role, content) => Self {
                role,
                content,
                correlation_id: self.correlation_id,
            },
        }
    }

    /// Create a tool message correlated with an invocation.
    pub fn tool(invocation_id: &str, content: &str) -> Self {
        Self {
            role: Role::Tool,
            content: Content::Text(content.to_string()),
            correlation_id: Some(invocation_id.to_string()),
        }
    }

    /// Concatenated text of this message, ignoring invocations.
    pub fn text(&self) -> String {
        match &self.content {
            Content::Text(text) => text.clone(),
            Content::Items(items) => items
                .iter()
                .filter_map(|item| match item {
                    ContentItem::Text { value } => Some(value.as_str()),
                    ContentItem::ToolInvocation(_) => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Tool invocations carried by this message, in order.
    pub fn invocations(&self) -> Vec<&ToolInvocation> {
        match &self.content {
            Content::Text(_) => Vec::new(),
            Content::Items(items) => items
                .iter()
                .filter_map(|item| match item {
                    ContentItem::ToolInvocation(inv) => Some(inv),
                    ContentItem::Text { .. } => None,
                })
                .collect(),
        }
    }

    /// Whether this message requests any tool invocation.
    pub fn has_invocations(&self) -> bool {
        !self.invocations().is_empty()
    }
}

/// The outcome of one tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Id of the invocation this result answers
    pub invocation_id: String,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ToolResult {
    /// Create a result from captured output.
    pub fn new(invocation_id: &str, stdout: String, stderr: String, exit_code: i32) -> Self {
        Self {
            invocation_id: invocation_id.to_string(),
            stdout,
            stderr,
            exit_code,
        }
    }

    /// Successful result with only stdout.
    pub fn success(invocation_id: &str, stdout: impl Into<String>) -> Self {
        Self::new(invocation_id, stdout.into(), String::new(), 0)
    }

    /// Failed result with the message in stderr.
    pub fn failure(invocation_id: &str, stderr: impl Into<String>, exit_code: i32) -> Self {
        Self::new(invocation_id, String::new(), stderr.into(), exit_code)
    }

    /// Whether the tool reported success.
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    /// Render the result as the text the model sees.
    ///
    /// # Example
    /// ```
    /// use ferrule::conversation::ToolResult;
    ///
    /// let result = ToolResult::new("call_1", "out\n".into(), "warn".into(), 2);
    /// assert_eq!(result.render(), "out\n\nSTDERR:\nwarn\nExit code: 2");
    /// ```
    pub fn render(&self) -> String {
        let mut text = self.stdout.clone();
        if !self.stderr.is_empty() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str("STDERR:\n");
            text.push_str(&self.stderr);
        }
        if self.exit_code != 0 {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(&format!("Exit code: {}", self.exit_code));
        }
        text
    }

    /// Convert into the tool message appended to the conversation.
    pub fn to_message(&self) -> ConversationMessage {
        ConversationMessage::tool(&self.invocation_id, &self.render())
    }
}
