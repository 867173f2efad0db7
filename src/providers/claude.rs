//! Claude (Anthropic Messages) provider: the `blocks` wire flavor
//!
//! The system prompt travels in a top-level `system` field. Assistant turns
//! are lists of `text` and `tool_use` blocks. Tool results are `tool_result`
//! blocks inside a user message; consecutive results share one message.
//!
//! # Example
//!
//! ```rust,ignore
//! use ferrule::conversation::ConversationMessage;
//! use ferrule::providers::{claude::ClaudeProvider, ChatOptions, LLMProvider};
//!
//! async fn example() {
//!     let provider = ClaudeProvider::new("your-api-key");
//!     let messages = vec![
//!         ConversationMessage::system("You MUST use tools."),
//!         ConversationMessage::user("List the files"),
//!     ];
//!     let response = provider
//!         .chat(messages, vec![], None, ChatOptions::default())
//!         .await
//!         .unwrap();
//!     println!("Claude: {}", response.content);
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::conversation::{Content, ContentItem, ConversationMessage, Role, ToolInvocation};
use crate::error::{FerruleError, Result};

use super::{parse_provider_error, ChatOptions, LLMProvider, LLMResponse, ToolDefinition, Usage};

/// Default API host; `/v1/messages` is appended.
const CLAUDE_API_BASE: &str = "https://api.anthropic.com";

/// The default Claude model to use.
pub const DEFAULT_MODEL: &str = "claude-3-7-sonnet-latest";

/// The Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

const DEFAULT_MAX_TOKENS: u32 = 8192;
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Claude/Anthropic provider.
pub struct ClaudeProvider {
    api_key: String,
    api_base: String,
    model: String,
    client: Client,
}

impl ClaudeProvider {
    /// Create a new Claude provider with the given API key.
    ///
    /// # Example
    /// ```
    /// use ferrule::providers::claude::ClaudeProvider;
    /// use ferrule::providers::LLMProvider;
    ///
    /// let provider = ClaudeProvider::new("sk-ant-api03-xxx");
    /// assert_eq!(provider.name(), "claude");
    /// ```
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            api_base: CLAUDE_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            client: build_client(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Override the default model.
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// Point at a different host (trailing slash is removed).
    pub fn with_base_url(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    /// Per-request timeout.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.client = build_client(secs);
        self
    }

    /// Use a caller-supplied HTTP client.
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    fn endpoint(&self) -> String {
        if self.api_base.ends_with("/v1") {
            format!("{}/messages", self.api_base)
        } else {
            format!("{}/v1/messages", self.api_base)
        }
    }
}

fn build_client(timeout_secs: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .build()
        .unwrap_or_else(|_| Client::new())
}

#[async_trait]
impl LLMProvider for ClaudeProvider {
    async fn chat(
        &self,
        messages: Vec<ConversationMessage>,
        tools: Vec<ToolDefinition>,
        model: Option<&str>,
        options: ChatOptions,
    ) -> Result<LLMResponse> {
        let model = model.unwrap_or(&self.model);
        let (system, claude_messages) = encode_messages(&messages)?;

        let request = ClaudeRequest {
            model: model.to_string(),
            max_tokens: options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            messages: claude_messages,
            system,
            tools: if tools.is_empty() {
                None
            } else {
                Some(convert_tools(tools))
            },
            temperature: options.temperature,
        };

        debug!(model = %model, messages = request.messages.len(), "Claude request");

        let response = self
            .client
            .post(self.endpoint())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let detail = match serde_json::from_str::<ClaudeErrorResponse>(&body) {
                Ok(err) => format!("{}: {}", err.error.r#type, err.error.message),
                Err(_) => body,
            };
            return Err(parse_provider_error(status.as_u16(), &detail).into());
        }

        parse_response(&body)
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    fn name(&self) -> &str {
        "claude"
    }
}

// ============================================================================
// Claude API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ClaudeMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ClaudeTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// A message in Claude's format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaudeMessage {
    /// `"user"` or `"assistant"`
    pub role: String,
    pub content: ClaudeContent,
}

/// Plain text or a list of content blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClaudeContent {
    Text(String),
    Blocks(Vec<ClaudeContentBlock>),
}

/// A content block within a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClaudeContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
    /// Block types this client does not model (`thinking`, ...). Skipped.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Serialize)]
struct ClaudeTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    #[serde(default)]
    content: Vec<ClaudeContentBlock>,
    usage: Option<ClaudeUsage>,
}

#[derive(Debug, Deserialize)]
struct ClaudeErrorResponse {
    error: ClaudeError,
}

#[derive(Debug, Deserialize)]
struct ClaudeError {
    r#type: String,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ClaudeUsage {
    input_tokens: u32,
    output_tokens: u32,
}

// ============================================================================
// Codec
// ============================================================================

fn user_blocks(blocks: Vec<ClaudeContentBlock>) -> ClaudeMessage {
    ClaudeMessage {
        role: "user".to_string(),
        content: ClaudeContent::Blocks(blocks),
    }
}

/// Encode the conversation into `(system, messages)`.
///
/// Tool messages are buffered into one user message of `tool_result`
/// blocks. A user message that directly follows tool results joins that
/// message as a trailing `text` block so roles keep alternating.
pub fn encode_messages(
    messages: &[ConversationMessage],
) -> Result<(Option<String>, Vec<ClaudeMessage>)> {
    let mut system: Option<String> = None;
    let mut out: Vec<ClaudeMessage> = Vec::new();
    let mut pending: Vec<ClaudeContentBlock> = Vec::new();

    for msg in messages {
        match msg.role {
            Role::System => {
                let text = msg.text();
                system = Some(match system.take() {
                    Some(prev) => format!("{}\n\n{}", prev, text),
                    None => text,
                });
            }
            Role::Tool => {
                let id = msg.correlation_id.clone().ok_or_else(|| {
                    FerruleError::Protocol("Tool message has no correlation id".into())
                })?;
                pending.push(ClaudeContentBlock::ToolResult {
                    tool_use_id: id,
                    content: msg.text(),
                });
            }
            Role::User => {
                if pending.is_empty() {
                    out.push(ClaudeMessage {
                        role: "user".to_string(),
                        content: ClaudeContent::Text(msg.text()),
                    });
                } else {
                    pending.push(ClaudeContentBlock::Text { text: msg.text() });
                    out.push(user_blocks(std::mem::take(&mut pending)));
                }
            }
            Role::Assistant => {
                if !pending.is_empty() {
                    out.push(user_blocks(std::mem::take(&mut pending)));
                }
                if let Some(content) = encode_assistant(&msg.content) {
                    out.push(ClaudeMessage {
                        role: "assistant".to_string(),
                        content,
                    });
                }
            }
        }
    }

    if !pending.is_empty() {
        out.push(user_blocks(pending));
    }

    Ok((system, out))
}

/// Encode assistant content. Empty text is not sent since the API rejects
/// empty text blocks, and an assistant turn left with nothing is omitted.
fn encode_assistant(content: &Content) -> Option<ClaudeContent> {
    match content {
        Content::Text(text) if text.is_empty() => None,
        Content::Text(text) => Some(ClaudeContent::Text(text.clone())),
        Content::Items(items) => {
            let blocks: Vec<ClaudeContentBlock> = items
                .iter()
                .filter_map(|item| match item {
                    ContentItem::Text { value } if value.is_empty() => None,
                    ContentItem::Text { value } => Some(ClaudeContentBlock::Text {
                        text: value.clone(),
                    }),
                    ContentItem::ToolInvocation(inv) => Some(ClaudeContentBlock::ToolUse {
                        id: inv.id.clone(),
                        name: inv.name.clone(),
                        input: inv.arguments_value(),
                    }),
                })
                .collect();
            if blocks.is_empty() {
                None
            } else {
                Some(ClaudeContent::Blocks(blocks))
            }
        }
    }
}

/// Decode `(system, messages)` back into the internal model.
pub fn decode_messages(
    system: Option<&str>,
    messages: &[ClaudeMessage],
) -> Result<Vec<ConversationMessage>> {
    let mut out = Vec::new();
    if let Some(system) = system {
        out.push(ConversationMessage::system(system));
    }

    for msg in messages {
        match (msg.role.as_str(), &msg.content) {
            ("user", ClaudeContent::Text(text)) => out.push(ConversationMessage::user(text)),
            ("user", ClaudeContent::Blocks(blocks)) => {
                for block in blocks {
                    match block {
                        ClaudeContentBlock::ToolResult {
                            tool_use_id,
                            content,
                        } => out.push(ConversationMessage::tool(tool_use_id, content)),
                        ClaudeContentBlock::Text { text } => {
                            out.push(ConversationMessage::user(text))
                        }
                        ClaudeContentBlock::ToolUse { .. } => {
                            return Err(FerruleError::Protocol(
                                "tool_use block inside a user message".into(),
                            ))
                        }
                        ClaudeContentBlock::Unknown => {}
                    }
                }
            }
            ("assistant", ClaudeContent::Text(text)) => {
                out.push(ConversationMessage::assistant(text))
            }
            ("assistant", ClaudeContent::Blocks(blocks)) => {
                out.push(ConversationMessage {
                    role: Role::Assistant,
                    content: Content::Items(assistant_items(blocks.iter().cloned())?),
                    correlation_id: None,
                });
            }
            (role, _) => {
                return Err(FerruleError::Protocol(format!(
                    "Unexpected message role '{}'",
                    role
                )))
            }
        }
    }

    Ok(out)
}

/// One content item per block, in wire order.
fn assistant_items(
    blocks: impl IntoIterator<Item = ClaudeContentBlock>,
) -> Result<Vec<ContentItem>> {
    let mut items = Vec::new();
    for block in blocks {
        match block {
            ClaudeContentBlock::Text { text } => items.push(ContentItem::Text { value: text }),
            ClaudeContentBlock::ToolUse { id, name, input } => {
                items.push(ContentItem::ToolInvocation(ToolInvocation::new(&id, &name, input)))
            }
            ClaudeContentBlock::ToolResult { .. } => {
                return Err(FerruleError::Protocol(
                    "tool_result block inside an assistant message".into(),
                ))
            }
            ClaudeContentBlock::Unknown => {}
        }
    }
    Ok(items)
}

fn convert_tools(tools: Vec<ToolDefinition>) -> Vec<ClaudeTool> {
    tools
        .into_iter()
        .map(|t| ClaudeTool {
            name: t.name,
            description: t.description,
            input_schema: t.parameters,
        })
        .collect()
}

/// Decode a Messages API response body.
pub fn parse_response(body: &str) -> Result<LLMResponse> {
    let response: ClaudeResponse = serde_json::from_str(body)
        .map_err(|e| FerruleError::Protocol(format!("Malformed Claude response: {}", e)))?;

    if response.content.is_empty() {
        return Err(FerruleError::Protocol(
            "Claude response contained no content blocks".into(),
        ));
    }

    let mut texts = Vec::new();
    let mut tool_calls = Vec::new();
    for item in assistant_items(response.content)? {
        match item {
            ContentItem::Text { value } => texts.push(value),
            ContentItem::ToolInvocation(inv) => tool_calls.push(inv),
        }
    }
    let mut llm_response = LLMResponse::with_tools(&texts.join("\n"), tool_calls);
    if let Some(usage) = response.usage {
        llm_response = llm_response.with_usage(Usage::new(usage.input_tokens, usage.output_tokens));
    }
    Ok(llm_response)
}

// ============================================================================
// Tests
// ============================================================================
