//! Provider types for Ferrule
//!
//! This module defines the core types and traits for model providers:
//! the `LLMProvider` trait, chat options, the wire flavor selector and
//! response types.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::conversation::{ConversationMessage, ToolInvocation};
use crate::error::{FerruleError, Result};

/// Definition of a tool that can be called by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The name of the tool (must be unique)
    pub name: String,
    /// Human-readable description of what the tool does
    pub description: String,
    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    /// Create a new tool definition.
    ///
    /// # Example
    /// ```
    /// use ferrule::providers::ToolDefinition;
    /// use serde_json::json;
    ///
    /// let tool = ToolDefinition::new(
    ///     "search",
    ///     "Search file contents",
    ///     json!({
    ///         "type": "object",
    ///         "properties": {
    ///             "pattern": { "type": "string", "description": "Regex" }
    ///         },
    ///         "required": ["pattern"]
    ///     }),
    /// );
    /// assert_eq!(tool.name, "search");
    /// ```
    pub fn new(name: &str, description: &str, parameters: serde_json::Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        }
    }
}

/// Which tool-calling wire shape the remote service speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireFlavor {
    /// Anthropic Messages: content blocks with `tool_use` / `tool_result`.
    #[default]
    Blocks,
    /// OpenAI Chat Completions: `tool_calls` array and `role: tool` replies.
    ToolCalls,
}

impl WireFlavor {
    /// Environment variable holding this flavor's API key.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Self::Blocks => "ANTHROPIC_API_KEY",
            Self::ToolCalls => "OPENAI_API_KEY",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blocks => "blocks",
            Self::ToolCalls => "tool_calls",
        }
    }
}

impl fmt::Display for WireFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WireFlavor {
    type Err = FerruleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "blocks" | "anthropic" | "claude" => Ok(Self::Blocks),
            "tool_calls" | "tool-calls" | "openai" => Ok(Self::ToolCalls),
            other => Err(FerruleError::Config(format!(
                "Unknown wire flavor '{}' (expected 'blocks' or 'tool_calls')",
                other
            ))),
        }
    }
}

/// Trait for model providers.
///
/// A provider owns one wire codec: it encodes the internal conversation into
/// its request shape, performs the call, and decodes the reply.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Send the conversation and available tools, returning the next
    /// assistant turn.
    async fn chat(
        &self,
        messages: Vec<ConversationMessage>,
        tools: Vec<ToolDefinition>,
        model: Option<&str>,
        options: ChatOptions,
    ) -> Result<LLMResponse>;

    /// Get the default model for this provider.
    fn default_model(&self) -> &str;

    /// Get the provider name.
    fn name(&self) -> &str;
}

/// Options for chat completion requests.
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    /// Maximum number of tokens to generate
    pub max_tokens: Option<u32>,
    /// Temperature for sampling
    pub temperature: Option<f32>,
}

impl ChatOptions {
    /// Create new default chat options.
    ///
    /// # Example
    /// ```
    /// use ferrule::providers::ChatOptions;
    ///
    /// let options = ChatOptions::new().with_max_tokens(1000);
    /// assert_eq!(options.max_tokens, Some(1000));
    /// assert!(options.temperature.is_none());
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// A decoded assistant turn.
#[derive(Debug, Clone, PartialEq)]
pub struct LLMResponse {
    /// Text content of the response
    pub content: String,
    /// Tool invocations requested by the model, in order
    pub tool_calls: Vec<ToolInvocation>,
    /// Token usage information (if available)
    pub usage: Option<Usage>,
}

impl LLMResponse {
    /// A text-only response.
    ///
    /// # Example
    /// ```
    /// use ferrule::providers::LLMResponse;
    ///
    /// let response = LLMResponse::text("Hello, world!");
    /// assert!(!response.has_tool_calls());
    /// ```
    pub fn text(content: &str) -> Self {
        Self {
            content: content.to_string(),
            tool_calls: vec![],
            usage: None,
        }
    }

    /// A response carrying tool invocations.
    pub fn with_tools(content: &str, tool_calls: Vec<ToolInvocation>) -> Self {
        Self {
            content: content.to_string(),
            tool_calls,
            usage: None,
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Convert into the assistant message appended to the conversation.
    pub fn into_message(self) -> ConversationMessage {
        ConversationMessage::assistant_with_invocations(&self.content, self.tool_calls)
    }
}

/// Token usage information from a completion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    /// # Example
    /// ```
    /// use ferrule::providers::Usage;
    ///
    /// let usage = Usage::new(100, 50);
    /// assert_eq!(usage.total_tokens, 150);
    /// ```
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::{Content, ContentItem, Role};
    use serde_json::json;

    #[test]
    fn test_wire_flavor_parse() {
        assert_eq!("blocks".parse::<WireFlavor>().unwrap(), WireFlavor::Blocks);
        assert_eq!("OpenAI".parse::<WireFlavor>().unwrap(), WireFlavor::ToolCalls);
        assert_eq!(
            "tool_calls".parse::<WireFlavor>().unwrap(),
            WireFlavor::ToolCalls
        );
        assert!("grpc".parse::<WireFlavor>().is_err());
    }

    #[test]
    fn test_wire_flavor_serde() {
        assert_eq!(
            serde_json::to_string(&WireFlavor::ToolCalls).unwrap(),
            "\"tool_calls\""
        );
        let parsed: WireFlavor = serde_json::from_str("\"blocks\"").unwrap();
        assert_eq!(parsed, WireFlavor::Blocks);
        assert_eq!(WireFlavor::default().to_string(), "blocks");
    }

    #[test]
    fn test_wire_flavor_key_env() {
        assert_eq!(WireFlavor::Blocks.api_key_env(), "ANTHROPIC_API_KEY");
        assert_eq!(WireFlavor::ToolCalls.api_key_env(), "OPENAI_API_KEY");
    }

    #[test]
    fn test_response_into_message_text_only() {
        let message = LLMResponse::text("just talking").into_message();
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.content, Content::Text("just talking".into()));
    }

    #[test]
    fn test_response_into_message_with_tools() {
        let call = ToolInvocation::new("call_1", "bash", json!({"command": "ls"}));
        let message = LLMResponse::with_tools("", vec![call.clone()]).into_message();
        assert_eq!(
            message.content,
            Content::Items(vec![ContentItem::ToolInvocation(call)])
        );
    }

    #[test]
    fn test_usage_saturates() {
        assert_eq!(Usage::new(u32::MAX, 1).total_tokens, u32::MAX);
    }

    #[test]
    fn test_tool_definition_serialization() {
        let tool = ToolDefinition::new("finished", "Done", json!({"type": "object"}));
        let parsed: ToolDefinition =
            serde_json::from_str(&serde_json::to_string(&tool).unwrap()).unwrap();
        assert_eq!(parsed, tool);
    }
}
