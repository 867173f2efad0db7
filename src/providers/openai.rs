//! OpenAI Chat Completions provider: the `tool_calls` wire flavor
//!
//! Assistant text travels in `content`, invocations in a sibling
//! `tool_calls` array whose arguments are JSON-encoded strings. Each tool
//! result is its own `role: "tool"` message carrying `tool_call_id`.
//!
//! Any OpenAI-compatible endpoint works; set the base URL with
//! [`OpenAIProvider::with_base_url`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::conversation::{Content, ContentItem, ConversationMessage, Role, ToolInvocation};
use crate::error::{FerruleError, Result};

use super::{parse_provider_error, ChatOptions, LLMProvider, LLMResponse, ToolDefinition, Usage};

/// The OpenAI API base URL.
const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// The default OpenAI model to use.
pub const DEFAULT_MODEL: &str = "gpt-4o";

const DEFAULT_TIMEOUT_SECS: u64 = 120;

// ============================================================================
// OpenAI API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAITool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// A message in OpenAI's format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAIMessage {
    /// `"system"`, `"user"`, `"assistant"` or `"tool"`
    pub role: String,
    /// Null for an assistant turn that only calls tools
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<OpenAIToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// One entry of an assistant's `tool_calls` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAIToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_type")]
    pub kind: String,
    pub function: OpenAIFunctionCall,
}

fn function_type() -> String {
    "function".to_string()
}

/// Function name plus JSON-encoded arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAIFunctionCall {
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Serialize)]
struct OpenAITool {
    r#type: String,
    function: OpenAIFunctionDef,
}

#[derive(Debug, Serialize)]
struct OpenAIFunctionDef {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorResponse {
    error: OpenAIError,
}

#[derive(Debug, Deserialize)]
struct OpenAIError {
    message: String,
    #[serde(default)]
    r#type: Option<String>,
}

// ============================================================================
// OpenAI Provider
// ============================================================================

/// OpenAI (or compatible) provider.
pub struct OpenAIProvider {
    api_key: String,
    api_base: String,
    model: String,
    client: Client,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider with the given API key.
    ///
    /// # Example
    /// ```
    /// use ferrule::providers::openai::OpenAIProvider;
    /// use ferrule::providers::LLMProvider;
    ///
    /// let provider = OpenAIProvider::new("sk-xxx").with_base_url("https://my-api.com/v1/");
    /// assert_eq!(provider.name(), "openai");
    /// ```
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            api_base: OPENAI_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            client: build_client(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// Base URL for the API (trailing slash will be removed).
    pub fn with_base_url(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.client = build_client(secs);
        self
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }
}

fn build_client(timeout_secs: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .build()
        .unwrap_or_else(|_| Client::new())
}

// ============================================================================
// Codec
// ============================================================================

fn plain(role: &str, content: String) -> OpenAIMessage {
    OpenAIMessage {
        role: role.to_string(),
        content: Some(content),
        tool_calls: None,
        tool_call_id: None,
    }
}

/// Encode the conversation into Chat Completions messages.
pub fn encode_messages(messages: &[ConversationMessage]) -> Result<Vec<OpenAIMessage>> {
    messages
        .iter()
        .map(|msg| match msg.role {
            Role::System => Ok(plain("system", msg.text())),
            Role::User => Ok(plain("user", msg.text())),
            Role::Tool => {
                let id = msg.correlation_id.clone().ok_or_else(|| {
                    FerruleError::Protocol("Tool message has no correlation id".into())
                })?;
                Ok(OpenAIMessage {
                    tool_call_id: Some(id),
                    ..plain("tool", msg.text())
                })
            }
            Role::Assistant => match &msg.content {
                Content::Text(text) => Ok(plain("assistant", text.clone())),
                Content::Items(items) => {
                    let text = msg.text();
                    let calls = items
                        .iter()
                        .filter_map(|item| match item {
                            ContentItem::ToolInvocation(inv) => Some(OpenAIToolCall {
                                id: inv.id.clone(),
                                kind: function_type(),
                                function: OpenAIFunctionCall {
                                    name: inv.name.clone(),
                                    arguments: inv.arguments_json(),
                                },
                            }),
                            ContentItem::Text { .. } => None,
                        })
                        .collect::<Vec<_>>();
                    Ok(OpenAIMessage {
                        role: "assistant".to_string(),
                        content: if text.is_empty() { None } else { Some(text) },
                        tool_calls: if calls.is_empty() { None } else { Some(calls) },
                        tool_call_id: None,
                    })
                }
            },
        })
        .collect()
}

fn decode_assistant(msg: &OpenAIMessage) -> ConversationMessage {
    let text = msg.content.clone().unwrap_or_default();
    let invocations: Vec<ToolInvocation> = msg
        .tool_calls
        .iter()
        .flatten()
        .map(|tc| ToolInvocation::from_json_arguments(&tc.id, &tc.function.name, &tc.function.arguments))
        .collect();
    ConversationMessage::assistant_with_invocations(&text, invocations)
}

/// Decode Chat Completions messages back into the internal model.
pub fn decode_messages(messages: &[OpenAIMessage]) -> Result<Vec<ConversationMessage>> {
    messages
        .iter()
        .map(|msg| {
            let text = msg.content.clone().unwrap_or_default();
            match msg.role.as_str() {
                "system" => Ok(ConversationMessage::system(&text)),
                "user" => Ok(ConversationMessage::user(&text)),
                "assistant" => Ok(decode_assistant(msg)),
                "tool" => {
                    let id = msg.tool_call_id.as_deref().ok_or_else(|| {
                        FerruleError::Protocol("tool message without tool_call_id".into())
                    })?;
                    Ok(ConversationMessage::tool(id, &text))
                }
                other => Err(FerruleError::Protocol(format!(
                    "Unexpected message role '{}'",
                    other
                ))),
            }
        })
        .collect()
}

fn convert_tools(tools: Vec<ToolDefinition>) -> Vec<OpenAITool> {
    tools
        .into_iter()
        .map(|t| OpenAITool {
            r#type: function_type(),
            function: OpenAIFunctionDef {
                name: t.name,
                description: t.description,
                parameters: t.parameters,
            },
        })
        .collect()
}

/// Decode a Chat Completions response body (first choice).
pub fn parse_response(body: &str) -> Result<LLMResponse> {
    let response: OpenAIResponse = serde_json::from_str(body)
        .map_err(|e| FerruleError::Protocol(format!("Malformed OpenAI response: {}", e)))?;

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| FerruleError::Protocol("OpenAI response contained no choices".into()))?;

    let assistant = decode_assistant(&choice.message);
    let mut llm_response = LLMResponse::with_tools(
        &assistant.text(),
        assistant.invocations().into_iter().cloned().collect(),
    );
    if let Some(usage) = response.usage {
        llm_response =
            llm_response.with_usage(Usage::new(usage.prompt_tokens, usage.completion_tokens));
    }
    Ok(llm_response)
}

// ============================================================================
// LLMProvider Implementation
// ============================================================================

#[async_trait]
impl LLMProvider for OpenAIProvider {
    async fn chat(
        &self,
        messages: Vec<ConversationMessage>,
        tools: Vec<ToolDefinition>,
        model: Option<&str>,
        options: ChatOptions,
    ) -> Result<LLMResponse> {
        let model = model.unwrap_or(&self.model);
        let request = OpenAIRequest {
            model: model.to_string(),
            messages: encode_messages(&messages)?,
            tools: if tools.is_empty() {
                None
            } else {
                Some(convert_tools(tools))
            },
            max_tokens: options.max_tokens,
            temperature: options.temperature,
        };

        debug!(model = %model, messages = request.messages.len(), "OpenAI request");

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let detail = match serde_json::from_str::<OpenAIErrorResponse>(&body) {
                Ok(err) => match err.error.r#type {
                    Some(kind) => format!("{}: {}", kind, err.error.message),
                    None => err.error.message,
                },
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
        "openai"
    }
}

// ============================================================================
// Tests
// ============================================================================
