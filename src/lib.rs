//! Ferrule - single-conversation coding agent
//!
//! The model acts on the local machine only through tools. Shell commands
//! pass a [`safety::PermissionGate`], in-place edits pass a
//! [`safety::MutationGuard`], and the loop ends when the model invokes the
//! `finished` tool.

pub mod agent;
pub mod config;
pub mod conversation;
pub mod error;
pub mod process;
pub mod providers;
pub mod safety;
pub mod tools;
pub mod utils;

pub use agent::{AgentLoop, RunOutcome};
pub use config::Config;
pub use error::{FerruleError, ProviderError, Result};
pub use providers::{
    ChatOptions, ClaudeProvider, LLMProvider, LLMResponse, OpenAIProvider, RetryProvider,
    ToolDefinition, Usage, WireFlavor,
};
