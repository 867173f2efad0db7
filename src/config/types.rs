//! Configuration type definitions for Ferrule
//!
//! All types implement serde traits for JSON serialization and have sensible
//! defaults, so a partial config file only needs the keys it changes.

use serde::{Deserialize, Serialize};

use crate::agent::DEFAULT_MAX_TURNS;
use crate::providers::retry::{DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_DELAY_MS, DEFAULT_MAX_RETRIES};
use crate::providers::WireFlavor;
use crate::tools::{DEFAULT_CHECKLIST_FILE, DEFAULT_DOC_COMMAND, DEFAULT_FORMATTER};

/// Main configuration struct for Ferrule
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote model endpoint and credentials
    pub provider: ProviderConfig,
    /// Backoff policy for transient remote failures
    pub retry: RetryConfig,
    /// Agent loop limits and workspace
    pub agent: AgentConfig,
    /// Tool commands and timeouts
    pub tools: ToolsConfig,
    /// Log level and format
    pub logging: LoggingConfig,
}

// ============================================================================
// Provider Configuration
// ============================================================================

/// Default per-request timeout for the remote call.
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 120;

/// Remote provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Which wire encoding to speak
    pub flavor: WireFlavor,
    /// Model override; the flavor's default otherwise
    pub model: Option<String>,
    /// Endpoint base URL override
    pub api_base: Option<String>,
    /// API key. Prefer the environment over storing it here.
    pub api_key: Option<String>,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            flavor: WireFlavor::default(),
            model: None,
            api_base: None,
            api_key: None,
            timeout_secs: DEFAULT_PROVIDER_TIMEOUT_SECS,
        }
    }
}

// ============================================================================
// Retry Configuration
// ============================================================================

/// Exponential backoff policy. Delay before retry `n` is
/// `base_delay_ms * 2^n`, capped at `max_delay_ms`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

// ============================================================================
// Agent Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Maximum model calls per instruction (0 = unbounded)
    pub max_turns: u32,
    /// Working directory for tools; the current directory when unset.
    /// A leading `~` expands to the home directory.
    pub workspace: Option<String>,
    /// Replacement for the built-in system prompt
    pub system_prompt: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            workspace: None,
            system_prompt: None,
            max_tokens: None,
            temperature: None,
        }
    }
}

// ============================================================================
// Tools Configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Default process timeout for tools, in seconds
    pub timeout_secs: u64,
    /// Command line for `doc_lookup`; the symbol is appended
    pub doc_command: String,
    pub search_command: String,
    pub ast_rewrite_command: String,
    pub format_command: String,
    /// Checklist file, relative to the workspace
    pub checklist_path: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            doc_command: DEFAULT_DOC_COMMAND.to_string(),
            search_command: "rg".to_string(),
            ast_rewrite_command: "sg".to_string(),
            format_command: DEFAULT_FORMATTER.to_string(),
            checklist_path: DEFAULT_CHECKLIST_FILE.to_string(),
        }
    }
}

// ============================================================================
// Logging Configuration
// ============================================================================

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line human-readable output
    Pretty,
    /// Compact single-line `LEVEL target message fields`
    #[default]
    Component,
    /// JSON lines
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Default filter directive; `RUST_LOG` wins when set
    pub level: String,
    /// Append logs to this file instead of stderr
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: "info".to_string(),
            file: None,
        }
    }
}
