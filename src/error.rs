//! Error types for Ferrule
//!
//! This module defines all error types used throughout the runtime.
//! Uses `thiserror` for ergonomic error handling with automatic `Display` and
//! `Error` trait implementations.
//!
//! Only transport, protocol and configuration errors are allowed to leave the
//! agent loop. Tool failures and safety-policy refusals are folded back into
//! the conversation as tool results.

use std::fmt;
use thiserror::Error;

// ============================================================================
// Provider Error Classification
// ============================================================================

/// Structured provider error classification.
///
/// Provides fine-grained categorization of chat-completion HTTP errors,
/// enabling retry decisions without string matching.
#[derive(Debug)]
pub enum ProviderError {
    /// 401 - Invalid API key or authentication failure
    Auth(String),
    /// 429 - Rate limit or quota exceeded
    RateLimit(String),
    /// 402 - Payment required or billing issue
    Billing(String),
    /// 500..=599 - Server-side errors
    ServerError(u16, String),
    /// 400 - Bad request, invalid JSON, malformed parameters
    InvalidRequest(String),
    /// 404 - Model not found or endpoint not available
    ModelNotFound(String),
    /// Connection or read timeout
    Timeout(String),
    /// Endpoint unreachable (DNS, refused connection, reset)
    Network(String),
    /// Provider is overloaded (e.g. Anthropic `overloaded_error`)
    Overloaded(String),
    /// Catch-all for unrecognized statuses
    Unknown(u16, String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Auth(msg) => write!(f, "Authentication error: {}", msg),
            ProviderError::RateLimit(msg) => write!(f, "Rate limit error: {}", msg),
            ProviderError::Billing(msg) => write!(f, "Billing error: {}", msg),
            ProviderError::ServerError(status, msg) => {
                write!(f, "Server error (HTTP {}): {}", status, msg)
            }
            ProviderError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ProviderError::ModelNotFound(msg) => write!(f, "Model not found: {}", msg),
            ProviderError::Timeout(msg) => write!(f, "Timeout: {}", msg),
            ProviderError::Network(msg) => write!(f, "Network error: {}", msg),
            ProviderError::Overloaded(msg) => write!(f, "Overloaded error: {}", msg),
            ProviderError::Unknown(status, msg) => {
                write!(f, "Unknown provider error (HTTP {}): {}", status, msg)
            }
        }
    }
}

impl ProviderError {
    /// Returns `true` if this error is transient and the request should be retried.
    ///
    /// Only server-side and transport failures qualify. Every 4xx status,
    /// rate limiting included, is terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::ServerError(..)
                | ProviderError::Timeout(_)
                | ProviderError::Network(_)
                | ProviderError::Overloaded(_)
        )
    }

    /// Returns the HTTP status code associated with this error, if applicable.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ProviderError::Auth(_) => Some(401),
            ProviderError::RateLimit(_) => Some(429),
            ProviderError::Billing(_) => Some(402),
            ProviderError::ServerError(status, _) => Some(*status),
            ProviderError::InvalidRequest(_) => Some(400),
            ProviderError::ModelNotFound(_) => Some(404),
            ProviderError::Timeout(_) => None,
            ProviderError::Network(_) => None,
            ProviderError::Overloaded(_) => Some(529),
            ProviderError::Unknown(status, _) => Some(*status),
        }
    }
}

impl From<ProviderError> for FerruleError {
    fn from(err: ProviderError) -> Self {
        FerruleError::ProviderTyped(err)
    }
}

// ============================================================================
// Primary Error Type
// ============================================================================

/// The primary error type for Ferrule operations.
#[derive(Error, Debug)]
pub enum FerruleError {
    /// Configuration-related errors (missing credential, bad config file, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Structured provider error with classification for retry decisions.
    #[error("Provider error: {0}")]
    ProviderTyped(ProviderError),

    /// The remote response or the conversation broke the wire contract
    /// (unparseable body, unknown tool, unmatched tool result).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Tool execution errors (missing file, spawn failure, etc.)
    #[error("Tool error: {0}")]
    Tool(String),

    /// Tool arguments missing or of the wrong type.
    #[error("Invalid arguments for '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },

    /// A substitution was applied without a matching preview.
    #[error("Must perform dry-run first: no preview recorded for this exact operation on {0}")]
    PreviewRequired(String),

    /// The loop reached its configured turn limit without `finished`.
    #[error("Turn limit reached after {0} turns without the finished tool")]
    TurnLimit(u32),

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid search pattern
    #[error("Invalid pattern: {0}")]
    Regex(#[from] regex::Error),
}

impl From<reqwest::Error> for FerruleError {
    fn from(err: reqwest::Error) -> Self {
        let provider_err = if err.is_timeout() {
            ProviderError::Timeout(err.to_string())
        } else if err.is_connect() || err.is_request() {
            ProviderError::Network(err.to_string())
        } else if err.is_decode() {
            return FerruleError::Protocol(format!("Failed to decode response: {}", err));
        } else {
            ProviderError::Network(err.to_string())
        };
        FerruleError::ProviderTyped(provider_err)
    }
}

impl FerruleError {
    /// Returns `true` when the failure is transient and the remote call may be
    /// repeated.
    pub fn is_retryable(&self) -> bool {
        match self {
            FerruleError::ProviderTyped(pe) => pe.is_retryable(),
            _ => false,
        }
    }
}

/// A specialized `Result` type for Ferrule operations.
pub type Result<T> = std::result::Result<T, FerruleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FerruleError::Config("missing API key".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing API key");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: FerruleError = io_err.into();
        assert!(matches!(err, FerruleError::Io(_)));
    }

    #[test]
    fn test_preview_required_message() {
        let err = FerruleError::PreviewRequired("notes.txt".into());
        assert!(err.to_string().contains("Must perform dry-run"));
        assert!(err.to_string().contains("notes.txt"));
    }

    #[test]
    fn test_invalid_arguments_display() {
        let err = FerruleError::InvalidArguments {
            tool: "bash".into(),
            reason: "missing field `command`".into(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid arguments for 'bash': missing field `command`"
        );
    }

    #[test]
    fn test_provider_error_is_retryable() {
        assert!(ProviderError::ServerError(500, "x".into()).is_retryable());
        assert!(ProviderError::ServerError(503, "x".into()).is_retryable());
        assert!(ProviderError::Timeout("timeout".into()).is_retryable());
        assert!(ProviderError::Network("refused".into()).is_retryable());
        assert!(ProviderError::Overloaded("busy".into()).is_retryable());

        assert!(!ProviderError::Auth("401".into()).is_retryable());
        assert!(!ProviderError::RateLimit("429".into()).is_retryable());
        assert!(!ProviderError::Billing("402".into()).is_retryable());
        assert!(!ProviderError::InvalidRequest("400".into()).is_retryable());
        assert!(!ProviderError::ModelNotFound("404".into()).is_retryable());
        assert!(!ProviderError::Unknown(418, "teapot".into()).is_retryable());
    }

    #[test]
    fn test_provider_error_status_code() {
        assert_eq!(ProviderError::Auth("x".into()).status_code(), Some(401));
        assert_eq!(
            ProviderError::ServerError(502, "x".into()).status_code(),
            Some(502)
        );
        assert_eq!(ProviderError::Timeout("x".into()).status_code(), None);
        assert_eq!(
            ProviderError::Unknown(418, "x".into()).status_code(),
            Some(418)
        );
    }

    #[test]
    fn test_non_provider_errors_are_terminal() {
        assert!(!FerruleError::Config("no key".into()).is_retryable());
        assert!(!FerruleError::Protocol("bad body".into()).is_retryable());
        assert!(!FerruleError::Tool("exit 1".into()).is_retryable());
    }

    #[test]
    fn test_provider_typed_display() {
        let err = FerruleError::ProviderTyped(ProviderError::Auth("invalid key".into()));
        assert_eq!(
            err.to_string(),
            "Provider error: Authentication error: invalid key"
        );
    }
}
