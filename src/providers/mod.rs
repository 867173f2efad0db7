//! Providers module - remote chat-completion services
//!
//! One internal message model, two wire codecs. `ClaudeProvider` speaks the
//! content-block shape (`WireFlavor::Blocks`), `OpenAIProvider` speaks the
//! `tool_calls` shape (`WireFlavor::ToolCalls`). Either can be wrapped in a
//! `RetryProvider`.
//!
//! # Example
//!
//! ```rust,ignore
//! use ferrule::conversation::ConversationMessage;
//! use ferrule::providers::{ChatOptions, ClaudeProvider, LLMProvider, RetryProvider};
//!
//! async fn example() {
//!     let provider = RetryProvider::new(Box::new(ClaudeProvider::new("your-api-key")));
//!     let messages = vec![ConversationMessage::user("Hello!")];
//!     let response = provider
//!         .chat(messages, vec![], None, ChatOptions::new())
//!         .await
//!         .unwrap();
//!     println!("Response: {}", response.content);
//! }
//! ```

pub mod claude;
pub mod openai;
pub mod retry;
mod types;

use crate::config::ProviderConfig;
use crate::error::{FerruleError, ProviderError, Result};

pub use claude::ClaudeProvider;
pub use openai::OpenAIProvider;
pub use retry::RetryProvider;
pub use types::{ChatOptions, LLMProvider, LLMResponse, ToolDefinition, Usage, WireFlavor};

/// Parse an HTTP status code and response body into a structured [`ProviderError`].
///
/// Shared by both codecs so they classify failures the same way.
pub fn parse_provider_error(status: u16, body: &str) -> ProviderError {
    match status {
        401 | 403 => ProviderError::Auth(body.to_string()),
        402 => ProviderError::Billing(body.to_string()),
        404 => ProviderError::ModelNotFound(body.to_string()),
        429 => ProviderError::RateLimit(body.to_string()),
        400 => ProviderError::InvalidRequest(body.to_string()),
        529 => ProviderError::Overloaded(body.to_string()),
        500..=599 if body.contains("overloaded_error") => {
            ProviderError::Overloaded(body.to_string())
        }
        500..=599 => ProviderError::ServerError(status, body.to_string()),
        _ => ProviderError::Unknown(status, body.to_string()),
    }
}

/// Build the raw (un-retried) provider selected by `config.flavor`.
pub fn build_provider(config: &ProviderConfig, api_key: &str) -> Result<Box<dyn LLMProvider>> {
    if api_key.trim().is_empty() {
        return Err(FerruleError::Config(format!(
            "No API key configured for the '{}' flavor",
            config.flavor
        )));
    }
    let provider: Box<dyn LLMProvider> = match config.flavor {
        WireFlavor::Blocks => {
            let mut p = ClaudeProvider::new(api_key).with_timeout_secs(config.timeout_secs);
            if let Some(model) = config.model.as_deref() {
                p = p.with_model(model);
            }
            if let Some(base) = config.api_base.as_deref() {
                p = p.with_base_url(base);
            }
            Box::new(p)
        }
        WireFlavor::ToolCalls => {
            let mut p = OpenAIProvider::new(api_key).with_timeout_secs(config.timeout_secs);
            if let Some(model) = config.model.as_deref() {
                p = p.with_model(model);
            }
            if let Some(base) = config.api_base.as_deref() {
                p = p.with_base_url(base);
            }
            Box::new(p)
        }
    };
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provider_error_auth() {
        let err = parse_provider_error(401, "invalid api key");
        assert!(matches!(err, ProviderError::Auth(_)));
        assert_eq!(err.status_code(), Some(401));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_parse_provider_error_billing_and_model() {
        assert!(matches!(
            parse_provider_error(402, "payment required"),
            ProviderError::Billing(_)
        ));
        assert!(matches!(
            parse_provider_error(404, "model not found"),
            ProviderError::ModelNotFound(_)
        ));
    }

    #[test]
    fn test_parse_provider_error_429_is_terminal() {
        let err = parse_provider_error(429, "rate limited");
        assert!(matches!(err, ProviderError::RateLimit(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_parse_provider_error_400() {
        let err = parse_provider_error(400, "bad json");
        assert!(matches!(err, ProviderError::InvalidRequest(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_parse_provider_error_5xx() {
        for status in [500, 502, 503, 504, 599] {
            let err = parse_provider_error(status, "upstream");
            assert!(matches!(err, ProviderError::ServerError(s, _) if s == status));
            assert!(err.is_retryable());
        }
    }

    #[test]
    fn test_parse_provider_error_overloaded() {
        let err = parse_provider_error(529, "busy");
        assert!(matches!(err, ProviderError::Overloaded(_)));
        assert!(err.is_retryable());

        let err = parse_provider_error(
            500,
            r#"{"type":"error","error":{"type":"overloaded_error"}}"#,
        );
        assert!(matches!(err, ProviderError::Overloaded(_)));
    }

    #[test]
    fn test_parse_provider_error_unknown() {
        let err = parse_provider_error(418, "i'm a teapot");
        assert!(matches!(err, ProviderError::Unknown(418, _)));
        assert!(err.to_string().contains("HTTP 418"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_build_provider_by_flavor() {
        let mut config = ProviderConfig::default();
        let provider = build_provider(&config, "sk-test").unwrap();
        assert_eq!(provider.name(), "claude");

        config.flavor = WireFlavor::ToolCalls;
        config.model = Some("gpt-4o".into());
        let provider = build_provider(&config, "sk-test").unwrap();
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.default_model(), "gpt-4o");
    }

    #[test]
    fn test_build_provider_requires_key() {
        let err = build_provider(&ProviderConfig::default(), " ").err().unwrap();
        assert!(matches!(err, FerruleError::Config(_)));
    }
}
