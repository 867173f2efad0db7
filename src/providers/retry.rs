//! Retry provider - decorator that adds automatic retry with exponential backoff.
//!
//! Wraps any [`LLMProvider`] and retries transient failures: HTTP 5xx,
//! provider overload, and transport errors (connect/timeout). Every 4xx,
//! including 429, is returned immediately.
//!
//! # Example
//!
//! ```rust,ignore
//! use ferrule::providers::retry::RetryProvider;
//! use ferrule::providers::claude::ClaudeProvider;
//!
//! let inner = ClaudeProvider::new("api-key");
//! let provider = RetryProvider::new(Box::new(inner))
//!     .with_max_retries(5)
//!     .with_base_delay_ms(500);
//! ```

use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::conversation::ConversationMessage;
use crate::error::{FerruleError, Result};

use super::{ChatOptions, LLMProvider, LLMResponse, ToolDefinition};

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 10;
/// Default delay before the first retry.
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;
/// Default ceiling for a single delay.
pub const DEFAULT_MAX_DELAY_MS: u64 = 300_000;

/// A decorator provider that retries transient errors with exponential backoff.
///
/// The request is attempted at most `max_retries + 1` times. The delay
/// before retry `n` (0-based) is `base_delay_ms * 2^n`, capped at
/// `max_delay_ms`.
pub struct RetryProvider {
    inner: Box<dyn LLMProvider>,
    max_retries: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
}

impl std::fmt::Debug for RetryProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryProvider")
            .field("inner", &self.inner.name())
            .field("max_retries", &self.max_retries)
            .field("base_delay_ms", &self.base_delay_ms)
            .field("max_delay_ms", &self.max_delay_ms)
            .finish()
    }
}

impl RetryProvider {
    /// Wrap `inner` with the default policy (10 retries, 1 s base, 5 min cap).
    pub fn new(inner: Box<dyn LLMProvider>) -> Self {
        Self {
            inner,
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    pub fn with_max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }
}

/// Whether a failed remote call may be repeated.
pub fn is_retryable(err: &FerruleError) -> bool {
    err.is_retryable()
}

/// Backoff delay before retry `attempt` (0-indexed), in milliseconds.
///
/// # Example
/// ```
/// use ferrule::providers::retry::compute_delay;
///
/// assert_eq!(compute_delay(0, 1000, 300_000), 1000);
/// assert_eq!(compute_delay(3, 1000, 300_000), 8000);
/// assert_eq!(compute_delay(20, 1000, 300_000), 300_000);
/// ```
pub fn compute_delay(attempt: u32, base_delay_ms: u64, max_delay_ms: u64) -> u64 {
    let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    base_delay_ms.saturating_mul(factor).min(max_delay_ms)
}

#[async_trait]
impl LLMProvider for RetryProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn default_model(&self) -> &str {
        self.inner.default_model()
    }

    async fn chat(
        &self,
        messages: Vec<ConversationMessage>,
        tools: Vec<ToolDefinition>,
        model: Option<&str>,
        options: ChatOptions,
    ) -> Result<LLMResponse> {
        let mut attempt: u32 = 0;
        loop {
            match self
                .inner
                .chat(messages.clone(), tools.clone(), model, options.clone())
                .await
            {
                Ok(response) => return Ok(response),
                Err(err) if is_retryable(&err) && attempt < self.max_retries => {
                    let delay = compute_delay(attempt, self.base_delay_ms, self.max_delay_ms);
                    warn!(
                        provider = self.inner.name(),
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        delay_ms = delay,
                        error = %err,
                        "Retrying chat request after transient error"
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
