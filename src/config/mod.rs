//! Configuration management for Ferrule
//!
//! Configuration is loaded from `~/.ferrule/config.json` with environment
//! variable overrides of the form `FERRULE_SECTION_KEY`.

mod types;

pub use types::*;

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{FerruleError, Result};
use crate::providers::WireFlavor;

/// Environment variable checked before the flavor-specific key variable.
pub const API_KEY_ENV: &str = "FERRULE_API_KEY";

impl Config {
    /// Returns the Ferrule configuration directory path (~/.ferrule)
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".ferrule")
    }

    /// Returns the path to the config file (~/.ferrule/config.json)
    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load configuration from the default path with environment overrides.
    ///
    /// A missing config file yields the default configuration.
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::path())
    }

    /// Load configuration from a specific path with environment overrides.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content).map_err(|e| {
                FerruleError::Config(format!("Invalid config file {}: {}", path.display(), e))
            })?
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            Config::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply `FERRULE_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_with(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// Values that fail to parse are logged and ignored.
    pub fn apply_overrides_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // Provider
        if let Some(val) = lookup("FERRULE_PROVIDER_FLAVOR") {
            match val.parse::<WireFlavor>() {
                Ok(flavor) => self.provider.flavor = flavor,
                Err(e) => warn!(error = %e, "Ignoring FERRULE_PROVIDER_FLAVOR"),
            }
        }
        if let Some(val) = lookup("FERRULE_PROVIDER_MODEL") {
            self.provider.model = Some(val);
        }
        if let Some(val) = lookup("FERRULE_PROVIDER_TIMEOUT_SECS") {
            parse_into(&val, "FERRULE_PROVIDER_TIMEOUT_SECS", &mut self.provider.timeout_secs);
        }
        if let Some(val) = lookup("FERRULE_API_BASE") {
            self.provider.api_base = Some(val);
        } else if self.provider.flavor == WireFlavor::ToolCalls {
            if let Some(val) = lookup("OPENAI_BASE_URL") {
                self.provider.api_base = Some(val);
            }
        }

        // Retry
        if let Some(val) = lookup("FERRULE_RETRY_MAX_RETRIES") {
            parse_into(&val, "FERRULE_RETRY_MAX_RETRIES", &mut self.retry.max_retries);
        }
        if let Some(val) = lookup("FERRULE_RETRY_BASE_DELAY_MS") {
            parse_into(&val, "FERRULE_RETRY_BASE_DELAY_MS", &mut self.retry.base_delay_ms);
        }
        if let Some(val) = lookup("FERRULE_RETRY_MAX_DELAY_MS") {
            parse_into(&val, "FERRULE_RETRY_MAX_DELAY_MS", &mut self.retry.max_delay_ms);
        }

        // Agent
        if let Some(val) = lookup("FERRULE_AGENT_MAX_TURNS") {
            parse_into(&val, "FERRULE_AGENT_MAX_TURNS", &mut self.agent.max_turns);
        }
        if let Some(val) = lookup("FERRULE_AGENT_WORKSPACE") {
            self.agent.workspace = Some(val);
        }

        // Tools
        if let Some(val) = lookup("FERRULE_TOOLS_TIMEOUT_SECS") {
            parse_into(&val, "FERRULE_TOOLS_TIMEOUT_SECS", &mut self.tools.timeout_secs);
        }
        if let Some(val) = lookup("FERRULE_TOOLS_DOC_COMMAND") {
            self.tools.doc_command = val;
        }
        if let Some(val) = lookup("FERRULE_TOOLS_FORMAT_COMMAND") {
            self.tools.format_command = val;
        }
        if let Some(val) = lookup("FERRULE_TOOLS_CHECKLIST_PATH") {
            self.tools.checklist_path = val;
        }

        // Logging
        if let Some(val) = lookup("FERRULE_LOGGING_LEVEL") {
            self.logging.level = val;
        }
        if let Some(val) = lookup("FERRULE_LOGGING_FORMAT") {
            match serde_json::from_value::<LogFormat>(serde_json::Value::String(val)) {
                Ok(format) => self.logging.format = format,
                Err(e) => warn!(error = %e, "Ignoring FERRULE_LOGGING_FORMAT"),
            }
        }
    }

    /// Find the API key for the configured flavor.
    ///
    /// Lookup order: `FERRULE_API_KEY`, the flavor's own variable
    /// (`ANTHROPIC_API_KEY` or `OPENAI_API_KEY`), then `provider.api_key`.
    pub fn resolve_api_key(&self) -> Result<String> {
        self.resolve_api_key_with(|key| std::env::var(key).ok())
    }

    pub fn resolve_api_key_with<F>(&self, lookup: F) -> Result<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let flavor_env = self.provider.flavor.api_key_env();
        [lookup(API_KEY_ENV), lookup(flavor_env), self.provider.api_key.clone()]
            .into_iter()
            .flatten()
            .map(|k| k.trim().to_string())
            .find(|k| !k.is_empty())
            .ok_or_else(|| {
                FerruleError::Config(format!(
                    "No API key found; set {} or {}",
                    API_KEY_ENV, flavor_env
                ))
            })
    }

    /// The workspace directory tools run in, with `~` expanded.
    pub fn workspace_path(&self) -> Option<PathBuf> {
        self.agent.workspace.as_deref().map(expand_home)
    }
}

fn parse_into<T: std::str::FromStr>(val: &str, key: &str, slot: &mut T) {
    match val.trim().parse() {
        Ok(v) => *slot = v,
        Err(_) => warn!(key, value = val, "Ignoring unparseable environment override"),
    }
}

/// Expand ~ to home directory in a path string
fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return match rest.strip_prefix('/') {
                Some(tail) => home.join(tail),
                None if rest.is_empty() => home,
                None => PathBuf::from(path),
            };
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.provider.flavor, WireFlavor::Blocks);
        assert_eq!(config.provider.timeout_secs, 120);
        assert_eq!(config.retry.max_retries, 10);
        assert_eq!(config.retry.base_delay_ms, 1000);
        assert_eq!(config.retry.max_delay_ms, 300_000);
        assert_eq!(config.agent.max_turns, 100);
        assert_eq!(config.tools.timeout_secs, 10);
        assert_eq!(config.tools.doc_command, "go doc");
        assert_eq!(config.tools.checklist_path, "TODO.md");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_config_partial_json() {
        let json = r#"{"provider": {"flavor": "tool_calls"}, "tools": {"timeout_secs": 30}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.provider.flavor, WireFlavor::ToolCalls);
        assert_eq!(config.provider.timeout_secs, 120);
        assert_eq!(config.tools.timeout_secs, 30);
        assert_eq!(config.tools.search_command, "rg");
    }

    #[test]
    fn test_load_from_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"agent": {"max_turns": 7}}"#).unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.agent.max_turns, 7);
    }

    #[test]
    fn test_load_nonexistent() {
        let dir = tempdir().unwrap();
        let config = Config::load_from_path(&dir.path().join("missing.json")).unwrap();
        assert_eq!(config.retry, RetryConfig::default());
    }

    #[test]
    fn test_load_invalid_json_is_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = Config::load_from_path(&path).unwrap_err();
        assert!(matches!(err, FerruleError::Config(_)));
    }

    #[test]
    fn test_env_overrides() {
        let vars = env(&[
            ("FERRULE_PROVIDER_FLAVOR", "openai"),
            ("FERRULE_PROVIDER_MODEL", "gpt-4o-mini"),
            ("FERRULE_RETRY_MAX_RETRIES", "3"),
            ("FERRULE_TOOLS_TIMEOUT_SECS", "45"),
            ("FERRULE_AGENT_MAX_TURNS", "not-a-number"),
            ("FERRULE_LOGGING_FORMAT", "json"),
        ]);
        let mut config = Config::default();
        config.apply_overrides_with(|k| vars.get(k).cloned());

        assert_eq!(config.provider.flavor, WireFlavor::ToolCalls);
        assert_eq!(config.provider.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.tools.timeout_secs, 45);
        assert_eq!(config.agent.max_turns, 100);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_api_base_overrides() {
        let vars = env(&[("OPENAI_BASE_URL", "http://localhost:8080/v1")]);

        let mut blocks = Config::default();
        blocks.apply_overrides_with(|k| vars.get(k).cloned());
        assert!(blocks.provider.api_base.is_none());

        let mut tool_calls = Config::default();
        tool_calls.provider.flavor = WireFlavor::ToolCalls;
        tool_calls.apply_overrides_with(|k| vars.get(k).cloned());
        assert_eq!(
            tool_calls.provider.api_base.as_deref(),
            Some("http://localhost:8080/v1")
        );

        let vars = env(&[
            ("OPENAI_BASE_URL", "http://ignored"),
            ("FERRULE_API_BASE", "http://proxy"),
        ]);
        let mut config = Config::default();
        config.provider.flavor = WireFlavor::ToolCalls;
        config.apply_overrides_with(|k| vars.get(k).cloned());
        assert_eq!(config.provider.api_base.as_deref(), Some("http://proxy"));
    }

    #[test]
    fn test_resolve_api_key_order() {
        let mut config = Config::default();
        config.provider.api_key = Some("from-file".into());

        let vars = env(&[("FERRULE_API_KEY", "generic"), ("ANTHROPIC_API_KEY", "anthropic")]);
        assert_eq!(config.resolve_api_key_with(|k| vars.get(k).cloned()).unwrap(), "generic");

        let vars = env(&[("ANTHROPIC_API_KEY", "anthropic"), ("OPENAI_API_KEY", "openai")]);
        assert_eq!(config.resolve_api_key_with(|k| vars.get(k).cloned()).unwrap(), "anthropic");

        config.provider.flavor = WireFlavor::ToolCalls;
        assert_eq!(config.resolve_api_key_with(|k| vars.get(k).cloned()).unwrap(), "openai");

        assert_eq!(config.resolve_api_key_with(|_| None).unwrap(), "from-file");
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let config = Config::default();
        let vars = env(&[("FERRULE_API_KEY", "  ")]);
        let err = config
            .resolve_api_key_with(|k| vars.get(k).cloned())
            .unwrap_err();
        assert!(matches!(err, FerruleError::Config(_)));
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn test_expand_home() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand_home("~/work"), home.join("work"));
        assert_eq!(expand_home("~"), home);
        assert_eq!(expand_home("/abs/path"), PathBuf::from("/abs/path"));
        assert_eq!(expand_home("~other"), PathBuf::from("~other"));
    }

    #[test]
    fn test_config_dir_and_path() {
        assert!(Config::dir().ends_with(".ferrule"));
        assert!(Config::path().ends_with(".ferrule/config.json"));
    }
}
