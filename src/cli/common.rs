//! Shared CLI helpers: wiring config into a ready-to-run agent.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use ferrule::agent::{AgentLoop, ContextBuilder, RuntimeContext};
use ferrule::config::Config;
use ferrule::providers::{build_provider, ChatOptions, LLMProvider, RetryProvider};
use ferrule::safety::{Operator, PermissionGate, TerminalOperator};
use ferrule::tools::default_registry;

/// Workspace from config, falling back to the current directory.
pub(crate) fn resolve_workspace(config: &Config) -> Result<PathBuf> {
    match config.workspace_path() {
        Some(path) => Ok(path),
        None => std::env::current_dir().with_context(|| "Failed to read current directory"),
    }
}

/// Provider for the configured flavor, wrapped in the retry policy.
pub(crate) fn create_provider(config: &Config) -> Result<Arc<dyn LLMProvider>> {
    let api_key = config.resolve_api_key()?;
    let raw = build_provider(&config.provider, &api_key)?;
    Ok(Arc::new(
        RetryProvider::new(raw)
            .with_max_retries(config.retry.max_retries)
            .with_base_delay_ms(config.retry.base_delay_ms)
            .with_max_delay_ms(config.retry.max_delay_ms),
    ))
}

/// Build an agent talking to the configured provider.
///
/// With `yes` set, shell commands run without prompting. The terminal is
/// still used for `ask_human` questions.
pub(crate) fn create_agent(config: &Config, yes: bool) -> Result<AgentLoop> {
    let provider = create_provider(config)?;
    let operator: Arc<dyn Operator> = Arc::new(TerminalOperator::new());
    let gate = if yes {
        PermissionGate::non_interactive(operator)
    } else {
        PermissionGate::new(operator)
    };
    assemble_agent(config, provider, gate)
}

/// Everything after the provider and operator have been chosen.
pub(crate) fn assemble_agent(
    config: &Config,
    provider: Arc<dyn LLMProvider>,
    gate: PermissionGate,
) -> Result<AgentLoop> {
    let tools = default_registry(&config.tools)?;
    let workspace = resolve_workspace(config)?;

    let runtime = RuntimeContext::new()
        .with_tools(tools.names().iter().map(|n| n.to_string()).collect())
        .with_workspace(&workspace.display().to_string())
        .with_os_info();
    let mut context_builder = ContextBuilder::new().with_runtime_context(runtime);
    if let Some(prompt) = &config.agent.system_prompt {
        context_builder = context_builder.with_system_prompt(prompt);
    }

    let mut options = ChatOptions::new();
    if let Some(max_tokens) = config.agent.max_tokens {
        options = options.with_max_tokens(max_tokens);
    }
    if let Some(temperature) = config.agent.temperature {
        options = options.with_temperature(temperature);
    }

    info!(
        provider = provider.name(),
        model = config.provider.model.as_deref().unwrap_or(provider.default_model()),
        workspace = %workspace.display(),
        tools = tools.len(),
        "Agent ready"
    );

    Ok(AgentLoop::new(provider, tools, gate)
        .with_context_builder(context_builder)
        .with_workspace(workspace)
        .with_model(config.provider.model.clone())
        .with_chat_options(options)
        .with_max_turns(config.agent.max_turns))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrule::config::ProviderConfig;
    use ferrule::safety::ScriptedOperator;

    #[test]
    fn test_resolve_workspace_prefers_config() {
        let mut config = Config::default();
        config.agent.workspace = Some("/srv/project".into());
        assert_eq!(resolve_workspace(&config).unwrap(), PathBuf::from("/srv/project"));

        config.agent.workspace = None;
        assert_eq!(
            resolve_workspace(&config).unwrap(),
            std::env::current_dir().unwrap()
        );
    }

    #[test]
    fn test_create_provider_uses_config_key() {
        let config = Config {
            provider: ProviderConfig {
                api_key: Some("sk-test".into()),
                ..ProviderConfig::default()
            },
            ..Config::default()
        };
        // Environment keys take precedence but any non-empty key builds a provider.
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.name(), "claude");
    }

    #[test]
    fn test_assemble_agent_registers_default_tools() {
        let config = Config::default();
        let provider = create_provider(&Config {
            provider: ProviderConfig {
                api_key: Some("sk-test".into()),
                ..ProviderConfig::default()
            },
            ..Config::default()
        })
        .unwrap();
        let gate = PermissionGate::new(Arc::new(ScriptedOperator::default()));
        let agent = assemble_agent(&config, provider, gate).unwrap();
        assert!(agent.tools().has("finished"));
        assert!(agent.tools().has("bash"));
        assert!(agent.gate().is_interactive());
    }
}
