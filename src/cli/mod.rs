//! CLI module - command parsing and dispatch
//!
//! All CLI logic lives here. `main.rs` calls `cli::run()`.

pub mod agent;
pub mod common;
pub mod tools;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use ferrule::config::Config;
use ferrule::providers::WireFlavor;

#[derive(Parser, Debug)]
#[command(name = "ferrule")]
#[command(version)]
#[command(about = "Coding agent that works through guarded local tools", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub(crate) struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Instruction for the agent
    instruction: Option<String>,

    /// Read instructions from the terminal until 'quit'
    #[arg(short, long)]
    interactive: bool,

    /// Wire flavor: blocks (Anthropic) or tool_calls (OpenAI)
    #[arg(long, value_name = "FLAVOR")]
    flavor: Option<String>,

    /// Model override
    #[arg(short, long)]
    model: Option<String>,

    /// Config file (default: ~/.ferrule/config.json)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Run shell commands without asking for permission
    #[arg(short = 'y', long)]
    yes: bool,

    /// Directory the tools operate in
    #[arg(short, long, value_name = "DIR")]
    workspace: Option<PathBuf>,

    /// Maximum model calls per instruction (0 = unbounded)
    #[arg(long)]
    max_turns: Option<u32>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the tools offered to the model
    Tools {
        /// Print full JSON schemas
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    /// Load the config file and fold the command-line overrides into it.
    fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load_from_path(path),
            None => Config::load(),
        }
        .with_context(|| "Failed to load configuration")?;

        if let Some(flavor) = &self.flavor {
            config.provider.flavor = flavor.parse::<WireFlavor>()?;
        }
        if let Some(model) = &self.model {
            config.provider.model = Some(model.clone());
        }
        if let Some(workspace) = &self.workspace {
            config.agent.workspace = Some(workspace.to_string_lossy().into_owned());
        }
        if let Some(max_turns) = self.max_turns {
            config.agent.max_turns = max_turns;
        }
        Ok(config)
    }
}

/// Entry point for the CLI - called from main().
pub async fn run() -> Result<()> {
    // A missing .env is normal.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = cli.load_config()?;
    ferrule::utils::init_logging(&config.logging)?;

    match cli.command {
        Some(Commands::Tools { json }) => tools::cmd_tools(&config, json),
        None => {
            agent::cmd_agent(
                config,
                agent::AgentArgs {
                    instruction: cli.instruction,
                    interactive: cli.interactive,
                    yes: cli.yes,
                },
            )
            .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_instruction_and_flags() {
        let cli = Cli::try_parse_from([
            "ferrule",
            "--flavor",
            "tool_calls",
            "-y",
            "--max-turns",
            "5",
            "list the files",
        ])
        .unwrap();
        assert_eq!(cli.instruction.as_deref(), Some("list the files"));
        assert_eq!(cli.flavor.as_deref(), Some("tool_calls"));
        assert!(cli.yes);
        assert_eq!(cli.max_turns, Some(5));
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_parse_tools_subcommand() {
        let cli = Cli::try_parse_from(["ferrule", "tools", "--json"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Tools { json: true })));
    }

    #[test]
    fn test_cli_overrides_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"provider": {"model": "from-file"}}"#).unwrap();

        let cli = Cli::try_parse_from([
            "ferrule",
            "--config",
            path.to_str().unwrap(),
            "--flavor",
            "openai",
            "--model",
            "from-cli",
            "x",
        ])
        .unwrap();
        let config = cli.load_config().unwrap();
        assert_eq!(config.provider.flavor, WireFlavor::ToolCalls);
        assert_eq!(config.provider.model.as_deref(), Some("from-cli"));
    }

    #[test]
    fn test_bad_flavor_is_error() {
        let cli = Cli::try_parse_from(["ferrule", "--flavor", "smoke-signals", "x"]).unwrap();
        assert!(cli.load_config().is_err());
    }
}
