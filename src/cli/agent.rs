//! Agent command handlers (single instruction + interactive).

use std::io::{self, BufRead, Write};

use anyhow::{bail, Result};

use ferrule::agent::AgentLoop;
use ferrule::config::Config;

use super::common::create_agent;

/// Options for the default command.
#[derive(Debug, Clone, Default)]
pub(crate) struct AgentArgs {
    pub instruction: Option<String>,
    pub interactive: bool,
    pub yes: bool,
}

/// Run one instruction, or read instructions from the terminal.
pub(crate) async fn cmd_agent(config: Config, args: AgentArgs) -> Result<()> {
    let instruction = args
        .instruction
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    if instruction.is_none() && !args.interactive {
        bail!("No instruction given. Pass one as an argument or use --interactive");
    }

    let mut agent = create_agent(&config, args.yes)?;

    if let Some(instruction) = instruction {
        run_instruction(&mut agent, &instruction).await?;
    }
    if args.interactive {
        interactive(&mut agent).await?;
    }
    Ok(())
}

async fn run_instruction(agent: &mut AgentLoop, instruction: &str) -> Result<()> {
    let outcome = agent.run(instruction).await?;
    println!(
        "Task complete ({} turns, {} tool calls, {} nudges).",
        outcome.turns, outcome.tool_calls, outcome.nudges
    );
    Ok(())
}

/// Read-eval loop. The same agent is reused so allow-list entries and
/// approved previews carry over between instructions.
async fn interactive(agent: &mut AgentLoop) -> Result<()> {
    println!("Ferrule interactive agent");
    println!("Type an instruction and press Enter. Type 'quit' to stop.");
    println!();

    loop {
        let Some(input) = prompt_instruction().await? else {
            println!();
            break;
        };
        if input.is_empty() {
            continue;
        }
        if input == "quit" {
            println!("Goodbye!");
            break;
        }

        if let Err(e) = run_instruction(agent, &input).await {
            eprintln!("Error: {}", e);
            eprintln!();
        }
    }
    Ok(())
}

/// Print the prompt and read one line. `None` on EOF.
async fn prompt_instruction() -> Result<Option<String>> {
    let line = tokio::task::spawn_blocking(|| -> io::Result<Option<String>> {
        let mut stdout = io::stdout();
        write!(stdout, "> ")?;
        stdout.flush()?;

        let mut input = String::new();
        if io::stdin().lock().read_line(&mut input)? == 0 {
            return Ok(None);
        }
        Ok(Some(input.trim().to_string()))
    })
    .await??;
    Ok(line)
}
