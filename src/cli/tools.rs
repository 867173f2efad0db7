//! Tools CLI command handler - list what the model is offered.

use anyhow::Result;

use ferrule::config::Config;
use ferrule::providers::ToolDefinition;
use ferrule::tools::default_registry;

pub(crate) fn cmd_tools(config: &Config, json: bool) -> Result<()> {
    let definitions = default_registry(&config.tools)?.definitions();

    if json {
        println!("{}", serde_json::to_string_pretty(&definitions)?);
        return Ok(());
    }

    println!("{}", render_table(&definitions));
    println!("{} tool(s). Use --json for parameter schemas.", definitions.len());
    Ok(())
}

fn render_table(definitions: &[ToolDefinition]) -> String {
    let width = definitions
        .iter()
        .map(|d| d.name.len())
        .max()
        .unwrap_or(0);
    definitions
        .iter()
        .map(|d| {
            let summary = d.description.lines().next().unwrap_or_default();
            format!("  {:<width$}  {}", d.name, summary, width = width)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
