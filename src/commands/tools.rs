use clap::{Args, Subcommand};
use serde_json::Value;

use crate::assistant::builtin_registry;
use crate::commands::env_string;
use crate::tools::ToolRegistry;
use crate::tools::calendar::DEFAULT_CALENDAR_FILE;

#[derive(Debug, Args, Clone)]
pub struct ToolsArgs {
    #[command(subcommand)]
    command: ToolsSubcommand,
}

#[derive(Debug, Subcommand, Clone)]
enum ToolsSubcommand {
    /// List the locally registered tools
    List,
    /// Execute one tool directly with JSON arguments
    Run {
        /// Tool name, e.g. calculator
        name: String,
        /// JSON argument object, e.g. '{"expression": "2+2"}'
        #[arg(default_value = "{}")]
        args: String,
        /// Local calendar JSON file
        #[arg(long)]
        calendar_file: Option<String>,
    },
}

pub async fn run(args: ToolsArgs) -> Result<(), String> {
    match args.command {
        ToolsSubcommand::List => {
            let registry = local_registry(None)?;
            for tool in registry.tools() {
                println!("{}: {}", tool.name(), tool.description());
            }
            Ok(())
        }
        ToolsSubcommand::Run {
            name,
            args,
            calendar_file,
        } => {
            let registry = local_registry(calendar_file)?;
            let tool = registry.get(&name).ok_or_else(|| {
                format!(
                    "Unknown tool '{name}'. Available tools: {}.",
                    registry.names().join(", ")
                )
            })?;

            let payload: Value = serde_json::from_str(&args)
                .map_err(|err| format!("Invalid JSON arguments: {err}"))?;
            println!("{}", tool.invoke(&payload).await);
            Ok(())
        }
    }
}

// Document search needs a configured index and a model, so only the local
// tools are exposed here.
fn local_registry(calendar_file: Option<String>) -> Result<ToolRegistry, String> {
    let calendar_file = calendar_file
        .or_else(|| env_string("FP_CALENDAR_FILE"))
        .unwrap_or_else(|| DEFAULT_CALENDAR_FILE.to_string());
    builtin_registry(&calendar_file, None)
        .map_err(|err| format!("Failed to build tool registry: {err}"))
}
