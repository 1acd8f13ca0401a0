use std::io;
use std::process;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, shells};
use finpilot::commands::ask::{self, AskArgs};
use finpilot::commands::chat::{self, ChatArgs};
use finpilot::commands::config::{self, ConfigArgs};
use finpilot::commands::tools::{self, ToolsArgs};
use finpilot::logging;

const ROOT_HELP_EXAMPLES: &str = "Examples:\n  finpilot ask --provider openai --model gpt-4o-mini \"Calculate 5000 * (1 + 0.045)^5\"\n  echo \"What is the weather in Paris?\" | finpilot ask --provider openai --model gpt-4o-mini\n  finpilot chat --provider openai --model gpt-4o-mini --mode direct\n  finpilot tools run calculator '{\"expression\": \"2+2\"}'\n  finpilot config check\n  finpilot completion bash > ~/.local/share/bash-completion/completions/finpilot";

const ASK_HELP_EXAMPLES: &str = "Examples:\n  finpilot ask --provider openai --model gpt-4o-mini \"2+2?\"\n  echo \"2+2?\" | finpilot ask --provider openai --model gpt-4o-mini\n  finpilot ask --provider openai --model gpt-4o-mini --dry-run --json \"According to the manual, what is the refund policy?\"";

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("FP_GIT_SHA"),
    ")"
);

#[derive(Debug, Parser)]
#[command(
    name = "finpilot",
    version = VERSION,
    about = "Chat assistant with tool calling and document retrieval",
    after_help = ROOT_HELP_EXAMPLES
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Chat interactively with per-session memory")]
    Chat(ChatArgs),
    #[command(about = "Ask one question through the full pipeline", after_help = ASK_HELP_EXAMPLES)]
    Ask(AskArgs),
    #[command(about = "Inspect or execute registered tools")]
    Tools(ToolsArgs),
    #[command(about = "Manage local config")]
    Config(ConfigArgs),
    #[command(about = "Generate shell completion script")]
    Completion {
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

fn print_completion(shell: CompletionShell) {
    let mut cmd = Cli::command();
    match shell {
        CompletionShell::Bash => generate(shells::Bash, &mut cmd, "finpilot", &mut io::stdout()),
        CompletionShell::Zsh => generate(shells::Zsh, &mut cmd, "finpilot", &mut io::stdout()),
        CompletionShell::Fish => generate(shells::Fish, &mut cmd, "finpilot", &mut io::stdout()),
    }
}

#[tokio::main]
async fn main() {
    logging::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Chat(args) => chat::run(args).await,
        Commands::Ask(args) => ask::run(args).await,
        Commands::Tools(args) => tools::run(args).await,
        Commands::Config(args) => config::run(args),
        Commands::Completion { shell } => {
            print_completion(shell);
            Ok(())
        }
    };

    if let Err(err) = result {
        eprintln!("{err}");
        process::exit(1);
    }
}
