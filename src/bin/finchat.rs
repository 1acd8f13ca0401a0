use std::process;

use clap::Parser;
use finpilot::commands::chat::{self, ChatArgs};
use finpilot::logging;

#[derive(Debug, Parser)]
#[command(
    name = "finchat",
    about = "Chat interactively with per-session memory",
    disable_version_flag = true
)]
struct Cli {
    #[command(flatten)]
    chat: ChatArgs,
}

#[tokio::main]
async fn main() {
    logging::init();
    let cli = Cli::parse();
    if let Err(err) = chat::run(cli.chat).await {
        eprintln!("{err}");
        process::exit(1);
    }
}
