use std::io::{self, BufRead, IsTerminal, Write};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::Args;
use owo_colors::OwoColorize;

use crate::commands::{ModelArgs, build_assistant, make_chat_client, resolve_settings};
use crate::llm::chat::ChatModel;
use crate::llm::provider::{api_key_env, is_api_key_present};

#[derive(Debug, Args, Clone)]
pub struct ChatArgs {
    #[command(flatten)]
    pub model_args: ModelArgs,

    /// Session identifier; generated when omitted
    #[arg(long)]
    pub session: Option<String>,
}

pub async fn run(args: ChatArgs) -> Result<(), String> {
    let settings = resolve_settings(&args.model_args)?;
    let session = args.session.clone().unwrap_or_else(generated_session_id);

    let model: Arc<dyn ChatModel> = Arc::new(make_chat_client(&settings));
    let assistant = build_assistant(&settings, model).await?;

    if !is_api_key_present(settings.provider) {
        eprintln!(
            "warning: {} is not set; model calls will fail",
            api_key_env(settings.provider)
        );
    }

    let styled = io::stdout().is_terminal();
    let tool_names = assistant.registry().names().join(", ");
    println!(
        "finpilot assistant (mode: {}, session: {session})",
        settings.mode.as_str()
    );
    println!("Tools: {tool_names}. Type 'exit' to quit.");

    let stdin = io::stdin();
    loop {
        prompt(styled, "you> ")?;
        let mut line = String::new();
        let read = stdin
            .lock()
            .read_line(&mut line)
            .map_err(|err| format!("Failed to read input: {err}"))?;
        if read == 0 {
            break;
        }

        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("exit") || question.eq_ignore_ascii_case("quit") {
            break;
        }

        let answer = assistant.respond(&session, question).await;
        if styled {
            println!("{} {answer}", "assistant>".green());
        } else {
            println!("assistant> {answer}");
        }
    }

    Ok(())
}

fn prompt(styled: bool, label: &str) -> Result<(), String> {
    let mut stdout = io::stdout();
    if styled {
        write!(stdout, "{}", label.cyan()).map_err(|err| format!("Failed to write prompt: {err}"))?;
    } else {
        write!(stdout, "{label}").map_err(|err| format!("Failed to write prompt: {err}"))?;
    }
    stdout
        .flush()
        .map_err(|err| format!("Failed to flush prompt: {err}"))
}

fn generated_session_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    format!("cli-{nanos}")
}
