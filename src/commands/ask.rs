use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::Args;
use serde_json::{Value, json};

use crate::commands::{
    ModelArgs, Settings, UsageRecorder, build_assistant, make_chat_client, resolve_settings,
};
use crate::llm::chat::ChatModel;
use crate::router::heuristic_route;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Text,
    Json,
}

impl OutputMode {
    fn as_str(self) -> &'static str {
        match self {
            OutputMode::Text => "text",
            OutputMode::Json => "json",
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct AskArgs {
    /// Question to ask; read from stdin when omitted
    pub question: Option<String>,

    #[command(flatten)]
    pub model_args: ModelArgs,

    /// Session identifier scoping conversation memory
    #[arg(long, default_value = "default")]
    pub session: String,

    /// Print the resolved request plan as JSON without calling any provider
    #[arg(long)]
    pub dry_run: bool,

    /// Shorthand for --output json
    #[arg(long)]
    pub json: bool,

    /// Output format (text, json)
    #[arg(long)]
    pub output: Option<String>,

    /// Also write the JSON payload to this file
    #[arg(long)]
    pub save: Option<PathBuf>,

    /// Print token usage and latency to stderr
    #[arg(long)]
    pub show_usage: bool,
}

pub async fn run(args: AskArgs) -> Result<(), String> {
    let settings = resolve_settings(&args.model_args)?;
    let output = resolve_output(&args, &settings)?;
    let show_usage = args.show_usage || settings.show_usage.unwrap_or(false);
    let question = resolve_question(args.question.as_deref())?;

    if args.dry_run {
        let body = dry_run_body(&settings, &args.session, output, &question);
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
        if let Some(path) = &args.save {
            save_payload(path, &body)?;
        }
        if show_usage {
            eprintln!("usage: unavailable latency_ms=0 (dry-run)");
        }
        return Ok(());
    }

    let recorder = Arc::new(UsageRecorder::new(Arc::new(make_chat_client(&settings))));
    let model: Arc<dyn ChatModel> = recorder.clone();
    let assistant = build_assistant(&settings, model).await?;

    let started = Instant::now();
    let answer = assistant.respond(&args.session, &question).await;
    let latency_ms = started.elapsed().as_millis();

    let body = json!({
        "provider": settings.provider.as_str(),
        "model": settings.model,
        "session": args.session,
        "content": answer,
    });

    match output {
        OutputMode::Text => println!("{answer}"),
        OutputMode::Json => {
            println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default())
        }
    }
    if let Some(path) = &args.save {
        save_payload(path, &body)?;
    }

    if show_usage {
        let totals = recorder.totals();
        if totals.reported {
            eprintln!(
                "usage: prompt_tokens={} completion_tokens={} latency_ms={latency_ms}",
                totals.prompt_tokens, totals.completion_tokens
            );
        } else {
            eprintln!("usage: unavailable latency_ms={latency_ms}");
        }
    }

    Ok(())
}

fn resolve_output(args: &AskArgs, settings: &Settings) -> Result<OutputMode, String> {
    let requested = if args.json {
        Some("json".to_string())
    } else {
        args.output.clone().or_else(|| settings.output.clone())
    };

    match requested.as_deref() {
        None | Some("text") => Ok(OutputMode::Text),
        Some("json") => Ok(OutputMode::Json),
        Some(other) => Err(format!(
            "Invalid output '{other}'. Supported values: text, json."
        )),
    }
}

fn resolve_question(argument: Option<&str>) -> Result<String, String> {
    if let Some(question) = argument {
        let trimmed = question.trim();
        if !trimmed.is_empty() {
            return Ok(trimmed.to_string());
        }
    }

    let stdin = io::read_to_string(io::stdin())
        .map_err(|err| format!("Failed to read question from stdin: {err}"))?;
    let trimmed = stdin.trim();
    if trimmed.is_empty() {
        return Err("No question provided. Pass it as an argument or on stdin.".to_string());
    }
    Ok(trimmed.to_string())
}

/// The request plan printed by `--dry-run`. The intent field reflects the
/// heuristic routing only; the model fallback never runs in a dry run.
fn dry_run_body(
    settings: &Settings,
    session: &str,
    output: OutputMode,
    question: &str,
) -> Value {
    let intent = heuristic_route(question)
        .map(|intent| Value::String(intent.as_str().to_string()))
        .unwrap_or(Value::Null);

    json!({
        "dry_run": true,
        "provider": settings.provider.as_str(),
        "model": settings.model,
        "mode": settings.mode.as_str(),
        "session": session,
        "intent": intent,
        "output": output.as_str(),
        "messages": [{ "role": "user", "content": question }],
        "request": {
            "temperature": settings.options.temperature,
            "max_tokens": settings.options.max_tokens,
            "timeout_secs": settings.options.timeout_secs,
            "retries": settings.options.retries,
            "max_steps": settings.max_steps,
        },
    })
}

fn save_payload(path: &Path, body: &Value) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|err| {
                format!(
                    "Failed to create output directory '{}': {err}",
                    parent.display()
                )
            })?;
        }
    }
    let raw = serde_json::to_string(body)
        .map_err(|err| format!("Failed to serialize output payload: {err}"))?;
    fs::write(path, raw)
        .map_err(|err| format!("Failed to write output file '{}': {err}", path.display()))
}
