use tracing_subscriber::EnvFilter;

/// Installs the tracing subscriber for the CLI.
///
/// Events go to stderr so stdout stays parseable under `--json`. The level
/// defaults to warn; set `RUST_LOG` to raise it.
pub fn init() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
