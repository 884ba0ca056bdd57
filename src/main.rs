use clap::Parser;
use r9s::cli::Cli;
use r9s::config::LOG_VAR;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };
    let code = runtime.block_on(r9s::cli::run(cli));
    // A pending stdin read cannot be cancelled; don't wait for it.
    runtime.shutdown_background();
    code
}

/// Logs go to stderr so piped chat output stays clean. Off unless asked for.
fn init_tracing(verbose: bool) {
    let from_env = std::env::var(LOG_VAR).ok().filter(|v| !v.trim().is_empty());
    if !verbose && from_env.is_none() {
        return;
    }
    let filter = from_env
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("r9s=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
