//! refscript CLI entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "refscript",
    version,
    about = "Bind datasets onto models, compute, and script against the results"
)]
struct Cli {
    #[command(subcommand)]
    command: refscript::cli::Commands,
}

/// Diagnostics go to stderr; stdout carries results.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    if let Err(e) = refscript::cli::dispatch(cli.command) {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}
