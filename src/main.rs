mod api;
mod cli;
mod commands;
mod config;
mod error;
mod models;
mod output;

use clap::Parser;
use cli::Cli;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.debug());

    match cli.execute().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("{} {e:#}", console::style("error:").red().bold());
            ExitCode::FAILURE
        }
    }
}

/// `--debug` turns on request/response tracing; RUST_LOG still wins when set.
fn init_logging(debug: bool) {
    let default_level = if debug { "labkit=debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}
