//! CLI entry point.

use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use readaloud_cli::{Cli, Commands, error, handlers};

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables before clap reads them
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.default_log_filter());

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if !error::already_reported(&e) {
                eprintln!("Error: {e}");
            }
            ExitCode::from(error::exit_code(&e))
        }
    }
}

/// `RUST_LOG` wins over the `-v`-derived default.
fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    match command {
        Commands::Speak { text, options } => {
            handlers::speak::execute(text, &options).await?;
        }
        Commands::Config { json, options } => {
            handlers::config::execute(&options, json)?;
        }
    }

    Ok(())
}
