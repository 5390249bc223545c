mod cli;
mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use std::process::ExitCode;
use toolhost_core::{ToolhostConfig, ToolhostError};
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn setup_logging(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| {
        eprintln!("Warning: invalid log level '{level}', using info");
        EnvFilter::new("info")
    });

    // Stdout carries tool results only.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}

async fn execute(cli: Cli) -> Result<()> {
    let config = ToolhostConfig::load(cli.root.as_deref()).context("failed to load configuration")?;
    debug!(root = ?config.root, command = ?cli.command, "dispatching command");

    match &cli.command {
        Command::List => commands::list(&config).await,
        Command::Update => commands::update(&config).await,
        Command::Run(_) => {
            let Some((name, extra)) = cli.command.tool() else {
                anyhow::bail!("missing tool name");
            };
            commands::run(&config, name, extra).await
        }
    }
}

/// Print the terminal error once. A failed tool's stderr has already been
/// relayed verbatim, so only its exit status is repeated here.
fn report(e: &anyhow::Error) {
    match e.downcast_ref::<ToolhostError>() {
        Some(ToolhostError::Execution { name, code, .. }) => match code {
            Some(code) => eprintln!("Error: tool '{name}' failed with exit code {code}"),
            None => eprintln!("Error: tool '{name}' was terminated by a signal"),
        },
        _ => eprintln!("Error: {e:#}"),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    setup_logging(&cli.log_level);

    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
    }
}
