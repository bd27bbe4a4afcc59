//! feedcal CLI entry point.

use std::process::ExitCode;

use clap::Parser;

use feedcal_client::cli::{Cli, Command, ConfigAction};
use feedcal_client::commands;
use feedcal_client::config::ClientConfig;
use feedcal_client::error::ClientResult;
use feedcal_core::{TracingConfig, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let tracing_config = if cli.debug {
        TracingConfig::cli_debug()
    } else if matches!(cli.command, Some(Command::Watch)) && cli.json {
        TracingConfig::daemon()
    } else {
        TracingConfig::default()
    };
    if let Err(e) = init_tracing(tracing_config) {
        eprintln!("warning: {}", e);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    let config_path = cli.config.clone().unwrap_or_else(ClientConfig::default_path);
    let config = if cli.config.is_some() {
        ClientConfig::load_from(&config_path)?
    } else {
        ClientConfig::load()?
    };

    match cli.command {
        Some(Command::Fetch { force }) => commands::fetch::run(&config, force, cli.json).await,
        Some(Command::Day { date, force }) => {
            commands::day::run(&config, date, force, cli.json).await
        }
        Some(Command::Import { path }) => commands::import::run(&config, &path, cli.json).await,
        Some(Command::Watch) => commands::watch::run(&config, cli.json).await,
        Some(Command::Config { action }) => match action {
            ConfigAction::Dump => commands::config::dump(&config, &config_path),
            ConfigAction::Validate => commands::config::validate(&config),
            ConfigAction::Path => commands::config::path(&config, &config_path),
        },
        None => commands::day::run(&config, None, false, cli.json).await,
    }
}
