mod cli;
mod commands;
mod hana;
mod operators;
mod registry;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Execute {
            operator,
            arguments,
        } => commands::execute::run(&operator, &arguments).await,
        Command::Operators => {
            commands::operators::run();
            Ok(())
        }
    }
}
