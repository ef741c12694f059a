use clap::Parser;
use tracing_subscriber::EnvFilter;

mod backend;
mod cli;
mod commands;
mod output;

use cli::{Cli, Commands};
use output::OutputFormat;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise --log-level applies to the lib and this binary
    let filter = EnvFilter::try_from_default_env().or_else(|_| {
        EnvFilter::try_new(format!(
            "credstore={level}",
            level = cli.log_level
        ))
    })?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let format = OutputFormat::from_flag(cli.json);
    match &cli.command {
        Commands::Provision => commands::provision::run(&cli.connect, format).await,
        Commands::Users { command } => commands::users::run(&cli.connect, command, format).await,
    }
}
