//! Deepresearch CLI entry point.

use anyhow::Result;
use clap::Parser;

use deepresearch::cli::{commands, handle_error, Cli, Commands};
use deepresearch::infrastructure::config::ConfigLoader;
use deepresearch::infrastructure::logging::{LogConfig, LoggerImpl};

async fn run(cli: Cli) -> Result<i32> {
    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };
    // Held until the command returns so the file writer flushes.
    let _logger = LoggerImpl::init(&LogConfig::try_from(&config.logging)?)?;

    match cli.command {
        Commands::Run(args) => commands::run::execute(args, config, cli.json).await,
        Commands::Resume(args) => commands::resume::execute(args, config, cli.json).await,
        Commands::Status(args) => commands::status::execute(args, config, cli.json).await,
        Commands::Gate(args) => commands::gate::execute(args, config, cli.json).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json = cli.json;

    match run(cli).await {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(err) => handle_error(err, json),
    }
}
