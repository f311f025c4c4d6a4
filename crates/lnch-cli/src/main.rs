use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::debug;

use lnch_cli::{Cli, Commands};
use lnch_observe::{LoggerConfig, logger_init};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let cfg = LoggerConfig::from_flags(&cli.log_level, &cli.log_format)?;
    logger_init(&cfg)?;
    debug!(target: "lnch.cli", format = %cfg.format, level = %cfg.level, "logger initialized");

    match cli.command {
        Commands::Launch(cmd) => cmd.run().await,
        Commands::Explain(cmd) => cmd.run(),
        Commands::Kill(cmd) => cmd.run().await,
    }
}
