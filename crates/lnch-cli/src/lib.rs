//! The `lnch` command line: plan, run and clean up distributed jobs.
pub mod commands;
pub mod job;

use clap::{Parser, Subcommand};

pub use commands::{ExplainCommand, KillCommand, LaunchCommand};

#[derive(Parser, Debug)]
#[command(name = "lnch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Log filter directive, e.g. `info` or `lnch.core=debug,warn`
    #[arg(long, global = true, default_value = "info", env = "LNCH_LOG")]
    pub log_level: String,

    /// Log output format: text, json or journald
    #[arg(long, global = true, default_value = "text")]
    pub log_format: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the scheduler, then every worker, and wait for the job to finish
    Launch(LaunchCommand),

    /// Print the commands a launch would run, without starting anything
    Explain(ExplainCommand),

    /// Kill every process started from the job's binaries on every host
    Kill(KillCommand),
}
