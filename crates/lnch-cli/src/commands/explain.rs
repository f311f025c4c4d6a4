use std::{path::PathBuf, process::ExitCode};

use anyhow::Result;
use clap::Args;

use lnch_core::{LaunchPlan, explain};

use crate::job;

/// Print every command line, environment and log location a launch would use.
#[derive(Args, Debug, Clone)]
pub struct ExplainCommand {
    /// Job file (JSON)
    pub job: PathBuf,

    /// Emit the plan as JSON instead of text
    #[arg(long)]
    pub json: bool,

    /// Raw arguments appended to every command line
    #[arg(last = true)]
    pub raw: Vec<String>,
}

impl ExplainCommand {
    pub fn run(self) -> Result<ExitCode> {
        let loaded = job::load(&self.job, self.raw)?;
        let plan = LaunchPlan::build(&loaded.job, loaded.launcher.arg_style)?;

        if self.json {
            println!("{}", explain::render_json(&plan)?);
        } else {
            print!("{}", explain::render(&plan));
        }
        Ok(ExitCode::SUCCESS)
    }
}
