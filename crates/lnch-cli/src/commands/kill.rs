use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::Result;
use clap::Args;
use tracing::info;

use lnch_core::{ClusterLauncher, LaunchPlan};
use lnch_exec::default_router;

use crate::job;

/// Kill leftovers of a job: `pkill -f` of both binaries on every host.
#[derive(Args, Debug, Clone)]
pub struct KillCommand {
    /// Job file (JSON)
    pub job: PathBuf,

    /// Treat every host as this machine
    #[arg(long)]
    pub local: bool,
}

impl KillCommand {
    pub async fn run(self) -> Result<ExitCode> {
        let loaded = job::load(&self.job, Vec::new())?;
        let plan = LaunchPlan::build(&loaded.job, loaded.launcher.arg_style)?;
        let router = default_router(&loaded.backend_options(self.local));
        let launcher = ClusterLauncher::new(Arc::new(router), loaded.launcher);

        let failed = launcher.kill(&plan).await;
        if failed.is_empty() {
            info!(target: "lnch.cli", hosts = plan.node_count(), "kill complete");
            return Ok(ExitCode::SUCCESS);
        }
        for (host, err) in &failed {
            eprintln!("{host}: {err}");
        }
        Ok(ExitCode::FAILURE)
    }
}
