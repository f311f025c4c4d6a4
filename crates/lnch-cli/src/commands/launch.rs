use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::Result;
use clap::Args;
use tracing::{info, warn};

use lnch_core::{ClusterLauncher, LaunchPlan, SessionOutcome};
use lnch_exec::default_router;
use lnch_observe::LogSubscriber;

use crate::job;

/// Launch a job and wait until every process has finished.
///
/// Ctrl-C tears the whole cluster down. Exits 0 only when every process
/// exited successfully.
#[derive(Args, Debug, Clone)]
pub struct LaunchCommand {
    /// Job file (JSON)
    pub job: PathBuf,

    /// Run every node on this machine, whatever the hostfile says
    #[arg(long)]
    pub local: bool,

    /// Raw arguments appended to every command line
    #[arg(last = true)]
    pub raw: Vec<String>,
}

impl LaunchCommand {
    pub async fn run(self) -> Result<ExitCode> {
        let loaded = job::load(&self.job, self.raw)?;
        let plan = LaunchPlan::build(&loaded.job, loaded.launcher.arg_style)?;
        let router = default_router(&loaded.backend_options(self.local));
        let launcher = ClusterLauncher::new(Arc::new(router), loaded.launcher)
            .with_subscriber(Arc::new(LogSubscriber));

        let session = launcher.session(plan);
        let scheduler_log = session.log_path(&session.plan().scheduler);
        info!(
            target: "lnch.cli",
            session = session.id(),
            nodes = session.plan().node_count(),
            logs = %scheduler_log.parent().unwrap_or(&scheduler_log).display(),
            "launching"
        );

        let stopper = session.clone();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!(target: "lnch.cli", "interrupted; tearing down");
                stopper.stop().await;
            }
        });

        let result = session.launch().await;
        interrupt.abort();

        match result {
            Ok(outcome) => {
                report(&outcome);
                Ok(ExitCode::from(outcome.exit_code() as u8))
            }
            Err(err) => {
                match session.failure() {
                    Some(failure) => eprintln!("{failure}"),
                    None => eprintln!("launch failed: {err}"),
                }
                Ok(ExitCode::FAILURE)
            }
        }
    }
}

fn report(outcome: &SessionOutcome) {
    if let Some(failure) = &outcome.failure {
        eprintln!("{failure}");
    }
    for err in &outcome.teardown.errors {
        eprintln!("teardown: {err}");
    }
    info!(
        target: "lnch.cli",
        session = %outcome.session_id,
        verdict = %outcome.verdict,
        processes = outcome.processes.len(),
        signalled = outcome.teardown.signalled,
        "session finished"
    );
}
