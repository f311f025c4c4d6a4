mod bus;
mod session;
pub use session::ClusterSession;

#[cfg(test)]
mod fake;

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{info, instrument, warn};

use lnch_model::{HostEntry, Subscribe};

use crate::{
    backend::ProcessBackend,
    config::LauncherConfig,
    error::{LaunchError, RemoteExecError},
    plan::LaunchPlan,
    report::SessionOutcome,
};

/// Entry point for launching plans against a process backend.
///
/// The launcher itself holds no session state: every call to [`ClusterLauncher::session`]
/// creates an independent [`ClusterSession`].
#[derive(Clone)]
pub struct ClusterLauncher {
    backend: Arc<dyn ProcessBackend>,
    config: LauncherConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl ClusterLauncher {
    pub fn new(backend: Arc<dyn ProcessBackend>, config: LauncherConfig) -> Self {
        Self {
            backend,
            config,
            subscribers: Vec::new(),
        }
    }

    pub fn with_subscriber(mut self, subscriber: Arc<dyn Subscribe>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }

    /// Create a session for `plan`. Nothing starts until [`ClusterSession::launch`].
    pub fn session(&self, plan: LaunchPlan) -> ClusterSession {
        ClusterSession::new(
            plan,
            Arc::clone(&self.backend),
            self.config.clone(),
            self.subscribers.clone(),
        )
    }

    /// Launch `plan` and block until the session is torn down.
    pub async fn run(&self, plan: LaunchPlan) -> Result<SessionOutcome, LaunchError> {
        self.session(plan).launch().await
    }

    /// Best-effort kill of every process started from the plan's binaries, on every host.
    ///
    /// Returns the hosts that could not be cleaned.
    #[instrument(level = "info", skip_all, fields(hosts = plan.node_count()))]
    pub async fn kill(&self, plan: &LaunchPlan) -> Vec<(HostEntry, RemoteExecError)> {
        let mut patterns = vec![plan.scheduler.binary.clone()];
        if let Some(worker) = plan.workers.first()
            && worker.binary != plan.scheduler.binary
        {
            patterns.push(worker.binary.clone());
        }

        let mut set = JoinSet::new();
        for spec in plan.specs() {
            let backend = Arc::clone(&self.backend);
            let host = spec.host.clone();
            let patterns = patterns.clone();
            set.spawn(async move {
                for pattern in &patterns {
                    if let Err(e) = backend.kill_matching(&host, pattern).await {
                        return Err((host, e));
                    }
                }
                Ok(host)
            });
        }

        let mut failed = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok(host)) => info!(target: "lnch.core.launcher", host = %host, "kill sent"),
                Ok(Err((host, e))) => {
                    warn!(target: "lnch.core.launcher", host = %host, error = %e, "kill failed");
                    failed.push((host, e));
                }
                Err(e) => warn!(target: "lnch.core.launcher", error = %e, "kill task panicked"),
            }
        }
        failed
    }
}
