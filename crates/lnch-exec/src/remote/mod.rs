//! Process management on hosts reached through a [`RemoteShell`].
pub mod script;

use std::{path::PathBuf, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace, warn};

use lnch_core::{
    LogSink, ProcessBackend, ProcessExit, ProcessHandle, StopSignal, error::RemoteExecError,
};
use lnch_model::{HostEntry, LaunchSpec};

use crate::{shell::RemoteShell, util::exit_from_code};

/// Polling and placement settings of [`RemoteProcessManager`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Interval between liveness checks of a running process.
    pub poll_interval_ms: u64,
    /// Consecutive failed checks tolerated before the process is reported lost.
    pub max_poll_failures: u32,
    /// Directory the binary is started from; the login directory when unset.
    pub workdir: Option<PathBuf>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1_000,
            max_poll_failures: 3,
            workdir: None,
        }
    }
}

/// Starts detached processes through a shell on the target host and watches
/// them by polling.
pub struct RemoteProcessManager<S> {
    name: &'static str,
    shell: S,
    config: RemoteConfig,
}

impl<S: RemoteShell> RemoteProcessManager<S> {
    pub fn new(shell: S, config: RemoteConfig) -> Self {
        Self {
            name: "remote",
            shell,
            config,
        }
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.config.poll_interval_ms.max(10))
    }

    async fn poll_once(&self, handle: &ProcessHandle) -> Result<Option<ProcessExit>, RemoteExecError> {
        let out = self
            .shell
            .run(&handle.host, &script::poll(handle.pid, &handle.log))
            .await?;
        let line = out.stdout.trim();
        match line.split_once(' ') {
            _ if line == "running" => Ok(None),
            _ if line == "vanished" => Ok(Some(ProcessExit::Vanished)),
            Some(("exited", code)) => code
                .trim()
                .parse::<i32>()
                .map(|c| Some(exit_from_code(c)))
                .map_err(|_| protocol(&handle.host, line)),
            _ => Err(protocol(&handle.host, line)),
        }
    }
}

fn protocol(host: &HostEntry, got: &str) -> RemoteExecError {
    RemoteExecError::Protocol {
        host: host.address.clone(),
        reason: format!("unexpected output '{got}'"),
    }
}

#[async_trait]
impl<S: RemoteShell> ProcessBackend for RemoteProcessManager<S> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn supports(&self, host: &HostEntry) -> bool {
        self.shell.supports(host)
    }

    #[instrument(level = "debug", skip(self, spec, sink), fields(node = %spec.node, host = %spec.host))]
    async fn spawn(
        &self,
        spec: &LaunchSpec,
        sink: &LogSink,
    ) -> Result<ProcessHandle, RemoteExecError> {
        if let Some(key) = spec.env.invalid_key() {
            return Err(RemoteExecError::Spawn {
                host: spec.host.address.clone(),
                reason: format!("invalid environment variable name '{key}'"),
            });
        }
        let body = script::spawn(spec, &sink.path, self.config.workdir.as_deref());
        trace!(target: "lnch.exec.remote", script = %body, "spawn script");

        let out = self.shell.run(&spec.host, &body).await?;
        if !out.success() {
            let reason = match out.stderr.trim() {
                "" => format!("spawn script exited with {:?}", out.status),
                err => err.to_string(),
            };
            return Err(RemoteExecError::Spawn {
                host: spec.host.address.clone(),
                reason,
            });
        }

        let pid = out
            .stdout
            .lines()
            .last()
            .and_then(|l| l.trim().parse::<u32>().ok())
            .ok_or_else(|| protocol(&spec.host, out.stdout.trim()))?;

        debug!(target: "lnch.exec.remote", pid, log = %sink.path.display(), "process started");
        Ok(ProcessHandle {
            node: spec.node,
            host: spec.host.clone(),
            pid,
            backend: self.name,
            log: sink.path.clone(),
        })
    }

    async fn wait(&self, handle: &ProcessHandle) -> Result<ProcessExit, RemoteExecError> {
        let mut failures = 0;
        loop {
            match self.poll_once(handle).await {
                Ok(Some(exit)) => return Ok(exit),
                Ok(None) => failures = 0,
                Err(e) => {
                    failures += 1;
                    warn!(
                        target: "lnch.exec.remote",
                        node = %handle.node,
                        host = %handle.host,
                        failures,
                        error = %e,
                        "liveness check failed"
                    );
                    if failures >= self.config.max_poll_failures.max(1) {
                        return Err(e);
                    }
                }
            }
            tokio::time::sleep(self.poll_interval()).await;
        }
    }

    async fn signal(
        &self,
        handle: &ProcessHandle,
        signal: StopSignal,
    ) -> Result<(), RemoteExecError> {
        debug!(target: "lnch.exec.remote", node = %handle.node, pid = handle.pid, signal = signal.as_str(), "signal");
        self.shell
            .run(&handle.host, &script::signal(handle.pid, signal))
            .await
            .map(|_| ())
    }

    async fn tail_log(
        &self,
        handle: &ProcessHandle,
        lines: usize,
    ) -> Result<String, RemoteExecError> {
        let out = self
            .shell
            .run(&handle.host, &script::tail(&handle.log, lines))
            .await?;
        Ok(out.stdout)
    }

    async fn kill_matching(
        &self,
        host: &HostEntry,
        pattern: &str,
    ) -> Result<(), RemoteExecError> {
        self.shell
            .run(host, &script::kill_matching(pattern))
            .await
            .map(|_| ())
    }
}
