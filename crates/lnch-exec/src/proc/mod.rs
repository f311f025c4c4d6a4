use std::{collections::HashMap, process::Stdio, sync::Mutex};

use async_trait::async_trait;
use tokio::{process::Command, sync::watch};
use tracing::{debug, trace, warn};

use lnch_core::{
    LogSink, ProcessBackend, ProcessExit, ProcessHandle, StopSignal, error::RemoteExecError,
};
use lnch_model::{HostEntry, LaunchSpec, Pid};

use crate::{
    host::is_local_host,
    util::{exit_from_status, signal_group, tail_lines},
    utils::limits::{RlimitConfig, attach_rlimits},
};

/// Spawns processes directly on this machine.
///
/// Children run in their own process group with the core-dump rlimit set
/// before `exec`. Exits are reaped by a background task per child.
pub struct LocalProcessManager {
    name: &'static str,
    /// Serve every host, not only the ones that resolve to this machine.
    any_host: bool,
    exits: Mutex<HashMap<Pid, watch::Receiver<Option<ProcessExit>>>>,
}

impl LocalProcessManager {
    pub fn new() -> Self {
        Self {
            name: "local",
            any_host: false,
            exits: Mutex::new(HashMap::new()),
        }
    }

    /// Run every node on this machine regardless of its hostfile address.
    pub fn for_all_hosts(mut self) -> Self {
        self.any_host = true;
        self
    }

    fn receiver(&self, pid: Pid) -> Option<watch::Receiver<Option<ProcessExit>>> {
        self.exits
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&pid)
            .cloned()
    }
}

impl Default for LocalProcessManager {
    fn default() -> Self {
        Self::new()
    }
}

fn spawn_err(host: &HostEntry, reason: impl ToString) -> RemoteExecError {
    RemoteExecError::Spawn {
        host: host.address.clone(),
        reason: reason.to_string(),
    }
}

#[async_trait]
impl ProcessBackend for LocalProcessManager {
    fn name(&self) -> &'static str {
        self.name
    }

    fn supports(&self, host: &HostEntry) -> bool {
        self.any_host || is_local_host(&host.address)
    }

    async fn spawn(
        &self,
        spec: &LaunchSpec,
        sink: &LogSink,
    ) -> Result<ProcessHandle, RemoteExecError> {
        if let Some(key) = spec.env.invalid_key() {
            return Err(spawn_err(
                &spec.host,
                format!("invalid environment variable name '{key}'"),
            ));
        }
        if let Some(dir) = sink.path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| spawn_err(&spec.host, format!("log dir {}: {e}", dir.display())))?;
        }
        let log = std::fs::File::create(&sink.path)
            .map_err(|e| spawn_err(&spec.host, format!("log {}: {e}", sink.path.display())))?;
        let log_err = log.try_clone().map_err(|e| spawn_err(&spec.host, e))?;

        let mut cmd = Command::new(&spec.binary);
        cmd.args(&spec.args)
            .envs(spec.env.iter().map(|kv| (kv.key(), kv.value())))
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err));
        #[cfg(unix)]
        cmd.process_group(0);
        attach_rlimits(&mut cmd, &RlimitConfig::for_core(spec.core));

        trace!(target: "lnch.exec.local", binary = %spec.binary, args = ?spec.args, "spawn");
        let mut child = cmd
            .spawn()
            .map_err(|e| spawn_err(&spec.host, format!("{}: {e}", spec.binary)))?;
        let pid = child
            .id()
            .ok_or_else(|| spawn_err(&spec.host, "child exited before its pid was read"))?;

        let (tx, rx) = watch::channel(None);
        self.exits
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(pid, rx);

        let node = spec.node;
        tokio::spawn(async move {
            let exit = match child.wait().await {
                Ok(status) => exit_from_status(status),
                Err(e) => {
                    warn!(target: "lnch.exec.local", %node, pid, error = %e, "wait failed");
                    ProcessExit::Vanished
                }
            };
            debug!(target: "lnch.exec.local", %node, pid, exit = %exit, "child exited");
            let _ = tx.send(Some(exit));
        });

        Ok(ProcessHandle {
            node: spec.node,
            host: spec.host.clone(),
            pid,
            backend: self.name,
            log: sink.path.clone(),
        })
    }

    async fn wait(&self, handle: &ProcessHandle) -> Result<ProcessExit, RemoteExecError> {
        let mut rx = self
            .receiver(handle.pid)
            .ok_or_else(|| RemoteExecError::Io(format!("pid {} is not tracked", handle.pid)))?;
        let exit = *rx
            .wait_for(Option::is_some)
            .await
            .map_err(|e| RemoteExecError::Io(e.to_string()))?;
        self.exits
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(&handle.pid);
        Ok(exit.unwrap_or(ProcessExit::Vanished))
    }

    async fn signal(
        &self,
        handle: &ProcessHandle,
        signal: StopSignal,
    ) -> Result<(), RemoteExecError> {
        debug!(target: "lnch.exec.local", node = %handle.node, pid = handle.pid, signal = signal.as_str(), "signal");
        signal_group(handle.pid, signal).map_err(RemoteExecError::from)
    }

    async fn tail_log(
        &self,
        handle: &ProcessHandle,
        lines: usize,
    ) -> Result<String, RemoteExecError> {
        let text = tokio::fs::read_to_string(&handle.log).await?;
        Ok(tail_lines(&text, lines))
    }

    async fn kill_matching(
        &self,
        _host: &HostEntry,
        pattern: &str,
    ) -> Result<(), RemoteExecError> {
        let status = Command::new("pkill")
            .arg("-f")
            .arg("--")
            .arg(pattern)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;
        // pkill exits 1 when nothing matched
        match status.code() {
            Some(0 | 1) => Ok(()),
            _ => Err(RemoteExecError::Io(format!("pkill failed: {status}"))),
        }
    }
}
