use std::{fmt, path::PathBuf};

use async_trait::async_trait;

use lnch_model::{HostEntry, LaunchSpec, NodeId, Pid};

use crate::error::RemoteExecError;

/// Destination of a process's stdout and stderr on its host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSink {
    pub path: PathBuf,
}

/// Handle to a process a backend has confirmed running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessHandle {
    pub node: NodeId,
    pub host: HostEntry,
    pub pid: Pid,
    /// Name of the backend that owns the process.
    pub backend: &'static str,
    pub log: PathBuf,
}

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessExit {
    /// Normal exit with a status code.
    Code(i32),
    /// Killed by a signal.
    Signaled(i32),
    /// Gone without a recorded status (host rebooted, status file removed, ...).
    Vanished,
}

impl fmt::Display for ProcessExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessExit::Code(c) => write!(f, "exit code {c}"),
            ProcessExit::Signaled(s) => write!(f, "killed by signal {s}"),
            ProcessExit::Vanished => f.write_str("vanished without exit status"),
        }
    }
}

/// Signal sent during teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StopSignal {
    Term,
    Kill,
}

impl StopSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopSignal::Term => "TERM",
            StopSignal::Kill => "KILL",
        }
    }
}

/// Starts, observes and stops processes on cluster hosts.
///
/// Implementations are expected to:
/// - export the spec's environment and apply its core-dump policy,
/// - detach the process from the connection used to start it,
/// - send stdout/stderr to the given sink,
/// - return only once the host confirmed that the process exists.
#[async_trait]
pub trait ProcessBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this backend can reach `host`.
    fn supports(&self, host: &HostEntry) -> bool;

    async fn spawn(
        &self,
        spec: &LaunchSpec,
        sink: &LogSink,
    ) -> Result<ProcessHandle, RemoteExecError>;

    /// Resolves once the process has exited.
    async fn wait(&self, handle: &ProcessHandle) -> Result<ProcessExit, RemoteExecError>;

    async fn signal(
        &self,
        handle: &ProcessHandle,
        signal: StopSignal,
    ) -> Result<(), RemoteExecError>;

    /// Last `lines` lines of the process log.
    async fn tail_log(
        &self,
        handle: &ProcessHandle,
        lines: usize,
    ) -> Result<String, RemoteExecError>;

    /// Best-effort kill of every process on `host` whose command line matches `pattern`.
    async fn kill_matching(&self, host: &HostEntry, pattern: &str)
    -> Result<(), RemoteExecError>;
}
