use thiserror::Error;

use lnch_model::{ModelError, NodeId};

/// Hostfile could not be turned into a node list. Fatal: the launch never starts.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HostfileError {
    #[error("hostfile contains no hosts")]
    Empty,
    #[error("line {line}: duplicate host '{address}' (first seen on line {first_line})")]
    Duplicate {
        address: String,
        line: usize,
        first_line: usize,
    },
    #[error("line {line}: {reason}")]
    Malformed { line: usize, reason: String },
    #[error("more than one scheduler declared (lines {first_line} and {line})")]
    MultipleSchedulers { first_line: usize, line: usize },
    #[error("no scheduler: the first host is annotated as worker and no other host is declared scheduler")]
    MissingScheduler,
    #[error("failed to read hostfile '{path}': {reason}")]
    Io { path: String, reason: String },
}

/// Inputs are well-formed individually but cannot form a launch plan.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error(transparent)]
    Hostfile(#[from] HostfileError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(
        "scheduler port unknown: annotate the first hostfile entry as address:port or set the 'scheduler_port' parameter"
    )]
    MissingSchedulerPort,
    #[error("invalid scheduler port '{0}'")]
    InvalidSchedulerPort(String),
    #[error("hostfile lists only the scheduler; at least one worker host is required")]
    NoWorkers,
    #[error("binary path for {0} is empty")]
    EmptyBinary(&'static str),
}

/// Reaching or driving a host through the remote-execution primitive failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteExecError {
    #[error("cannot connect to {host}: {reason}")]
    Connect { host: String, reason: String },
    #[error("authentication to {host} failed: {reason}")]
    Auth { host: String, reason: String },
    #[error("spawn on {host} failed: {reason}")]
    Spawn { host: String, reason: String },
    #[error("unexpected response from {host}: {reason}")]
    Protocol { host: String, reason: String },
    #[error("no backend can reach {0}")]
    Unsupported(String),
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for RemoteExecError {
    fn from(e: std::io::Error) -> Self {
        RemoteExecError::Io(e.to_string())
    }
}

/// A termination signal could not be delivered. Logged, never escalated.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TeardownError {
    #[error("failed to signal {node}: {reason}")]
    Signal { node: NodeId, reason: String },
    #[error("{node} did not stop within the teardown timeout and was force-killed")]
    Forced { node: NodeId },
}

/// Startup-phase failure of a session, surfaced synchronously by `launch()`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LaunchError {
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error("scheduler on {host} failed to start: {source}")]
    SchedulerSpawn {
        host: String,
        #[source]
        source: RemoteExecError,
    },
    #[error("scheduler at {address} not ready after {waited_ms} ms")]
    ReadinessTimeout { address: String, waited_ms: u64 },
    #[error("{node} on {host} failed to start: {source}")]
    WorkerSpawn {
        node: NodeId,
        host: String,
        #[source]
        source: RemoteExecError,
    },
    #[error("{node} exited during startup ({reason})")]
    EarlyExit { node: NodeId, reason: String },
    #[error("session stopped before it was fully running")]
    Stopped,
    #[error("session has already been launched")]
    AlreadyLaunched,
}

impl LaunchError {
    /// The node responsible for the failure, if there is one.
    pub fn node(&self) -> Option<NodeId> {
        match self {
            LaunchError::SchedulerSpawn { .. } | LaunchError::ReadinessTimeout { .. } => {
                Some(NodeId::Scheduler)
            }
            LaunchError::WorkerSpawn { node, .. } | LaunchError::EarlyExit { node, .. } => {
                Some(*node)
            }
            _ => None,
        }
    }
}
