use std::fmt;

use serde::Serialize;

use lnch_model::{NodeId, ProcessState, SessionState};

use crate::error::TeardownError;

/// Why a session failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum FailureCause {
    /// The node could not be started.
    Spawn { error: String },
    /// Non-zero exit.
    Crash { code: i32 },
    Signaled { signal: i32 },
    /// The process disappeared without an exit status.
    Vanished,
    /// The scheduler exited while workers still depended on it.
    SchedulerExited { code: i32 },
    ReadinessTimeout { waited_ms: u64 },
    /// Workers kept running after the scheduler finished cleanly.
    Lingered { waited_ms: u64 },
    /// Explicit stop request.
    Stopped,
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::Spawn { error } => write!(f, "spawn failed: {error}"),
            FailureCause::Crash { code } => write!(f, "exited with code {code}"),
            FailureCause::Signaled { signal } => write!(f, "killed by signal {signal}"),
            FailureCause::Vanished => f.write_str("vanished without exit status"),
            FailureCause::SchedulerExited { code } => {
                write!(f, "scheduler exited with code {code} while workers were running")
            }
            FailureCause::ReadinessTimeout { waited_ms } => {
                write!(f, "scheduler not ready after {waited_ms} ms")
            }
            FailureCause::Lingered { waited_ms } => write!(
                f,
                "workers still running {waited_ms} ms after the scheduler finished"
            ),
            FailureCause::Stopped => f.write_str("stopped on request"),
        }
    }
}

/// Caller-visible account of the first failure in a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<NodeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    pub cause: FailureCause,
    /// Last lines of the failing node's log, when they could be fetched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_tail: Option<String>,
}

impl FailureReport {
    pub fn new(cause: FailureCause) -> Self {
        Self {
            node: None,
            host: None,
            cause,
            log_tail: None,
        }
    }

    pub fn at(mut self, node: NodeId, host: impl Into<String>) -> Self {
        self.node = Some(node);
        self.host = Some(host.into());
        self
    }
}

impl fmt::Display for FailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.node, &self.host) {
            (Some(node), Some(host)) => write!(f, "{node} on {host}: {}", self.cause)?,
            (Some(node), None) => write!(f, "{node}: {}", self.cause)?,
            _ => write!(f, "{}", self.cause)?,
        }
        if let Some(tail) = self.log_tail.as_deref().filter(|t| !t.trim().is_empty()) {
            writeln!(f)?;
            writeln!(f, "--- log tail ---")?;
            f.write_str(tail.trim_end())?;
        }
        Ok(())
    }
}

/// Point-in-time view of one tracked process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessSnapshot {
    pub node: NodeId,
    pub host: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    pub state: ProcessState,
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub processes: Vec<ProcessSnapshot>,
}

impl SessionSnapshot {
    pub fn process(&self, node: NodeId) -> Option<&ProcessSnapshot> {
        self.processes.iter().find(|p| p.node == node)
    }
}

/// Result of one teardown pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownSummary {
    /// Processes that received SIGTERM.
    pub signalled: usize,
    /// Problems met along the way. Never fatal.
    pub errors: Vec<TeardownError>,
}

/// Final account of a session, returned once teardown completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub session_id: String,
    /// `Completed` or `Failed`.
    pub verdict: SessionState,
    pub failure: Option<FailureReport>,
    pub processes: Vec<ProcessSnapshot>,
    pub teardown: TeardownSummary,
}

impl SessionOutcome {
    pub fn is_success(&self) -> bool {
        self.verdict == SessionState::Completed
    }

    /// Process exit code for the launcher binary.
    pub fn exit_code(&self) -> i32 {
        if self.is_success() { 0 } else { 1 }
    }
}
