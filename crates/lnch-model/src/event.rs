use serde::{Deserialize, Serialize};

use crate::{NodeId, Pid, SessionState};

/// Kind of a session lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    // session
    StateChanged,
    SchedulerReady,

    // process lifecycle
    SpawnRequested,
    ProcessRunning,
    ProcessExited,
    ProcessFailed,
    ProcessTerminated,

    // teardown
    SignalFailed,
    GraceExceeded,
    LateSpawnTerminated,
}

/// One observation emitted by a launch session.
///
/// Fields are optional; which ones are set depends on [`EventKind`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub kind: EventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<NodeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<Pid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<SessionState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl SessionEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            node: None,
            host: None,
            pid: None,
            code: None,
            state: None,
            reason: None,
        }
    }

    pub fn state_changed(state: SessionState) -> Self {
        Self::new(EventKind::StateChanged).with_state(state)
    }

    pub fn with_node(mut self, node: NodeId) -> Self {
        self.node = Some(node);
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_pid(mut self, pid: Pid) -> Self {
        self.pid = Some(pid);
        self
    }

    pub fn with_code(mut self, code: i32) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_state(mut self, state: SessionState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Receiver of session events.
///
/// Called synchronously from the launcher; implementations must not block.
pub trait Subscribe: Send + Sync {
    fn on_event(&self, event: &SessionEvent);

    fn name(&self) -> &'static str {
        "subscriber"
    }
}
