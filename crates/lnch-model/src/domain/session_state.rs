use std::fmt;

use serde::{Deserialize, Serialize};

/// Overall state of one launch session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    Idle,
    SchedulerStarting,
    SchedulerReady,
    WorkersStarting,
    Running,
    Completed,
    Failed,
    TornDown,
}

impl SessionState {
    /// Whether `self → next` is a legal transition.
    ///
    /// Every non-final state may fall into `Failed` (spawn errors, crashes, explicit stop).
    pub fn can_transition_to(&self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Idle, SchedulerStarting) => true,
            (SchedulerStarting, SchedulerReady) => true,
            (SchedulerReady, WorkersStarting) => true,
            (WorkersStarting, Running) => true,
            (Running, Completed) => true,
            (Completed | Failed, TornDown) => true,
            (Idle | SchedulerStarting | SchedulerReady | WorkersStarting | Running, Failed) => {
                true
            }
            _ => false,
        }
    }

    /// `Completed` or `Failed`: the outcome is decided, teardown pending.
    pub fn is_decided(&self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Failed)
    }

    pub fn is_torn_down(&self) -> bool {
        matches!(self, SessionState::TornDown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::SchedulerStarting => "scheduler-starting",
            SessionState::SchedulerReady => "scheduler-ready",
            SessionState::WorkersStarting => "workers-starting",
            SessionState::Running => "running",
            SessionState::Completed => "completed",
            SessionState::Failed => "failed",
            SessionState::TornDown => "torn-down",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::SessionState::*;

    #[test]
    fn happy_path_is_legal() {
        let path = [
            Idle,
            SchedulerStarting,
            SchedulerReady,
            WorkersStarting,
            Running,
            Completed,
            TornDown,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn workers_never_start_before_scheduler_ready() {
        assert!(!Idle.can_transition_to(WorkersStarting));
        assert!(!SchedulerStarting.can_transition_to(WorkersStarting));
    }

    #[test]
    fn terminal_states_only_tear_down() {
        assert!(Failed.can_transition_to(TornDown));
        assert!(!Failed.can_transition_to(Running));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!TornDown.can_transition_to(TornDown));
        assert!(!Running.can_transition_to(TornDown));
    }
}
