use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of one launched process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProcessState {
    /// Spawn issued, not yet confirmed by the host.
    Spawning,
    /// The host confirmed that the process exists.
    Running,
    /// The process exited on its own with the given code.
    Exited(i32),
    /// The process could not be started or vanished without an exit code.
    Failed(String),
    /// The process was stopped by teardown.
    Terminated,
}

impl ProcessState {
    /// Returns `true` if the state won't transition further.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProcessState::Exited(_) | ProcessState::Failed(_) | ProcessState::Terminated
        )
    }

    /// Returns `true` while a process may still be alive on its host.
    pub fn is_live(&self) -> bool {
        matches!(self, ProcessState::Spawning | ProcessState::Running)
    }

    /// Returns `true` for a clean `Exited(0)`.
    pub fn is_success(&self) -> bool {
        matches!(self, ProcessState::Exited(0))
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessState::Spawning => f.write_str("spawning"),
            ProcessState::Running => f.write_str("running"),
            ProcessState::Exited(code) => write!(f, "exited({code})"),
            ProcessState::Failed(reason) => write!(f, "failed({reason})"),
            ProcessState::Terminated => f.write_str("terminated"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(ProcessState::Exited(0).is_terminal());
        assert!(ProcessState::Exited(3).is_terminal());
        assert!(ProcessState::Failed("gone".into()).is_terminal());
        assert!(ProcessState::Terminated.is_terminal());

        assert!(!ProcessState::Spawning.is_terminal());
        assert!(!ProcessState::Running.is_terminal());
    }

    #[test]
    fn live_states() {
        assert!(ProcessState::Spawning.is_live());
        assert!(ProcessState::Running.is_live());
        assert!(!ProcessState::Terminated.is_live());
    }

    #[test]
    fn only_exit_zero_is_success() {
        assert!(ProcessState::Exited(0).is_success());
        assert!(!ProcessState::Exited(1).is_success());
        assert!(!ProcessState::Terminated.is_success());
    }

    #[test]
    fn serde_roundtrip() {
        let json = serde_json::to_string(&ProcessState::Exited(2)).unwrap();
        assert_eq!(json, r#"{"exited":2}"#);
        let back: ProcessState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ProcessState::Exited(2));
    }
}
