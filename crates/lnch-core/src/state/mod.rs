use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tokio::{sync::Notify, time::Instant};
use tracing::warn;

use lnch_model::{HostEntry, NodeId, ProcessState, SessionState};

use crate::{
    backend::{ProcessExit, ProcessHandle},
    report::{FailureReport, ProcessSnapshot, SessionSnapshot},
};

/// One tracked process.
#[derive(Debug, Clone)]
pub struct ProcessRecord {
    pub node: NodeId,
    pub host: HostEntry,
    pub state: ProcessState,
    pub handle: Option<ProcessHandle>,
}

/// Result of handing a freshly spawned process to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    /// Teardown already started; the caller must terminate the process.
    Rejected,
}

/// Node → ProcessRecord registry plus the session state machine.
///
/// Every mutation goes through one lock, so spawn completions, exit watchers
/// and teardown observe a single order of events.
#[derive(Clone, Default)]
pub struct ProcessRegistry {
    inner: Arc<Mutex<RegistryInner>>,
    changed: Arc<Notify>,
}

struct RegistryInner {
    state: SessionState,
    records: BTreeMap<NodeId, ProcessRecord>,
    tearing_down: bool,
    failure: Option<FailureReport>,
}

impl Default for RegistryInner {
    fn default() -> Self {
        Self {
            state: SessionState::Idle,
            records: BTreeMap::new(),
            tearing_down: false,
            failure: None,
        }
    }
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    /// Apply a legal transition. Returns the previous state, or `None` if the
    /// transition is not allowed from the current state.
    pub fn transition(&self, next: SessionState) -> Option<SessionState> {
        let mut inner = self.lock();
        let prev = inner.state;
        if !prev.can_transition_to(next) {
            return None;
        }
        inner.state = next;
        drop(inner);
        self.changed.notify_waiters();
        Some(prev)
    }

    /// Decide the session as failed. Only the first failure is kept; later
    /// calls return `false` and leave the report untouched.
    pub fn fail(&self, report: FailureReport) -> bool {
        let mut inner = self.lock();
        if !inner.state.can_transition_to(SessionState::Failed) {
            return false;
        }
        inner.state = SessionState::Failed;
        inner.failure = Some(report);
        drop(inner);
        self.changed.notify_waiters();
        true
    }

    pub fn failure(&self) -> Option<FailureReport> {
        self.lock().failure.clone()
    }

    /// Attach a log tail to the recorded failure.
    pub fn set_failure_tail(&self, tail: String) {
        if let Some(report) = self.lock().failure.as_mut() {
            report.log_tail = Some(tail);
        }
    }

    /// Track `node` as `Spawning`.
    pub fn insert_spawning(&self, node: NodeId, host: HostEntry) {
        self.lock().records.insert(
            node,
            ProcessRecord {
                node,
                host,
                state: ProcessState::Spawning,
                handle: None,
            },
        );
    }

    /// Record a confirmed spawn. Rejected once teardown has started.
    pub fn accept(&self, handle: ProcessHandle) -> Admission {
        let mut inner = self.lock();
        if inner.tearing_down {
            return Admission::Rejected;
        }
        if let Some(rec) = inner.records.get_mut(&handle.node) {
            rec.state = ProcessState::Running;
            rec.handle = Some(handle);
        }
        drop(inner);
        self.changed.notify_waiters();
        Admission::Accepted
    }

    /// Move `node` into a terminal state. The first terminal state sticks.
    pub fn settle(&self, node: NodeId, state: ProcessState) -> bool {
        let mut inner = self.lock();
        let Some(rec) = inner.records.get_mut(&node) else {
            return false;
        };
        if rec.state.is_terminal() {
            return false;
        }
        rec.state = state;
        drop(inner);
        self.changed.notify_waiters();
        true
    }

    /// Record a process that came up after teardown began and was then killed.
    ///
    /// Overrides a `Failed` verdict left by a teardown that gave up waiting on
    /// the spawn, so the snapshot shows the process the launcher stopped.
    pub fn settle_late(&self, handle: ProcessHandle) -> bool {
        let mut inner = self.lock();
        let Some(rec) = inner.records.get_mut(&handle.node) else {
            return false;
        };
        if !matches!(rec.state, ProcessState::Spawning | ProcessState::Failed(_)) {
            return false;
        }
        rec.state = ProcessState::Terminated;
        rec.handle = Some(handle);
        drop(inner);
        self.changed.notify_waiters();
        true
    }

    /// Record how a process ended. During teardown any exit counts as `Terminated`.
    pub fn record_exit(&self, node: NodeId, exit: ProcessExit) -> ProcessState {
        let state = {
            let inner = self.lock();
            if inner.tearing_down {
                ProcessState::Terminated
            } else {
                match exit {
                    ProcessExit::Code(code) => ProcessState::Exited(code),
                    ProcessExit::Signaled(sig) => ProcessState::Failed(format!("signal {sig}")),
                    ProcessExit::Vanished => ProcessState::Failed("vanished".into()),
                }
            }
        };
        if !self.settle(node, state.clone()) {
            warn!(target: "lnch.core.registry", node = %node, "exit reported for a settled process");
        }
        state
    }

    /// Refuse further admissions and return the handles of every running process.
    pub fn begin_teardown(&self) -> Vec<ProcessHandle> {
        let mut inner = self.lock();
        inner.tearing_down = true;
        inner
            .records
            .values()
            .filter(|r| r.state == ProcessState::Running)
            .filter_map(|r| r.handle.clone())
            .collect()
    }

    pub fn is_tearing_down(&self) -> bool {
        self.lock().tearing_down
    }

    /// Nodes that may still be alive.
    pub fn live(&self) -> Vec<ProcessRecord> {
        self.lock()
            .records
            .values()
            .filter(|r| r.state.is_live())
            .cloned()
            .collect()
    }

    pub fn record(&self, node: NodeId) -> Option<ProcessRecord> {
        self.lock().records.get(&node).cloned()
    }

    /// `true` when `expected` records exist and all of them exited with 0.
    pub fn all_succeeded(&self, expected: usize) -> bool {
        let inner = self.lock();
        inner.records.len() == expected && inner.records.values().all(|r| r.state.is_success())
    }

    /// Wait until no record is live, or `timeout` elapses. Returns whether
    /// everything settled.
    pub async fn wait_settled(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.live().is_empty() {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.live().is_empty();
            }
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.lock();
        SessionSnapshot {
            state: inner.state,
            processes: inner
                .records
                .values()
                .map(|r| ProcessSnapshot {
                    node: r.node,
                    host: r.host.address.clone(),
                    pid: r.handle.as_ref().map(|h| h.pid),
                    state: r.state.clone(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use lnch_model::Role;

    use super::*;
    use crate::report::FailureCause;

    fn handle(node: NodeId) -> ProcessHandle {
        ProcessHandle {
            node,
            host: HostEntry::new("proj5", None, Role::Worker),
            pid: 42,
            backend: "fake",
            log: PathBuf::from("/tmp/w.log"),
        }
    }

    fn registry_with(node: NodeId) -> ProcessRegistry {
        let reg = ProcessRegistry::new();
        reg.insert_spawning(node, HostEntry::new("proj5", None, Role::Worker));
        reg
    }

    #[test]
    fn illegal_transition_is_refused() {
        let reg = ProcessRegistry::new();
        assert_eq!(reg.transition(SessionState::WorkersStarting), None);
        assert_eq!(
            reg.transition(SessionState::SchedulerStarting),
            Some(SessionState::Idle)
        );
        assert_eq!(reg.state(), SessionState::SchedulerStarting);
    }

    #[test]
    fn first_failure_wins() {
        let reg = ProcessRegistry::new();
        assert!(reg.fail(FailureReport::new(FailureCause::Crash { code: 3 })));
        assert!(!reg.fail(FailureReport::new(FailureCause::Stopped)));
        assert_eq!(
            reg.failure().map(|f| f.cause),
            Some(FailureCause::Crash { code: 3 })
        );
    }

    #[test]
    fn accept_is_rejected_after_teardown_started() {
        let node = NodeId::Worker(0);
        let reg = registry_with(node);
        assert!(reg.begin_teardown().is_empty());
        assert_eq!(reg.accept(handle(node)), Admission::Rejected);
        assert_eq!(reg.record(node).unwrap().state, ProcessState::Spawning);
    }

    #[test]
    fn first_terminal_state_sticks() {
        let node = NodeId::Worker(0);
        let reg = registry_with(node);
        reg.accept(handle(node));

        assert_eq!(reg.record_exit(node, ProcessExit::Code(0)), ProcessState::Exited(0));
        assert!(!reg.settle(node, ProcessState::Terminated));
        assert_eq!(reg.record(node).unwrap().state, ProcessState::Exited(0));
        assert!(reg.all_succeeded(1));
        assert!(!reg.all_succeeded(2));
    }

    #[test]
    fn exit_during_teardown_is_terminated() {
        let node = NodeId::Worker(0);
        let reg = registry_with(node);
        reg.accept(handle(node));

        assert_eq!(reg.begin_teardown().len(), 1);
        assert_eq!(reg.record_exit(node, ProcessExit::Code(143)), ProcessState::Terminated);
    }

    #[test]
    fn late_spawn_overrides_in_flight_failure() {
        let node = NodeId::Worker(0);
        let reg = registry_with(node);
        reg.begin_teardown();
        assert!(reg.settle(node, ProcessState::Failed("spawn still in flight".into())));

        assert!(reg.settle_late(handle(node)));
        let rec = reg.record(node).unwrap();
        assert_eq!(rec.state, ProcessState::Terminated);
        assert_eq!(rec.handle.map(|h| h.pid), Some(42));
    }

    #[test]
    fn late_spawn_keeps_a_real_exit() {
        let node = NodeId::Worker(0);
        let reg = registry_with(node);
        reg.accept(handle(node));
        reg.record_exit(node, ProcessExit::Code(0));

        assert!(!reg.settle_late(handle(node)));
        assert_eq!(reg.record(node).unwrap().state, ProcessState::Exited(0));
    }

    #[tokio::test]
    async fn wait_settled_wakes_on_exit() {
        let node = NodeId::Worker(0);
        let reg = registry_with(node);
        reg.accept(handle(node));

        let r = reg.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            r.settle(node, ProcessState::Terminated);
        });

        assert!(reg.wait_settled(Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn wait_settled_times_out() {
        let node = NodeId::Worker(0);
        let reg = registry_with(node);
        reg.accept(handle(node));
        assert!(!reg.wait_settled(Duration::from_millis(20)).await);
    }
}
