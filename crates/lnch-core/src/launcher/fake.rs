//! Scriptable in-memory backend for session tests.
use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use tokio::sync::{Barrier, watch};

use lnch_model::{EventKind, HostEntry, LaunchSpec, NodeId, SessionEvent, SessionState, Subscribe};

use crate::{
    backend::{LogSink, ProcessBackend, ProcessExit, ProcessHandle, StopSignal},
    error::RemoteExecError,
};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Call {
    Spawn(NodeId),
    Signal(NodeId, StopSignal),
    Kill(String, String),
}

#[derive(Default)]
pub(crate) struct FakeBackend {
    calls: Mutex<Vec<Call>>,
    procs: Mutex<HashMap<NodeId, watch::Sender<Option<ProcessExit>>>>,
    fail: HashSet<NodeId>,
    delays: HashMap<NodeId, Duration>,
    ignore_term: HashSet<NodeId>,
    worker_barrier: Option<Arc<Barrier>>,
}

impl FakeBackend {
    pub(crate) fn fail_spawn(mut self, node: NodeId) -> Self {
        self.fail.insert(node);
        self
    }

    pub(crate) fn delay_spawn(mut self, node: NodeId, delay: Duration) -> Self {
        self.delays.insert(node, delay);
        self
    }

    pub(crate) fn ignore_term(mut self, node: NodeId) -> Self {
        self.ignore_term.insert(node);
        self
    }

    /// Worker spawns block until `n` of them are in flight at once.
    pub(crate) fn with_worker_barrier(mut self, n: usize) -> Self {
        self.worker_barrier = Some(Arc::new(Barrier::new(n)));
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn running_nodes(&self) -> Vec<NodeId> {
        self.procs.lock().unwrap().keys().copied().collect()
    }

    pub(crate) fn is_terminated(&self, node: NodeId) -> bool {
        self.procs
            .lock()
            .unwrap()
            .get(&node)
            .is_some_and(|tx| tx.borrow().is_some())
    }

    /// Wait until `n` processes have been spawned.
    pub(crate) async fn wait_running(&self, n: usize) {
        loop {
            let spawned = self.procs.lock().unwrap().len();
            if spawned >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }

    pub(crate) fn exit(&self, node: NodeId, code: i32) {
        self.finish(node, ProcessExit::Code(code));
    }

    fn finish(&self, node: NodeId, exit: ProcessExit) {
        if let Some(tx) = self.procs.lock().unwrap().get(&node) {
            tx.send_if_modified(|cur| {
                if cur.is_none() {
                    *cur = Some(exit);
                    true
                } else {
                    false
                }
            });
        }
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ProcessBackend for FakeBackend {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn supports(&self, _: &HostEntry) -> bool {
        true
    }

    async fn spawn(
        &self,
        spec: &LaunchSpec,
        sink: &LogSink,
    ) -> Result<ProcessHandle, RemoteExecError> {
        self.record(Call::Spawn(spec.node));

        if spec.node != NodeId::Scheduler
            && let Some(barrier) = &self.worker_barrier
        {
            barrier.wait().await;
        }
        if let Some(delay) = self.delays.get(&spec.node) {
            tokio::time::sleep(*delay).await;
        }
        if self.fail.contains(&spec.node) {
            return Err(RemoteExecError::Spawn {
                host: spec.host.address.clone(),
                reason: "binary not found".into(),
            });
        }

        let (tx, _) = watch::channel(None);
        self.procs.lock().unwrap().insert(spec.node, tx);
        Ok(ProcessHandle {
            node: spec.node,
            host: spec.host.clone(),
            pid: 1000 + spec.node.rank().map_or(0, |r| r as u32 + 1),
            backend: "fake",
            log: sink.path.clone(),
        })
    }

    async fn wait(&self, handle: &ProcessHandle) -> Result<ProcessExit, RemoteExecError> {
        let mut rx = self
            .procs
            .lock()
            .unwrap()
            .get(&handle.node)
            .map(|tx| tx.subscribe())
            .ok_or_else(|| RemoteExecError::Io("unknown process".into()))?;
        let exit = *rx
            .wait_for(|e| e.is_some())
            .await
            .map_err(|e| RemoteExecError::Io(e.to_string()))?;
        exit.ok_or_else(|| RemoteExecError::Io("no exit".into()))
    }

    async fn signal(
        &self,
        handle: &ProcessHandle,
        signal: StopSignal,
    ) -> Result<(), RemoteExecError> {
        self.record(Call::Signal(handle.node, signal));
        match signal {
            StopSignal::Term if self.ignore_term.contains(&handle.node) => {}
            StopSignal::Term => self.finish(handle.node, ProcessExit::Signaled(15)),
            StopSignal::Kill => self.finish(handle.node, ProcessExit::Signaled(9)),
        }
        Ok(())
    }

    async fn tail_log(
        &self,
        handle: &ProcessHandle,
        _lines: usize,
    ) -> Result<String, RemoteExecError> {
        Ok(format!("log of {}", handle.node))
    }

    async fn kill_matching(&self, host: &HostEntry, pattern: &str) -> Result<(), RemoteExecError> {
        self.record(Call::Kill(host.address.clone(), pattern.to_string()));
        Ok(())
    }
}

/// Subscriber that keeps every event it sees.
#[derive(Default)]
pub(crate) struct Recorder {
    events: Mutex<Vec<SessionEvent>>,
}

impl Recorder {
    pub(crate) fn kinds(&self) -> Vec<(EventKind, Option<NodeId>)> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| (e.kind, e.node))
            .collect()
    }

    pub(crate) fn states(&self) -> Vec<SessionState> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| e.state)
            .collect()
    }
}

impl Subscribe for Recorder {
    fn on_event(&self, event: &SessionEvent) {
        self.events.lock().unwrap().push(event.clone());
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}
