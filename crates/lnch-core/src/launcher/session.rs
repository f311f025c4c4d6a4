use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use tokio::{
    sync::{Mutex as AsyncMutex, mpsc},
    task::{AbortHandle, JoinSet},
    time::Instant,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use lnch_model::{
    EventKind, LaunchSpec, NodeId, ProcessState, SessionEvent, SessionState, Subscribe,
};

use super::bus::EventBus;
use crate::{
    backend::{LogSink, ProcessBackend, ProcessExit, ProcessHandle, StopSignal},
    config::LauncherConfig,
    error::{LaunchError, RemoteExecError, TeardownError},
    plan::LaunchPlan,
    readiness,
    report::{FailureCause, FailureReport, SessionOutcome, SessionSnapshot, TeardownSummary},
    state::{Admission, ProcessRegistry},
};

use SessionState::{Completed, Running, SchedulerReady, SchedulerStarting, WorkersStarting};

/// Exit observed by a watcher task.
#[derive(Debug, Clone)]
struct ExitNotice {
    node: NodeId,
    exit: ProcessExit,
    state: ProcessState,
}

/// One launch of one plan.
///
/// Cheap to clone; clones share the session, so one clone can `launch()`
/// while another calls `stop()`.
#[derive(Clone)]
pub struct ClusterSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    id: String,
    plan: LaunchPlan,
    backend: Arc<dyn ProcessBackend>,
    config: LauncherConfig,
    bus: EventBus,
    registry: ProcessRegistry,
    stop: CancellationToken,
    launched: AtomicBool,
    teardown: AsyncMutex<Option<TeardownSummary>>,
    watchers: Mutex<Vec<AbortHandle>>,
}

impl ClusterSession {
    pub(crate) fn new(
        plan: LaunchPlan,
        backend: Arc<dyn ProcessBackend>,
        config: LauncherConfig,
        subscribers: Vec<Arc<dyn Subscribe>>,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                id: uuid::Uuid::new_v4().to_string(),
                plan,
                backend,
                config,
                bus: EventBus::new(subscribers),
                registry: ProcessRegistry::new(),
                stop: CancellationToken::new(),
                launched: AtomicBool::new(false),
                teardown: AsyncMutex::new(None),
                watchers: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn plan(&self) -> &LaunchPlan {
        &self.inner.plan
    }

    pub fn state(&self) -> SessionState {
        self.inner.registry.state()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.registry.snapshot()
    }

    /// First failure of the session, if any.
    pub fn failure(&self) -> Option<FailureReport> {
        self.inner.registry.failure()
    }

    /// Where the node's stdout/stderr goes on its host.
    pub fn log_path(&self, spec: &LaunchSpec) -> PathBuf {
        self.inner.config.log_dir.join(&self.inner.id).join(format!(
            "{}-{}-{}.log",
            spec.node.role(),
            spec.node.rank().unwrap_or(0),
            spec.host.address
        ))
    }

    /// Run the session to its end.
    ///
    /// Startup failures (scheduler spawn, readiness, worker spawn) tear the
    /// session down and return `Err` naming the node at fault. Once the
    /// session is running, every outcome is `Ok`; a crash or a stop shows up as
    /// a `Failed` verdict with a [`FailureReport`]. Teardown has completed
    /// before this returns.
    #[instrument(level = "info", skip(self), fields(session = %self.inner.id))]
    pub async fn launch(&self) -> Result<SessionOutcome, LaunchError> {
        if self.inner.launched.swap(true, Ordering::SeqCst) {
            return Err(LaunchError::AlreadyLaunched);
        }
        let (tx, mut rx) = mpsc::unbounded_channel();

        let started = self.start(&tx, &mut rx).await;
        drop(tx);

        if let Err(err) = started {
            warn!(target: "lnch.core.launcher", error = %err, "startup failed; tearing down");
            self.teardown().await;
            self.attach_log_tail().await;
            return Err(err);
        }

        info!(
            target: "lnch.core.launcher",
            workers = self.inner.plan.workers.len(),
            "cluster running"
        );
        self.supervise(&mut rx).await;
        let summary = self.teardown().await;
        self.attach_log_tail().await;
        Ok(self.outcome(summary))
    }

    /// Request a stop and tear the session down.
    pub async fn stop(&self) -> TeardownSummary {
        info!(target: "lnch.core.launcher", session = %self.inner.id, "stop requested");
        self.inner.stop.cancel();
        self.teardown().await
    }

    /// Terminate every live process: SIGTERM, wait up to the teardown timeout,
    /// then SIGKILL stragglers.
    ///
    /// Idempotent. Later calls return the summary of the first one.
    #[instrument(level = "debug", skip(self), fields(session = %self.inner.id))]
    pub async fn teardown(&self) -> TeardownSummary {
        let mut gate = self.inner.teardown.lock().await;
        if let Some(done) = gate.as_ref() {
            return done.clone();
        }

        let reg = &self.inner.registry;
        if !reg.state().is_decided() {
            self.decide_failed(FailureReport::new(FailureCause::Stopped));
        }

        let handles = reg.begin_teardown();
        let mut summary = TeardownSummary {
            signalled: handles.len(),
            errors: Vec::new(),
        };
        debug!(target: "lnch.core.launcher", live = handles.len(), "sending SIGTERM");

        let mut set = JoinSet::new();
        for handle in handles {
            let backend = Arc::clone(&self.inner.backend);
            set.spawn(async move {
                let res = backend.signal(&handle, StopSignal::Term).await;
                (handle, res)
            });
        }
        while let Some(joined) = set.join_next().await {
            if let Ok((handle, Err(e))) = joined {
                self.signal_failed(&handle, &e, &mut summary);
            }
        }

        if !reg.wait_settled(self.inner.config.teardown_timeout()).await {
            for rec in reg.live() {
                let Some(handle) = rec.handle else {
                    reg.settle(
                        rec.node,
                        ProcessState::Failed("spawn still in flight at teardown".into()),
                    );
                    continue;
                };
                warn!(
                    target: "lnch.core.launcher",
                    node = %rec.node,
                    host = %rec.host,
                    "teardown timeout exceeded; sending SIGKILL"
                );
                self.publish(
                    SessionEvent::new(EventKind::GraceExceeded)
                        .with_node(rec.node)
                        .with_host(rec.host.address.clone()),
                );
                if let Err(e) = self.inner.backend.signal(&handle, StopSignal::Kill).await {
                    self.signal_failed(&handle, &e, &mut summary);
                }
                summary.errors.push(TeardownError::Forced { node: rec.node });
                if reg.settle(rec.node, ProcessState::Terminated) {
                    self.publish_process(&handle, EventKind::ProcessTerminated);
                }
            }
        }

        if reg.transition(SessionState::TornDown).is_some() {
            self.publish(SessionEvent::state_changed(SessionState::TornDown));
        }
        for watcher in self
            .inner
            .watchers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
        {
            watcher.abort();
        }

        info!(
            target: "lnch.core.launcher",
            signalled = summary.signalled,
            errors = summary.errors.len(),
            "session torn down"
        );
        *gate = Some(summary.clone());
        summary
    }

    /// Scheduler, readiness, then the worker fan-out.
    async fn start(
        &self,
        tx: &mpsc::UnboundedSender<ExitNotice>,
        rx: &mut mpsc::UnboundedReceiver<ExitNotice>,
    ) -> Result<(), LaunchError> {
        let plan = &self.inner.plan;
        self.advance(SchedulerStarting)?;

        let sched = &plan.scheduler;
        match self.spawn_node(sched, tx).await {
            Ok(Some(_)) => {}
            Ok(None) => return Err(LaunchError::Stopped),
            Err(source) => {
                let report = FailureReport::new(FailureCause::Spawn {
                    error: source.to_string(),
                })
                .at(NodeId::Scheduler, sched.host.address.clone());
                return Err(self.abort(
                    LaunchError::SchedulerSpawn {
                        host: sched.host.address.clone(),
                        source,
                    },
                    report,
                ));
            }
        }

        tokio::select! {
            biased;
            _ = self.inner.stop.cancelled() => return Err(LaunchError::Stopped),
            Some(notice) = rx.recv() => {
                let cause = match notice.exit {
                    ProcessExit::Code(code) => FailureCause::SchedulerExited { code },
                    other => cause_for_exit(other),
                };
                let report = FailureReport::new(cause).at(notice.node, sched.host.address.clone());
                return Err(self.abort(
                    LaunchError::EarlyExit { node: notice.node, reason: notice.exit.to_string() },
                    report,
                ));
            }
            ready = readiness::wait_ready(&plan.endpoint, &self.inner.config) => {
                if let Err(err) = ready {
                    let report = FailureReport::new(FailureCause::ReadinessTimeout {
                        waited_ms: self.inner.config.readiness_timeout_ms,
                    })
                    .at(NodeId::Scheduler, sched.host.address.clone());
                    return Err(self.abort(err, report));
                }
            }
        }

        self.advance(SchedulerReady)?;
        self.publish(
            SessionEvent::new(EventKind::SchedulerReady)
                .with_node(NodeId::Scheduler)
                .with_host(plan.endpoint.to_string()),
        );
        self.advance(WorkersStarting)?;

        let mut set = JoinSet::new();
        let mut pending = HashMap::new();
        for spec in plan.workers.iter().cloned() {
            let this = self.clone();
            let tx = tx.clone();
            let (node, host) = (spec.node, spec.host.address.clone());
            let task = set.spawn(async move {
                let res = this.spawn_node(&spec, &tx).await;
                (spec, res)
            });
            pending.insert(task.id(), (node, host));
        }

        let failure = loop {
            tokio::select! {
                biased;
                _ = self.inner.stop.cancelled() => break Some(LaunchError::Stopped),
                joined = set.join_next() => match joined {
                    None => break None,
                    Some(Ok((_, Ok(_)))) => {}
                    Some(Ok((spec, Err(source)))) => {
                        let report = FailureReport::new(FailureCause::Spawn {
                            error: source.to_string(),
                        })
                        .at(spec.node, spec.host.address.clone());
                        break Some(self.abort(
                            LaunchError::WorkerSpawn {
                                node: spec.node,
                                host: spec.host.address.clone(),
                                source,
                            },
                            report,
                        ));
                    }
                    Some(Err(e)) => {
                        let Some((node, host)) = pending.remove(&e.id()) else {
                            continue;
                        };
                        let source = RemoteExecError::Spawn {
                            host: host.clone(),
                            reason: e.to_string(),
                        };
                        let report = FailureReport::new(FailureCause::Spawn {
                            error: source.to_string(),
                        })
                        .at(node, host.clone());
                        break Some(self.abort(LaunchError::WorkerSpawn { node, host, source }, report));
                    }
                },
            }
        };

        if let Some(err) = failure {
            // Spawns still in flight finish on their own and are terminated on admission.
            set.detach_all();
            return Err(err);
        }
        self.advance(Running)
    }

    /// Wait for the verdict: every process exited 0, something failed, or a stop.
    async fn supervise(&self, rx: &mut mpsc::UnboundedReceiver<ExitNotice>) {
        let reg = &self.inner.registry;
        let expected = self.inner.plan.node_count();
        let mut linger_deadline: Option<Instant> = None;

        loop {
            if reg.state().is_decided() {
                return;
            }
            if reg.all_succeeded(expected) {
                if self.advance(Completed).is_ok() {
                    info!(target: "lnch.core.launcher", "every process exited 0");
                }
                return;
            }

            let deadline = linger_deadline;
            let linger = async move {
                match deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                _ = self.inner.stop.cancelled() => {
                    self.decide_failed(FailureReport::new(FailureCause::Stopped));
                    return;
                }
                _ = linger => {
                    let report = FailureReport::new(FailureCause::Lingered {
                        waited_ms: self.inner.config.exit_grace_ms,
                    })
                    .at(NodeId::Scheduler, self.inner.plan.scheduler.host.address.clone());
                    self.decide_failed(report);
                    return;
                }
                notice = rx.recv() => {
                    let Some(notice) = notice else { return };
                    self.on_exit(notice, &mut linger_deadline);
                }
            }
        }
    }

    /// React to one process exit while the cluster runs.
    ///
    /// Any non-zero exit, signal or vanished process fails the session at once.
    /// A scheduler exiting 0 while workers are still live does not: workers
    /// get `exit_grace_ms` to finish on their own, and the session fails with
    /// `Lingered` only if one is still live when the grace runs out. Worker
    /// exits with 0 are expected and ignored.
    fn on_exit(&self, notice: ExitNotice, linger_deadline: &mut Option<Instant>) {
        let host = self
            .inner
            .registry
            .record(notice.node)
            .map(|r| r.host.address)
            .unwrap_or_default();

        match (&notice.state, notice.node) {
            (ProcessState::Exited(0), NodeId::Scheduler) => {
                let workers_live = self
                    .inner
                    .registry
                    .live()
                    .iter()
                    .any(|r| r.node != NodeId::Scheduler);
                if workers_live && linger_deadline.is_none() {
                    debug!(
                        target: "lnch.core.launcher",
                        grace_ms = self.inner.config.exit_grace_ms,
                        "scheduler finished; waiting for workers"
                    );
                    *linger_deadline = Some(Instant::now() + self.inner.config.exit_grace());
                }
            }
            (ProcessState::Exited(0), _) => {}
            (ProcessState::Terminated, _) => {}
            _ => {
                let report = FailureReport::new(cause_for_exit(notice.exit)).at(notice.node, host);
                self.decide_failed(report);
            }
        }
    }

    /// Spawn one node and register it.
    ///
    /// `Ok(None)` means teardown started meanwhile; the process, if it came up,
    /// has already been terminated.
    async fn spawn_node(
        &self,
        spec: &LaunchSpec,
        exits: &mpsc::UnboundedSender<ExitNotice>,
    ) -> Result<Option<ProcessHandle>, RemoteExecError> {
        let reg = &self.inner.registry;
        if reg.is_tearing_down() {
            return Ok(None);
        }
        reg.insert_spawning(spec.node, spec.host.clone());
        self.publish(
            SessionEvent::new(EventKind::SpawnRequested)
                .with_node(spec.node)
                .with_host(spec.host.address.clone()),
        );

        let sink = LogSink {
            path: self.log_path(spec),
        };
        let handle = match self.inner.backend.spawn(spec, &sink).await {
            Ok(handle) => handle,
            Err(e) => {
                reg.settle(spec.node, ProcessState::Failed(e.to_string()));
                self.publish(
                    SessionEvent::new(EventKind::ProcessFailed)
                        .with_node(spec.node)
                        .with_host(spec.host.address.clone())
                        .with_reason(e.to_string()),
                );
                return Err(e);
            }
        };

        match reg.accept(handle.clone()) {
            Admission::Accepted => {
                self.publish_process(&handle, EventKind::ProcessRunning);
                self.watch(handle.clone(), exits.clone());
                Ok(Some(handle))
            }
            Admission::Rejected => {
                self.terminate_late(&handle).await;
                Ok(None)
            }
        }
    }

    /// Stop a process whose spawn completed after teardown began.
    async fn terminate_late(&self, handle: &ProcessHandle) {
        let backend = &self.inner.backend;
        if let Err(e) = backend.signal(handle, StopSignal::Term).await {
            warn!(target: "lnch.core.launcher", node = %handle.node, error = %e, "late SIGTERM failed");
        }
        let waited =
            tokio::time::timeout(self.inner.config.teardown_timeout(), backend.wait(handle)).await;
        if !matches!(waited, Ok(Ok(_)))
            && let Err(e) = backend.signal(handle, StopSignal::Kill).await
        {
            warn!(target: "lnch.core.launcher", node = %handle.node, error = %e, "late SIGKILL failed");
        }
        self.inner.registry.settle_late(handle.clone());
        self.publish_process(handle, EventKind::LateSpawnTerminated);
    }

    /// Start the exit watcher of a running process.
    fn watch(&self, handle: ProcessHandle, tx: mpsc::UnboundedSender<ExitNotice>) {
        let this = self.clone();
        let task = tokio::spawn(async move {
            let exit = match this.inner.backend.wait(&handle).await {
                Ok(exit) => exit,
                Err(e) => {
                    warn!(
                        target: "lnch.core.launcher",
                        node = %handle.node,
                        error = %e,
                        "lost track of process"
                    );
                    ProcessExit::Vanished
                }
            };
            let state = this.inner.registry.record_exit(handle.node, exit);
            let kind = match &state {
                ProcessState::Exited(_) => EventKind::ProcessExited,
                ProcessState::Terminated => EventKind::ProcessTerminated,
                _ => EventKind::ProcessFailed,
            };
            let mut ev = SessionEvent::new(kind)
                .with_node(handle.node)
                .with_host(handle.host.address.clone())
                .with_pid(handle.pid);
            match exit {
                ProcessExit::Code(code) => ev = ev.with_code(code),
                other => ev = ev.with_reason(other.to_string()),
            }
            this.publish(ev);

            let _ = tx.send(ExitNotice {
                node: handle.node,
                exit,
                state,
            });
        });
        self.inner
            .watchers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(task.abort_handle());
    }

    fn advance(&self, next: SessionState) -> Result<(), LaunchError> {
        match self.inner.registry.transition(next) {
            Some(prev) => {
                debug!(target: "lnch.core.launcher", from = %prev, to = %next, "state changed");
                self.publish(SessionEvent::state_changed(next));
                Ok(())
            }
            None => Err(LaunchError::Stopped),
        }
    }

    fn abort(&self, err: LaunchError, report: FailureReport) -> LaunchError {
        self.decide_failed(report);
        err
    }

    fn decide_failed(&self, report: FailureReport) {
        let desc = report.to_string();
        if self.inner.registry.fail(report) {
            warn!(target: "lnch.core.launcher", failure = %desc, "session failed");
            self.publish(SessionEvent::state_changed(SessionState::Failed).with_reason(desc));
        } else {
            debug!(target: "lnch.core.launcher", failure = %desc, "outcome already decided");
        }
    }

    fn signal_failed(
        &self,
        handle: &ProcessHandle,
        err: &RemoteExecError,
        summary: &mut TeardownSummary,
    ) {
        warn!(
            target: "lnch.core.launcher",
            node = %handle.node,
            host = %handle.host,
            error = %err,
            "termination signal not delivered"
        );
        self.publish(
            SessionEvent::new(EventKind::SignalFailed)
                .with_node(handle.node)
                .with_host(handle.host.address.clone())
                .with_reason(err.to_string()),
        );
        summary.errors.push(TeardownError::Signal {
            node: handle.node,
            reason: err.to_string(),
        });
    }

    /// Fetch the log tail of the failing node, when it ever ran.
    async fn attach_log_tail(&self) {
        let reg = &self.inner.registry;
        let Some(node) = reg.failure().and_then(|f| f.node) else {
            return;
        };
        let Some(handle) = reg.record(node).and_then(|r| r.handle) else {
            return;
        };
        match self
            .inner
            .backend
            .tail_log(&handle, self.inner.config.log_tail_lines)
            .await
        {
            Ok(tail) => reg.set_failure_tail(tail),
            Err(e) => {
                debug!(target: "lnch.core.launcher", node = %node, error = %e, "log tail unavailable")
            }
        }
    }

    fn outcome(&self, teardown: TeardownSummary) -> SessionOutcome {
        let failure = self.inner.registry.failure();
        SessionOutcome {
            session_id: self.inner.id.clone(),
            verdict: if failure.is_some() {
                SessionState::Failed
            } else {
                SessionState::Completed
            },
            failure,
            processes: self.inner.registry.snapshot().processes,
            teardown,
        }
    }

    fn publish_process(&self, handle: &ProcessHandle, kind: EventKind) {
        self.publish(
            SessionEvent::new(kind)
                .with_node(handle.node)
                .with_host(handle.host.address.clone())
                .with_pid(handle.pid),
        );
    }

    fn publish(&self, event: SessionEvent) {
        self.inner.bus.publish(event);
    }
}

fn cause_for_exit(exit: ProcessExit) -> FailureCause {
    match exit {
        ProcessExit::Code(code) => FailureCause::Crash { code },
        ProcessExit::Signaled(signal) => FailureCause::Signaled { signal },
        ProcessExit::Vanished => FailureCause::Vanished,
    }
}
