use std::sync::Arc;

use async_trait::async_trait;
use tracing::{instrument, trace};

use lnch_model::{HostEntry, LaunchSpec};

use crate::{
    backend::{LogSink, ProcessBackend, ProcessExit, ProcessHandle, StopSignal},
    error::RemoteExecError,
};

/// Dispatches each host to the first registered backend that supports it.
#[derive(Default)]
pub struct BackendRouter {
    backends: Vec<Arc<dyn ProcessBackend>>,
}

impl BackendRouter {
    #[inline]
    pub fn new() -> Self {
        Self {
            backends: Vec::new(),
        }
    }

    #[inline]
    pub fn register(&mut self, backend: Arc<dyn ProcessBackend>) {
        self.backends.push(backend);
    }

    pub fn pick(&self, host: &HostEntry) -> Option<&Arc<dyn ProcessBackend>> {
        self.backends.iter().find(|b| b.supports(host))
    }

    fn pick_or_err(&self, host: &HostEntry) -> Result<&Arc<dyn ProcessBackend>, RemoteExecError> {
        self.pick(host)
            .ok_or_else(|| RemoteExecError::Unsupported(host.to_string()))
    }

    fn owner(&self, handle: &ProcessHandle) -> Result<&Arc<dyn ProcessBackend>, RemoteExecError> {
        self.backends
            .iter()
            .find(|b| b.name() == handle.backend)
            .ok_or_else(|| RemoteExecError::Unsupported(handle.host.to_string()))
    }
}

#[async_trait]
impl ProcessBackend for BackendRouter {
    fn name(&self) -> &'static str {
        "router"
    }

    fn supports(&self, host: &HostEntry) -> bool {
        self.pick(host).is_some()
    }

    #[instrument(level = "trace", skip(self, spec, sink), fields(node = %spec.node, host = %spec.host))]
    async fn spawn(
        &self,
        spec: &LaunchSpec,
        sink: &LogSink,
    ) -> Result<ProcessHandle, RemoteExecError> {
        let backend = self.pick_or_err(&spec.host)?;
        trace!(backend = backend.name(), "routing spawn");
        backend.spawn(spec, sink).await
    }

    async fn wait(&self, handle: &ProcessHandle) -> Result<ProcessExit, RemoteExecError> {
        self.owner(handle)?.wait(handle).await
    }

    async fn signal(
        &self,
        handle: &ProcessHandle,
        signal: StopSignal,
    ) -> Result<(), RemoteExecError> {
        self.owner(handle)?.signal(handle, signal).await
    }

    async fn tail_log(
        &self,
        handle: &ProcessHandle,
        lines: usize,
    ) -> Result<String, RemoteExecError> {
        self.owner(handle)?.tail_log(handle, lines).await
    }

    async fn kill_matching(
        &self,
        host: &HostEntry,
        pattern: &str,
    ) -> Result<(), RemoteExecError> {
        self.pick_or_err(host)?.kill_matching(host, pattern).await
    }
}
