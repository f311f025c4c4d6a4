use std::borrow::Borrow;

use lnch_model::{EventKind, SessionEvent};
use tracing::{debug, error, info, trace, warn};

pub trait View {
    fn kind(&self) -> EventKind;
    fn as_node(&self) -> String;
    fn as_host(&self) -> &str;
    fn as_reason(&self) -> &str;
    fn as_state(&self) -> &str;
    fn pid(&self) -> u32;
    fn code(&self) -> Option<i32>;
}

impl<T> View for T
where
    T: Borrow<SessionEvent>,
{
    #[inline]
    fn kind(&self) -> EventKind {
        self.borrow().kind
    }
    #[inline]
    fn as_node(&self) -> String {
        self.borrow()
            .node
            .map(|n| n.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
    #[inline]
    fn as_host(&self) -> &str {
        self.borrow().host.as_deref().unwrap_or("unknown")
    }
    #[inline]
    fn as_reason(&self) -> &str {
        self.borrow().reason.as_deref().unwrap_or("unknown")
    }
    #[inline]
    fn as_state(&self) -> &str {
        self.borrow().state.map(|s| s.as_str()).unwrap_or("unknown")
    }
    #[inline]
    fn pid(&self) -> u32 {
        self.borrow().pid.unwrap_or(0)
    }
    #[inline]
    fn code(&self) -> Option<i32> {
        self.borrow().code
    }
}

#[inline]
pub fn message_for(kind: EventKind) -> &'static str {
    match kind {
        // session
        EventKind::StateChanged => "session state changed",
        EventKind::SchedulerReady => "scheduler is accepting connections",

        // process lifecycle
        EventKind::SpawnRequested => "spawn requested",
        EventKind::ProcessRunning => "process running",
        EventKind::ProcessExited => "process exited",
        EventKind::ProcessFailed => "process failed",
        EventKind::ProcessTerminated => "process terminated by the launcher",

        // teardown
        EventKind::SignalFailed => "could not deliver stop signal",
        EventKind::GraceExceeded => "grace exceeded; process did not stop in time",
        EventKind::LateSpawnTerminated => "spawn completed after teardown began; terminated",
    }
}

#[inline]
pub fn log_event<E: View>(e: E) {
    let msg = message_for(e.kind());

    match e.kind() {
        // session
        EventKind::StateChanged => info!(target: "lnch.observe", state = e.as_state(), "{msg}"),
        EventKind::SchedulerReady => {
            info!(target: "lnch.observe", node = %e.as_node(), host = e.as_host(), "{msg}")
        }

        // process lifecycle
        EventKind::SpawnRequested => {
            trace!(target: "lnch.observe", node = %e.as_node(), host = e.as_host(), "{msg}")
        }
        EventKind::ProcessRunning => debug!(
            target: "lnch.observe",
            node = %e.as_node(),
            host = e.as_host(),
            pid = e.pid(),
            "{msg}"
        ),
        EventKind::ProcessExited => match e.code() {
            Some(0) => debug!(target: "lnch.observe", node = %e.as_node(), code = 0, "{msg}"),
            Some(code) => warn!(target: "lnch.observe", node = %e.as_node(), host = e.as_host(), code, "{msg}"),
            None => warn!(
                target: "lnch.observe",
                node = %e.as_node(),
                host = e.as_host(),
                reason = e.as_reason(),
                "{msg}"
            ),
        },
        EventKind::ProcessFailed => error!(
            target: "lnch.observe",
            node = %e.as_node(),
            host = e.as_host(),
            reason = e.as_reason(),
            "{msg}"
        ),
        EventKind::ProcessTerminated => {
            debug!(target: "lnch.observe", node = %e.as_node(), pid = e.pid(), "{msg}")
        }

        // teardown
        EventKind::SignalFailed => warn!(
            target: "lnch.observe",
            node = %e.as_node(),
            host = e.as_host(),
            reason = e.as_reason(),
            "{msg}"
        ),
        EventKind::GraceExceeded => {
            warn!(target: "lnch.observe", node = %e.as_node(), host = e.as_host(), "{msg}")
        }
        EventKind::LateSpawnTerminated => {
            warn!(target: "lnch.observe", node = %e.as_node(), host = e.as_host(), "{msg}")
        }
    }
}

#[cfg(test)]
mod tests {
    use lnch_model::{NodeId, SessionState};

    use super::*;

    #[test]
    fn view_falls_back_on_missing_fields() {
        let ev = SessionEvent::new(EventKind::ProcessFailed);
        assert_eq!(ev.as_node(), "unknown");
        assert_eq!(ev.as_host(), "unknown");
        assert_eq!(ev.pid(), 0);
        assert_eq!(ev.code(), None);
    }

    #[test]
    fn view_reads_set_fields() {
        let ev = SessionEvent::state_changed(SessionState::Running)
            .with_node(NodeId::Worker(3))
            .with_host("proj5")
            .with_pid(42);
        assert_eq!(ev.as_state(), SessionState::Running.as_str());
        assert_eq!(ev.as_node(), NodeId::Worker(3).to_string());
        assert_eq!(ev.as_host(), "proj5");
        assert_eq!(ev.pid(), 42);
    }

    #[test]
    fn teardown_kinds_have_distinct_messages() {
        let kinds = [
            EventKind::SignalFailed,
            EventKind::GraceExceeded,
            EventKind::LateSpawnTerminated,
        ];
        let mut msgs: Vec<_> = kinds.iter().map(|k| message_for(*k)).collect();
        msgs.dedup();
        assert_eq!(msgs.len(), kinds.len());
    }
}
