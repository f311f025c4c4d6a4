use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use lnch_model::TimeoutMs;

use crate::params::ArgStyle;

/// How the launcher decides that the scheduler accepts workers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReadinessProbe {
    /// Connect to the scheduler port until it accepts a TCP connection.
    #[default]
    Tcp,
    /// The port is not reachable from the launch host; wait a fixed grace period.
    Grace,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    pub readiness: ReadinessProbe,
    pub readiness_timeout_ms: TimeoutMs,
    pub readiness_poll_ms: u64,
    /// Fixed wait used by [`ReadinessProbe::Grace`].
    pub grace_period_ms: u64,
    /// How long workers may keep running after the scheduler exited cleanly
    /// before the session is failed.
    pub exit_grace_ms: u64,
    /// Bound on teardown: SIGTERM, wait this long, then SIGKILL.
    pub teardown_timeout_ms: TimeoutMs,
    /// Root of per-session log directories on every host.
    pub log_dir: PathBuf,
    /// Lines of log attached to a failure report.
    pub log_tail_lines: usize,
    pub arg_style: ArgStyle,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            readiness: ReadinessProbe::Tcp,
            readiness_timeout_ms: 30_000,
            readiness_poll_ms: 200,
            grace_period_ms: 2_000,
            exit_grace_ms: 2_000,
            teardown_timeout_ms: 5_000,
            log_dir: PathBuf::from("/tmp/lnch"),
            log_tail_lines: 20,
            arg_style: ArgStyle::Split,
        }
    }
}

impl LauncherConfig {
    #[inline]
    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_millis(self.readiness_timeout_ms)
    }

    #[inline]
    pub fn readiness_poll(&self) -> Duration {
        Duration::from_millis(self.readiness_poll_ms.max(1))
    }

    #[inline]
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    #[inline]
    pub fn exit_grace(&self) -> Duration {
        Duration::from_millis(self.exit_grace_ms)
    }

    #[inline]
    pub fn teardown_timeout(&self) -> Duration {
        Duration::from_millis(self.teardown_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: LauncherConfig =
            serde_json::from_str(r#"{"teardown_timeout_ms": 100, "readiness": "grace"}"#).unwrap();

        assert_eq!(cfg.teardown_timeout(), Duration::from_millis(100));
        assert_eq!(cfg.readiness, ReadinessProbe::Grace);
        assert_eq!(cfg.readiness_timeout_ms, 30_000);
        assert_eq!(cfg.arg_style, ArgStyle::Split);
    }
}
