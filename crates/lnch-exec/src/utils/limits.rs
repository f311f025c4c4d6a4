//! POSIX rlimit setup for directly spawned children.
//!
//! On Unix the limits are applied inside a `pre_exec` hook, executed in the
//! child after `fork()` and right before `execve()`, so the program never runs
//! without them. On other platforms the request is logged and ignored.
use tokio::process::Command;
#[cfg(not(unix))]
use tracing::warn;

use lnch_model::CorePolicy;

/// Core-size rlimit for a child process. `None` leaves the inherited limit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RlimitConfig {
    /// `RLIMIT_CORE`: `Some(None)` means as large as the hard limit allows,
    /// `Some(Some(n))` caps at `n` bytes.
    pub core: Option<Option<u64>>,
}

impl RlimitConfig {
    pub fn for_core(policy: CorePolicy) -> Self {
        Self {
            core: Some(match policy {
                CorePolicy::Enabled => None,
                CorePolicy::Disabled => Some(0),
            }),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.core.is_none()
    }
}

/// Attach the limits to `cmd`.
pub fn attach_rlimits(cmd: &mut Command, config: &RlimitConfig) {
    if config.is_empty() {
        return;
    }

    #[cfg(unix)]
    {
        unix_impl::attach_rlimits(cmd, config);
    }

    #[cfg(not(unix))]
    {
        let _ = cmd;
        warn!(
            target: "lnch.exec.limits",
            ?config,
            "rlimits requested on a non-Unix OS; ignored"
        );
    }
}

#[cfg(unix)]
mod unix_impl {
    use std::io;

    use tokio::process::Command;

    use super::RlimitConfig;

    cfg_if::cfg_if! {
        if #[cfg(all(target_os = "linux", target_env = "gnu"))] {
            type Resource = libc::__rlimit_resource_t;
        } else {
            type Resource = libc::c_int;
        }
    }

    pub fn attach_rlimits(cmd: &mut Command, config: &RlimitConfig) {
        let core = config.core;

        // SAFETY: the hook only calls async-signal-safe setrlimit(2).
        unsafe {
            cmd.pre_exec(move || {
                if let Some(limit) = core {
                    let value = limit.map_or(libc::RLIM_INFINITY, |v| v as libc::rlim_t);
                    apply_rlimit(libc::RLIMIT_CORE, value)?;
                }
                Ok(())
            });
        }
    }

    fn apply_rlimit(resource: Resource, value: libc::rlim_t) -> io::Result<()> {
        let mut current = libc::rlimit {
            rlim_cur: 0,
            rlim_max: 0,
        };
        // An unprivileged process cannot raise the hard limit; stay under it.
        let max = if unsafe { libc::getrlimit(resource, &mut current) } == 0 {
            current.rlim_max
        } else {
            libc::RLIM_INFINITY
        };
        let soft = if max == libc::RLIM_INFINITY { value } else { value.min(max) };

        let rlim = libc::rlimit {
            rlim_cur: soft,
            rlim_max: max,
        };
        let rc = unsafe { libc::setrlimit(resource, &rlim) };
        if rc != 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_policy_maps_to_rlimit() {
        assert_eq!(RlimitConfig::for_core(CorePolicy::Disabled).core, Some(Some(0)));
        assert_eq!(RlimitConfig::for_core(CorePolicy::Enabled).core, Some(None));
        assert!(RlimitConfig::default().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn disabled_core_is_zero_in_child() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("ulimit -c");
        attach_rlimits(&mut cmd, &RlimitConfig::for_core(CorePolicy::Disabled));

        let out = cmd.output().await.unwrap();
        assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "0");
    }
}
