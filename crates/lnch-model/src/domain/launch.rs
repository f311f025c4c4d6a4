use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{EnvironmentSpec, HostEntry, NodeId};

/// Core-dump resource-limit policy, identical for every process of a session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CorePolicy {
    /// `RLIMIT_CORE` raised to unlimited; crash artifacts are kept for postmortem.
    Enabled,
    /// `RLIMIT_CORE = 0`; no core file is ever written.
    #[default]
    Disabled,
}

impl CorePolicy {
    pub fn from_dump_core(dump_core: bool) -> Self {
        if dump_core {
            CorePolicy::Enabled
        } else {
            CorePolicy::Disabled
        }
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        matches!(self, CorePolicy::Enabled)
    }

    /// Requested `ulimit -c` value. Backends cap it at the host's hard limit.
    pub fn ulimit_value(&self) -> &'static str {
        match self {
            CorePolicy::Enabled => "unlimited",
            CorePolicy::Disabled => "0",
        }
    }
}

impl fmt::Display for CorePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "core-dump={}", self.ulimit_value())
    }
}

/// Everything needed to start one process on one node.
///
/// Built once per node before any process starts and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LaunchSpec {
    /// Identity of the process inside the session.
    pub node: NodeId,
    /// Target machine.
    pub host: HostEntry,
    /// Path of the binary on the target machine.
    pub binary: String,
    /// Final argument list (serialized parameters, launcher flags, passthrough arguments).
    pub args: Vec<String>,
    /// Exported environment.
    pub env: EnvironmentSpec,
    /// Resource-limit policy.
    pub core: CorePolicy,
}

impl LaunchSpec {
    /// The command line as a single space-joined string, arguments unescaped.
    pub fn command_line(&self) -> String {
        let mut line = self.binary.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}
