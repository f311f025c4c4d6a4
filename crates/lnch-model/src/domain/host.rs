use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Role;

/// One machine of the cluster, as described by a hostfile line.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostEntry {
    /// Hostname or IP address used to reach the machine.
    pub address: String,
    /// Optional port annotation (`address:port`).
    ///
    /// Only meaningful for the scheduler entry, where it is the port the scheduler listens on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Role assigned to the machine for this launch.
    pub role: Role,
}

impl HostEntry {
    pub fn new(address: impl Into<String>, port: Option<u16>, role: Role) -> Self {
        Self {
            address: address.into(),
            port,
            role,
        }
    }

    #[inline]
    pub fn is_scheduler(&self) -> bool {
        self.role == Role::Scheduler
    }
}

impl fmt::Display for HostEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}:{}", self.address, port),
            None => f.write_str(&self.address),
        }
    }
}

/// Identity of one launched process inside a session.
///
/// The scheduler has no rank; workers are numbered `0..N` in hostfile order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeId {
    Scheduler,
    Worker(usize),
}

impl NodeId {
    pub fn role(&self) -> Role {
        match self {
            NodeId::Scheduler => Role::Scheduler,
            NodeId::Worker(_) => Role::Worker,
        }
    }

    /// Worker rank, `None` for the scheduler.
    pub fn rank(&self) -> Option<usize> {
        match self {
            NodeId::Scheduler => None,
            NodeId::Worker(i) => Some(*i),
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Scheduler => f.write_str("scheduler"),
            NodeId::Worker(i) => write!(f, "worker-{i}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_port_when_present() {
        let h = HostEntry::new("proj10", Some(33224), Role::Scheduler);
        assert_eq!(h.to_string(), "proj10:33224");

        let h = HostEntry::new("proj5", None, Role::Worker);
        assert_eq!(h.to_string(), "proj5");
    }

    #[test]
    fn node_ids_order_scheduler_first() {
        let mut ids = vec![NodeId::Worker(1), NodeId::Scheduler, NodeId::Worker(0)];
        ids.sort();
        assert_eq!(ids, vec![NodeId::Scheduler, NodeId::Worker(0), NodeId::Worker(1)]);
        assert_eq!(NodeId::Worker(3).to_string(), "worker-3");
        assert_eq!(NodeId::Worker(3).rank(), Some(3));
        assert_eq!(NodeId::Scheduler.role(), Role::Scheduler);
    }
}
