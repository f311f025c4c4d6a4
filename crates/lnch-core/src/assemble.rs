use std::fmt;

use serde::Serialize;
use tracing::debug;

use lnch_model::{
    CorePolicy, EnvironmentSpec, HostEntry, LaunchSpec, NodeId, ParamValue, ResolvedParameters,
};

use crate::params::{ArgStyle, render_args};

/// Flags owned by the launcher. They replace user parameters of the same name.
pub const FLAG_SCHEDULER: &str = "scheduler";
pub const FLAG_SCHEDULER_PORT: &str = "scheduler_port";
pub const FLAG_NODE_ID: &str = "node_id";
pub const FLAG_NUM_WORKERS: &str = "num_workers";

/// Where workers find the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SchedulerEndpoint {
    pub address: String,
    pub port: u16,
}

impl fmt::Display for SchedulerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.address.contains(':') {
            write!(f, "[{}]:{}", self.address, self.port)
        } else {
            write!(f, "{}:{}", self.address, self.port)
        }
    }
}

/// Per-node inputs of the assembler.
#[derive(Debug, Clone)]
pub struct NodeInput<'a> {
    pub node: NodeId,
    pub host: &'a HostEntry,
    pub binary: &'a str,
    pub params: &'a ResolvedParameters,
}

/// Turns resolved parameters into concrete launch specs.
///
/// Session-wide inputs (environment, core policy, passthrough arguments, scheduler location
/// and worker count) are fixed at construction, so every spec of a session agrees on them.
#[derive(Debug, Clone)]
pub struct CommandAssembler<'a> {
    pub style: ArgStyle,
    pub env: &'a EnvironmentSpec,
    pub core: CorePolicy,
    pub endpoint: &'a SchedulerEndpoint,
    pub num_workers: usize,
    pub passthrough: &'a [String],
}

impl CommandAssembler<'_> {
    /// Build the launch spec for one node. Same inputs always yield the same spec.
    pub fn assemble(&self, input: NodeInput<'_>) -> LaunchSpec {
        let mut params = input.params.params().clone();
        for (key, value) in self.launcher_flags(input.node) {
            if let Some(prev) = params.insert(key, value.clone())
                && prev != value
            {
                debug!(
                    target: "lnch.core.assemble",
                    node = %input.node,
                    flag = key,
                    user = %prev,
                    launcher = %value,
                    "launcher flag overrides parameter"
                );
            }
        }

        let mut args = render_args(&params, self.style);
        args.extend(self.passthrough.iter().cloned());

        LaunchSpec {
            node: input.node,
            host: input.host.clone(),
            binary: input.binary.to_string(),
            args,
            env: self.env.clone(),
            core: self.core,
        }
    }

    fn launcher_flags(&self, node: NodeId) -> Vec<(&'static str, ParamValue)> {
        let port = ParamValue::Int(self.endpoint.port as i64);
        let workers = ParamValue::Int(self.num_workers as i64);
        match node {
            NodeId::Scheduler => vec![(FLAG_SCHEDULER_PORT, port), (FLAG_NUM_WORKERS, workers)],
            NodeId::Worker(rank) => vec![
                (FLAG_SCHEDULER, ParamValue::String(self.endpoint.address.clone())),
                (FLAG_SCHEDULER_PORT, port),
                (FLAG_NODE_ID, ParamValue::Int(rank as i64)),
                (FLAG_NUM_WORKERS, workers),
            ],
        }
    }
}
