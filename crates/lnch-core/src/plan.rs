use serde::Serialize;
use tracing::{debug, warn};

use lnch_model::{
    CorePolicy, EnvironmentSpec, HostEntry, LaunchSpec, NodeId, ParamValue, ParameterSet,
    ResolvedParameters, Role,
};

use crate::{
    assemble::{CommandAssembler, FLAG_SCHEDULER, FLAG_SCHEDULER_PORT, NodeInput, SchedulerEndpoint},
    error::PlanError,
    params::{ArgStyle, resolve},
};

/// Caller-supplied description of one distributed job.
#[derive(Debug, Clone, Default)]
pub struct JobSpec {
    pub scheduler_bin: String,
    pub program_bin: String,
    pub hosts: Vec<HostEntry>,
    pub common: ParameterSet,
    pub scheduler: ParameterSet,
    pub program: ParameterSet,
    pub env: EnvironmentSpec,
    pub core: CorePolicy,
    /// Raw arguments appended verbatim to every command line.
    pub passthrough: Vec<String>,
}

/// The fully resolved launch: one spec per node, computed before anything starts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LaunchPlan {
    pub endpoint: SchedulerEndpoint,
    pub scheduler_params: ResolvedParameters,
    pub worker_params: ResolvedParameters,
    pub scheduler: LaunchSpec,
    pub workers: Vec<LaunchSpec>,
}

impl LaunchPlan {
    pub fn build(job: &JobSpec, style: ArgStyle) -> Result<Self, PlanError> {
        if job.scheduler_bin.trim().is_empty() {
            return Err(PlanError::EmptyBinary("scheduler"));
        }
        if job.program_bin.trim().is_empty() {
            return Err(PlanError::EmptyBinary("program"));
        }

        let scheduler_host = job
            .hosts
            .iter()
            .find(|h| h.is_scheduler())
            .ok_or(crate::error::HostfileError::MissingScheduler)?;
        let worker_hosts: Vec<&HostEntry> =
            job.hosts.iter().filter(|h| !h.is_scheduler()).collect();
        if worker_hosts.is_empty() {
            return Err(PlanError::NoWorkers);
        }

        let scheduler_params = resolve(Role::Scheduler, &job.common, &job.scheduler, &job.program);
        let worker_params = resolve(Role::Worker, &job.common, &job.scheduler, &job.program);

        let endpoint = resolve_endpoint(scheduler_host, &scheduler_params)?;

        let asm = CommandAssembler {
            style,
            env: &job.env,
            core: job.core,
            endpoint: &endpoint,
            num_workers: worker_hosts.len(),
            passthrough: &job.passthrough,
        };

        let scheduler = asm.assemble(NodeInput {
            node: NodeId::Scheduler,
            host: scheduler_host,
            binary: &job.scheduler_bin,
            params: &scheduler_params,
        });
        let workers = worker_hosts
            .iter()
            .enumerate()
            .map(|(rank, &host)| {
                asm.assemble(NodeInput {
                    node: NodeId::Worker(rank),
                    host,
                    binary: &job.program_bin,
                    params: &worker_params,
                })
            })
            .collect::<Vec<_>>();

        debug!(
            target: "lnch.core.plan",
            endpoint = %endpoint,
            workers = workers.len(),
            core = %job.core,
            "launch plan built"
        );

        Ok(Self {
            endpoint,
            scheduler_params,
            worker_params,
            scheduler,
            workers,
        })
    }

    /// Every spec, scheduler first.
    pub fn specs(&self) -> impl Iterator<Item = &LaunchSpec> {
        std::iter::once(&self.scheduler).chain(self.workers.iter())
    }

    pub fn node_count(&self) -> usize {
        1 + self.workers.len()
    }

    pub fn core_policy(&self) -> CorePolicy {
        self.scheduler.core
    }
}

/// Scheduler port: hostfile annotation first, then the `scheduler_port` parameter.
fn resolve_endpoint(
    host: &HostEntry,
    params: &ResolvedParameters,
) -> Result<SchedulerEndpoint, PlanError> {
    if let Some(ParamValue::String(declared)) = params.get(FLAG_SCHEDULER)
        && declared != &host.address
    {
        warn!(
            target: "lnch.core.plan",
            declared = %declared,
            hostfile = %host.address,
            "'scheduler' parameter differs from the hostfile scheduler; the hostfile wins"
        );
    }

    let port = match host.port {
        Some(p) => p,
        None => match params.get(FLAG_SCHEDULER_PORT) {
            Some(ParamValue::Int(p)) => u16::try_from(*p)
                .ok()
                .filter(|p| *p != 0)
                .ok_or_else(|| PlanError::InvalidSchedulerPort(p.to_string()))?,
            Some(ParamValue::String(s)) => s
                .trim()
                .parse::<u16>()
                .ok()
                .filter(|p| *p != 0)
                .ok_or_else(|| PlanError::InvalidSchedulerPort(s.clone()))?,
            Some(other) => return Err(PlanError::InvalidSchedulerPort(other.to_string())),
            None => return Err(PlanError::MissingSchedulerPort),
        },
    };

    Ok(SchedulerEndpoint {
        address: host.address.clone(),
        port,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::hostfile;

    pub(crate) fn lr_job(hostfile_text: &str) -> JobSpec {
        JobSpec {
            scheduler_bin: "release/SchedulerMain".into(),
            program_bin: "release/DenseLRExample".into(),
            hosts: hostfile::parse(hostfile_text).unwrap(),
            common: ParameterSet::new()
                .with("scheduler", "proj10")
                .with("scheduler_port", "33224")
                .with("hdfs_namenode", "proj10")
                .with("hdfs_port", 9000),
            scheduler: ParameterSet::new().with("dag_runner_type", "sequential"),
            program: ParameterSet::new()
                .with("url", "/jasper/avazu-app")
                .with("num_local_threads", 20)
                .with("alpha", 0.005)
                .with("is_sparse", false),
            env: EnvironmentSpec::parse("GLOG_logtostderr=true GLOG_v=-1").unwrap(),
            core: CorePolicy::Disabled,
            passthrough: Vec::new(),
        }
    }

    #[test]
    fn builds_one_spec_per_host() {
        let plan = LaunchPlan::build(&lr_job("proj10\nproj5\nproj6\nproj7\nproj8\n"), ArgStyle::Split)
            .unwrap();

        assert_eq!(plan.node_count(), 5);
        assert_eq!(plan.scheduler.host.address, "proj10");
        assert_eq!(plan.scheduler.binary, "release/SchedulerMain");
        assert_eq!(plan.endpoint.to_string(), "proj10:33224");
        for (rank, w) in plan.workers.iter().enumerate() {
            assert_eq!(w.node, NodeId::Worker(rank));
            assert_eq!(w.binary, "release/DenseLRExample");
        }
        assert_eq!(plan.workers[0].host.address, "proj5");
    }

    #[test]
    fn core_policy_is_uniform() {
        let mut job = lr_job("proj10\nproj5\nproj6\n");
        job.core = CorePolicy::Enabled;
        let plan = LaunchPlan::build(&job, ArgStyle::Split).unwrap();
        assert!(plan.specs().all(|s| s.core == CorePolicy::Enabled));
    }

    #[test]
    fn hostfile_port_beats_parameter() {
        let plan = LaunchPlan::build(&lr_job("proj10:4000\nproj5\n"), ArgStyle::Split).unwrap();
        assert_eq!(plan.endpoint.port, 4000);
    }

    #[test]
    fn missing_or_bad_port_is_rejected() {
        let mut job = lr_job("proj10\nproj5\n");
        job.common = ParameterSet::new();
        assert_eq!(
            LaunchPlan::build(&job, ArgStyle::Split),
            Err(PlanError::MissingSchedulerPort)
        );

        job.common = ParameterSet::new().with("scheduler_port", "http");
        assert_eq!(
            LaunchPlan::build(&job, ArgStyle::Split),
            Err(PlanError::InvalidSchedulerPort("http".into()))
        );

        job.common = ParameterSet::new().with("scheduler_port", 70000);
        assert!(matches!(
            LaunchPlan::build(&job, ArgStyle::Split),
            Err(PlanError::InvalidSchedulerPort(_))
        ));
    }

    #[test]
    fn scheduler_only_hostfile_is_rejected() {
        assert_eq!(
            LaunchPlan::build(&lr_job("proj10\n"), ArgStyle::Split),
            Err(PlanError::NoWorkers)
        );
    }

    #[test]
    fn same_inputs_same_plan() {
        let job = lr_job("proj10\nproj5\nproj6\n");
        assert_eq!(
            LaunchPlan::build(&job, ArgStyle::Split).unwrap(),
            LaunchPlan::build(&job, ArgStyle::Split).unwrap()
        );
    }
}
