//! Plan and run distributed jobs: one scheduler, then a fan-out of workers.
//!
//! The pipeline is pure up to [`LaunchPlan`]: hostfile parsing, parameter
//! merging and command assembly never touch a host. [`ClusterLauncher`] then
//! drives a [`ProcessBackend`] to execute the plan.
pub mod assemble;
pub mod backend;
pub use backend::{LogSink, ProcessBackend, ProcessExit, ProcessHandle, StopSignal};
pub mod config;
pub use config::{LauncherConfig, ReadinessProbe};
pub mod error;
pub mod explain;
pub mod hostfile;
pub mod launcher;
pub use launcher::{ClusterLauncher, ClusterSession};
pub mod params;
pub use params::ArgStyle;
pub mod plan;
pub use plan::{JobSpec, LaunchPlan};
pub mod readiness;
pub mod report;
pub use report::{FailureCause, FailureReport, SessionOutcome, SessionSnapshot, TeardownSummary};
pub mod router;
pub use router::BackendRouter;
pub mod state;
