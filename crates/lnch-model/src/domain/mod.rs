mod kv;
pub use kv::KeyValue;

mod host;
pub use host::{HostEntry, NodeId};

mod param;
pub use param::{ParamValue, ParameterSet, ResolvedParameters};

mod env_spec;
pub use env_spec::EnvironmentSpec;

mod launch;
pub use launch::{CorePolicy, LaunchSpec};

mod process_state;
pub use process_state::ProcessState;

mod session_state;
pub use session_state::SessionState;

/// Operating-system process identifier on the target host.
pub type Pid = u32;

/// Timeout value in milliseconds.
///
/// Used in launcher configuration where an explicit time limit is required.
pub type TimeoutMs = u64;
