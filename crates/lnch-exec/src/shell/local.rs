use async_trait::async_trait;
use tokio::process::Command;
use tracing::trace;

use lnch_core::error::RemoteExecError;
use lnch_model::HostEntry;

use super::{RemoteShell, ShellOutput, run_with_stdin};

/// Runs scripts with the local `sh`, whatever the host says.
#[derive(Debug, Clone, Default)]
pub struct LocalShell;

#[async_trait]
impl RemoteShell for LocalShell {
    fn name(&self) -> &'static str {
        "local-sh"
    }

    async fn run(&self, host: &HostEntry, script: &str) -> Result<ShellOutput, RemoteExecError> {
        trace!(target: "lnch.exec.shell", host = %host, "sh -s");
        let mut cmd = Command::new("sh");
        cmd.arg("-s");
        run_with_stdin(cmd, script)
            .await
            .map_err(|e| RemoteExecError::Connect {
                host: host.address.clone(),
                reason: e.to_string(),
            })
    }
}
