use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, trace};

use lnch_core::error::RemoteExecError;
use lnch_model::HostEntry;

use super::{RemoteShell, ShellOutput, run_with_stdin};

/// OpenSSH client settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    pub program: String,
    /// Login user; the ssh default when unset.
    pub user: Option<String>,
    /// Extra client arguments, passed before the destination.
    pub options: Vec<String>,
    pub connect_timeout_secs: Option<u32>,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            program: "ssh".into(),
            user: None,
            options: vec![
                "-o".into(),
                "BatchMode=yes".into(),
                "-o".into(),
                "StrictHostKeyChecking=no".into(),
            ],
            connect_timeout_secs: Some(10),
        }
    }
}

impl SshConfig {
    /// Full argument list for reaching `host`, ending with the remote command.
    pub fn args_for(&self, host: &HostEntry) -> Vec<String> {
        let mut args = self.options.clone();
        if let Some(secs) = self.connect_timeout_secs {
            args.push("-o".into());
            args.push(format!("ConnectTimeout={secs}"));
        }
        args.push(match &self.user {
            Some(user) => format!("{user}@{}", host.address),
            None => host.address.clone(),
        });
        args.push("sh".into());
        args.push("-s".into());
        args
    }
}

/// Runs scripts through the OpenSSH client.
#[derive(Debug, Clone, Default)]
pub struct SshShell {
    config: SshConfig,
}

impl SshShell {
    pub fn new(config: SshConfig) -> Self {
        Self { config }
    }
}

/// ssh exits with 255 when the connection itself failed.
const SSH_CONNECT_FAILURE: i32 = 255;

#[async_trait]
impl RemoteShell for SshShell {
    fn name(&self) -> &'static str {
        "ssh"
    }

    async fn run(&self, host: &HostEntry, script: &str) -> Result<ShellOutput, RemoteExecError> {
        let args = self.config.args_for(host);
        trace!(target: "lnch.exec.ssh", program = %self.config.program, ?args, "running");

        let mut cmd = Command::new(&self.config.program);
        cmd.args(&args);
        let out = run_with_stdin(cmd, script)
            .await
            .map_err(|e| RemoteExecError::Connect {
                host: host.address.clone(),
                reason: format!("{}: {e}", self.config.program),
            })?;

        if out.status == Some(SSH_CONNECT_FAILURE) {
            let reason = out.stderr.trim().to_string();
            debug!(target: "lnch.exec.ssh", host = %host, %reason, "ssh failed");
            return Err(classify(host, reason));
        }
        Ok(out)
    }
}

fn classify(host: &HostEntry, reason: String) -> RemoteExecError {
    let host = host.address.clone();
    if reason.contains("Permission denied") || reason.contains("Authentication failed") {
        RemoteExecError::Auth { host, reason }
    } else {
        RemoteExecError::Connect { host, reason }
    }
}
