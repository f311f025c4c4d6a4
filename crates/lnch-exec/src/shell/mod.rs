//! The remote-execution primitive: run a POSIX shell script on a host.
//!
//! Scripts are fed on stdin to `sh -s`, so they never pass through a second
//! round of quoting on the remote side.
use std::process::Stdio;

use async_trait::async_trait;
use tokio::{io::AsyncWriteExt, process::Command};

use lnch_core::error::RemoteExecError;
use lnch_model::HostEntry;

#[cfg(feature = "ssh")]
mod ssh;
#[cfg(feature = "ssh")]
pub use ssh::{SshConfig, SshShell};

mod local;
pub use local::LocalShell;

/// Captured result of one script run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellOutput {
    /// Exit status of the script; `None` if it was killed by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ShellOutput {
    #[inline]
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

#[async_trait]
pub trait RemoteShell: Send + Sync {
    fn name(&self) -> &'static str;

    fn supports(&self, _host: &HostEntry) -> bool {
        true
    }

    /// Run `script` on `host` and wait for it to finish.
    async fn run(&self, host: &HostEntry, script: &str) -> Result<ShellOutput, RemoteExecError>;
}

/// Spawn `cmd`, write `script` to its stdin and collect the output.
pub(crate) async fn run_with_stdin(
    mut cmd: Command,
    script: &str,
) -> std::io::Result<ShellOutput> {
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn()?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(script.as_bytes()).await?;
        stdin.shutdown().await?;
    }
    let out = child.wait_with_output().await?;

    Ok(ShellOutput {
        status: out.status.code(),
        stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
    })
}
