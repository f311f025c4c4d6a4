//! Job file loading.
//!
//! A job file is JSON naming the binaries, the hostfile and the parameter
//! layers. A relative `hostfile` is resolved against the job file's directory.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use lnch_core::{JobSpec, LauncherConfig, hostfile};
use lnch_exec::{BackendOptions, RemoteConfig, SshConfig};
use lnch_model::{CorePolicy, EnvironmentSpec, ParameterSet};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobFile {
    pub scheduler_bin: String,
    pub program_bin: String,
    pub hostfile: PathBuf,
    #[serde(default)]
    pub common: ParameterSet,
    #[serde(default)]
    pub scheduler: ParameterSet,
    #[serde(default)]
    pub program: ParameterSet,
    /// Flat `KEY=VALUE ...` string.
    #[serde(default)]
    pub env: String,
    #[serde(default)]
    pub dump_core: bool,
    #[serde(default)]
    pub launcher: LauncherConfig,
    #[serde(default)]
    pub ssh: SshConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
}

/// A job file with its hostfile read and every section resolved.
#[derive(Debug, Clone)]
pub struct LoadedJob {
    pub job: JobSpec,
    pub launcher: LauncherConfig,
    pub ssh: SshConfig,
    pub remote: RemoteConfig,
}

impl LoadedJob {
    pub fn backend_options(&self, force_local: bool) -> BackendOptions {
        BackendOptions {
            force_local,
            remote: self.remote.clone(),
            ssh: self.ssh.clone(),
        }
    }
}

impl JobFile {
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("invalid job file")
    }

    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read job file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Read the hostfile and build the job; `passthrough` is appended to every command line.
    pub fn into_job(self, base: &Path, passthrough: Vec<String>) -> Result<LoadedJob> {
        let hostfile_path = if self.hostfile.is_absolute() {
            self.hostfile.clone()
        } else {
            base.join(&self.hostfile)
        };
        let hosts = hostfile::load(&hostfile_path)
            .with_context(|| format!("hostfile {}", hostfile_path.display()))?;
        let env = EnvironmentSpec::parse(&self.env).context("invalid env")?;

        let job = JobSpec {
            scheduler_bin: self.scheduler_bin,
            program_bin: self.program_bin,
            hosts,
            common: self.common,
            scheduler: self.scheduler,
            program: self.program,
            env,
            core: CorePolicy::from_dump_core(self.dump_core),
            passthrough,
        };
        Ok(LoadedJob {
            job,
            launcher: self.launcher,
            ssh: self.ssh,
            remote: self.remote,
        })
    }
}

/// Load `path` and everything it references.
pub fn load(path: &Path, passthrough: Vec<String>) -> Result<LoadedJob> {
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    JobFile::read(path)?.into_job(base, passthrough)
}
