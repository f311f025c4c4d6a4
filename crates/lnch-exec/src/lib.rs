//! Process backends: direct local spawning and shell-driven remote hosts.
mod host;
pub use host::is_local_host;

pub mod remote;
pub use remote::{RemoteConfig, RemoteProcessManager};

pub mod shell;
pub use shell::{LocalShell, RemoteShell, ShellOutput};
#[cfg(feature = "ssh")]
pub use shell::{SshConfig, SshShell};

#[cfg(feature = "local")]
pub mod proc;
#[cfg(feature = "local")]
pub use proc::LocalProcessManager;

pub mod util;
mod utils;

use std::sync::Arc;

use lnch_core::BackendRouter;

/// Backend selection for a launch.
#[derive(Debug, Clone, Default)]
pub struct BackendOptions {
    /// Run every node on this machine.
    pub force_local: bool,
    pub remote: RemoteConfig,
    #[cfg(feature = "ssh")]
    pub ssh: SshConfig,
}

/// Router serving local hosts with direct spawning and everything else over ssh.
pub fn default_router(opts: &BackendOptions) -> BackendRouter {
    let mut router = BackendRouter::new();

    #[cfg(feature = "local")]
    {
        let local = LocalProcessManager::new();
        let local = if opts.force_local {
            local.for_all_hosts()
        } else {
            local
        };
        router.register(Arc::new(local));
    }

    #[cfg(feature = "ssh")]
    {
        if !opts.force_local {
            let ssh =
                RemoteProcessManager::new(SshShell::new(opts.ssh.clone()), opts.remote.clone())
                    .with_name("ssh");
            router.register(Arc::new(ssh));
        }
    }

    #[cfg(not(feature = "local"))]
    {
        if opts.force_local {
            router.register(Arc::new(
                RemoteProcessManager::new(LocalShell, opts.remote.clone()).with_name("local-sh"),
            ));
        }
    }

    router
}
