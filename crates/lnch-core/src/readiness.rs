use std::time::Duration;

use tokio::{net::TcpStream, time::Instant};
use tracing::{debug, trace};

use crate::{
    assemble::SchedulerEndpoint,
    config::{LauncherConfig, ReadinessProbe},
    error::LaunchError,
};

/// Wait until the scheduler can accept workers.
///
/// `Tcp` retries a connection to the endpoint until it succeeds or the
/// readiness timeout elapses. `Grace` sleeps for the configured period.
pub async fn wait_ready(
    endpoint: &SchedulerEndpoint,
    config: &LauncherConfig,
) -> Result<Duration, LaunchError> {
    let started = Instant::now();
    match config.readiness {
        ReadinessProbe::Grace => {
            tokio::time::sleep(config.grace_period()).await;
            debug!(target: "lnch.core.readiness", endpoint = %endpoint, "grace period elapsed");
            Ok(started.elapsed())
        }
        ReadinessProbe::Tcp => probe_tcp(endpoint, config, started).await,
    }
}

async fn probe_tcp(
    endpoint: &SchedulerEndpoint,
    config: &LauncherConfig,
    started: Instant,
) -> Result<Duration, LaunchError> {
    let deadline = started + config.readiness_timeout();
    let addr = (endpoint.address.as_str(), endpoint.port);

    loop {
        let attempt = tokio::time::timeout_at(deadline, TcpStream::connect(addr)).await;
        match attempt {
            Ok(Ok(_stream)) => {
                debug!(
                    target: "lnch.core.readiness",
                    endpoint = %endpoint,
                    waited_ms = started.elapsed().as_millis() as u64,
                    "scheduler port accepts connections"
                );
                return Ok(started.elapsed());
            }
            Ok(Err(e)) => {
                trace!(target: "lnch.core.readiness", endpoint = %endpoint, error = %e, "not ready yet");
            }
            Err(_) => break,
        }
        if Instant::now() + config.readiness_poll() >= deadline {
            break;
        }
        tokio::time::sleep(config.readiness_poll()).await;
    }

    Err(LaunchError::ReadinessTimeout {
        address: endpoint.to_string(),
        waited_ms: config.readiness_timeout_ms,
    })
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;

    use super::*;

    fn endpoint(port: u16) -> SchedulerEndpoint {
        SchedulerEndpoint {
            address: "127.0.0.1".into(),
            port,
        }
    }

    #[tokio::test]
    async fn tcp_probe_succeeds_on_listening_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let cfg = LauncherConfig::default();
        assert!(wait_ready(&endpoint(port), &cfg).await.is_ok());
    }

    #[tokio::test]
    async fn tcp_probe_times_out_on_closed_port() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let cfg = LauncherConfig {
            readiness_timeout_ms: 100,
            readiness_poll_ms: 10,
            ..LauncherConfig::default()
        };

        let err = wait_ready(&endpoint(port), &cfg).await.unwrap_err();
        assert_eq!(
            err,
            LaunchError::ReadinessTimeout {
                address: format!("127.0.0.1:{port}"),
                waited_ms: 100,
            }
        );
    }

    #[tokio::test]
    async fn grace_probe_waits_fixed_period() {
        let cfg = LauncherConfig {
            readiness: ReadinessProbe::Grace,
            grace_period_ms: 30,
            ..LauncherConfig::default()
        };
        let waited = wait_ready(&endpoint(1), &cfg).await.unwrap();
        assert!(waited >= Duration::from_millis(30));
    }
}
