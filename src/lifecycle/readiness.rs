//! Post-bind readiness probe.
//!
//! Advisory only: a failed probe is reported, the serving loop keeps running.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::{self, Instant};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReadinessError {
    #[error("listener at {addr} did not accept connections within {waited:?}")]
    BindTimeout { addr: SocketAddr, waited: Duration },
}

/// Address to probe for a listener bound at `local`.
///
/// Unspecified binds (0.0.0.0, ::) are probed over loopback.
pub fn probe_address(local: SocketAddr) -> SocketAddr {
    let ip = match local.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    SocketAddr::new(ip, local.port())
}

/// Connect to `addr` every `interval` until it succeeds or `timeout` elapses.
///
/// Returns how long it took to become ready.
pub async fn wait_until_ready(
    addr: SocketAddr,
    interval: Duration,
    timeout: Duration,
) -> Result<Duration, ReadinessError> {
    let started = Instant::now();
    let deadline = started + timeout;

    loop {
        let attempt_budget = interval.min(deadline.saturating_duration_since(Instant::now()));
        if let Ok(Ok(_stream)) = time::timeout(attempt_budget, TcpStream::connect(addr)).await {
            return Ok(started.elapsed());
        }

        if Instant::now() + interval > deadline {
            return Err(ReadinessError::BindTimeout {
                addr,
                waited: started.elapsed(),
            });
        }
        time::sleep(interval).await;
    }
}
