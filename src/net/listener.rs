//! TCP listener binding.
//!
//! # Responsibilities
//! - Resolve the configured bind host
//! - Bind the listening socket for one server generation
//! - Optionally retry while a just-released port is still in use

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio::net::{lookup_host, TcpListener};
use tokio::time::{self, Instant};

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The bind host could not be resolved.
    #[error("failed to resolve {target}: {source}")]
    Resolve {
        target: String,
        #[source]
        source: io::Error,
    },

    /// Resolution succeeded but yielded nothing to bind.
    #[error("{target} resolved to no addresses")]
    NoAddress { target: String },

    /// Failed to bind to address.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
}

impl ListenerError {
    pub fn is_addr_in_use(&self) -> bool {
        matches!(self, ListenerError::Bind { source, .. } if source.kind() == io::ErrorKind::AddrInUse)
    }
}

const REBIND_POLL: Duration = Duration::from_millis(50);

/// Bind `target` (`host:port`), returning the listener and its local address.
///
/// With a non-zero `rebind_window`, an `AddrInUse` failure is retried until
/// the window elapses.
pub async fn bind(
    target: &str,
    rebind_window: Duration,
) -> Result<(TcpListener, SocketAddr), ListenerError> {
    let deadline = Instant::now() + rebind_window;
    loop {
        match bind_once(target).await {
            Err(e) if e.is_addr_in_use() && Instant::now() < deadline => {
                tracing::debug!(bind = %target, "Port still in use, retrying bind");
                time::sleep(REBIND_POLL).await;
            }
            result => return result,
        }
    }
}

async fn bind_once(target: &str) -> Result<(TcpListener, SocketAddr), ListenerError> {
    let addrs = lookup_host(target)
        .await
        .map_err(|source| ListenerError::Resolve {
            target: target.to_string(),
            source,
        })?;

    let mut last_error = None;
    for addr in addrs {
        match TcpListener::bind(addr).await {
            Ok(listener) => {
                let local_addr = listener
                    .local_addr()
                    .map_err(|source| ListenerError::Bind { addr, source })?;
                tracing::info!(address = %local_addr, "Listener bound");
                return Ok((listener, local_addr));
            }
            Err(source) => last_error = Some(ListenerError::Bind { addr, source }),
        }
    }

    Err(last_error.unwrap_or_else(|| ListenerError::NoAddress {
        target: target.to_string(),
    }))
}
