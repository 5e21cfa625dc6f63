//! Listening socket bootstrap.
//!
//! Resolves the passive (bind-anywhere) addresses for a port and binds the
//! first one that works, with address reuse and a fixed backlog. Accepting is
//! left to the server loop.

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use tokio::net::{TcpListener, TcpSocket};
use tracing::{debug, info};

use crate::config::{BACKLOG, parse_port};
use crate::error::{DaemonError, Result};

/// Bind-anywhere addresses for `port`, IPv4 first.
#[must_use]
pub fn passive_addresses(port: u16) -> Vec<SocketAddr> {
    vec![
        SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), port),
        SocketAddr::new(Ipv6Addr::UNSPECIFIED.into(), port),
    ]
}

/// Bind a listener on the passive addresses for `port`.
///
/// # Errors
///
/// Returns `DaemonError::InvalidPort` if `port` is not numeric, or
/// `DaemonError::Bind` if no address could be bound.
pub fn bind(port: &str) -> Result<TcpListener> {
    let number = parse_port(port)?;
    bind_first(&passive_addresses(number), port)
}

/// Bind the first candidate that accepts a listener.
///
/// # Errors
///
/// Returns `DaemonError::Bind` carrying the last failure if every candidate fails.
pub fn bind_first(candidates: &[SocketAddr], port: &str) -> Result<TcpListener> {
    let mut last_error = None;

    for addr in candidates {
        match bind_one(*addr) {
            Ok(listener) => {
                let local = listener.local_addr().unwrap_or(*addr);
                info!("Listening on {}", local);
                return Ok(listener);
            }
            Err(e) => {
                debug!("Could not bind {}: {}", addr, e);
                last_error = Some(e);
            }
        }
    }

    Err(DaemonError::Bind {
        port: port.to_string(),
        source: last_error.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::AddrNotAvailable, "no addresses to bind")
        }),
    })
}

fn bind_one(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(BACKLOG)
}
