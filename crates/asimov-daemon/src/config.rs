//! Runtime configuration for the gateway.

use std::path::PathBuf;

use asimov_core::DEFAULT_DEVICE;
use asimov_protocol::{ArgPolicy, DEFAULT_PORT};

use crate::error::{DaemonError, Result};

/// Pending connections the listening socket queues.
pub const BACKLOG: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Port to listen on, as given on the command line.
    pub port: String,
    /// Serial device the robot is attached to.
    pub device: PathBuf,
    pub verbosity: u8,
    /// Stay attached to the launching terminal.
    pub foreground: bool,
    /// Log robot operations instead of opening the device.
    pub dry_run: bool,
    pub policy: ArgPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_string(),
            device: PathBuf::from(DEFAULT_DEVICE),
            verbosity: 0,
            foreground: false,
            dry_run: false,
            policy: ArgPolicy::default(),
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn log_level(&self) -> &'static str {
        log_level(self.verbosity)
    }
}

/// Parse a port given as text.
///
/// # Errors
///
/// Returns `DaemonError::InvalidPort` for anything but a decimal `u16`.
pub fn parse_port(port: &str) -> Result<u16> {
    port.trim()
        .parse::<u16>()
        .map_err(|_| DaemonError::InvalidPort(port.to_string()))
}

/// Log level for a `-v` count.
#[must_use]
pub fn log_level(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}
