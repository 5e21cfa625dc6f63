//! Error types for the gateway daemon.

use asimov_core::DeviceError;

/// Errors that can occur in the daemon
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Port is not a number in 0..=65535
    #[error("Invalid port: {0:?}")]
    InvalidPort(String),

    /// No passive address could be bound
    #[error("Failed to bind port {port}: {source}")]
    Bind {
        port: String,
        #[source]
        source: std::io::Error,
    },

    /// Signal handlers could not be installed
    #[error("Failed to install signal handler: {0}")]
    Signal(#[source] std::io::Error),

    /// Relaunched gateway exited before it was ready
    #[error("Gateway exited during startup ({0})")]
    Startup(std::process::ExitStatus),

    /// Robot device error
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),
}

/// Result type alias for daemon operations
pub type Result<T> = std::result::Result<T, DaemonError>;
