//! Asimov gateway daemon library.
//!
//! This crate provides the TCP server that lets one remote client at a time
//! drive a robot over the line protocol from `asimov-protocol`.

pub mod config;
pub mod error;
pub mod listener;
pub mod server;
pub mod session;
pub mod slot;

pub use config::{BACKLOG, ServerConfig};
pub use error::{DaemonError, Result};
pub use server::{Admission, Robot, ServerContext, open_device, run, serve, shutdown_signal};
pub use session::{Session, SessionEnd, SessionHandler, SessionId, SessionState, SharedDevice};
pub use slot::{SessionSlot, SlotLease, SlotOccupied};
