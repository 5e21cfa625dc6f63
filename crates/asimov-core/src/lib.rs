//! Robot side of the Asimov gateway.
//!
//! - [`device`]: the [`Device`] adapter trait, the Create Open Interface
//!   adapter and a logging device for dry runs
//! - [`dispatch`]: turns a command line into a device call and a reply

pub mod device;
pub mod dispatch;

mod error;

pub use device::{DEFAULT_DEVICE, Device, Interrupt, Journal, LoggingDevice, OpenInterface};
pub use dispatch::{Dispatcher, Outcome, execute};
pub use error::{DeviceError, Result};
