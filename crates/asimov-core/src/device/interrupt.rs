use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use crate::error::{DeviceError, Result};

/// Cuts host-side waits short, so a command stuck in one gives up the device.
///
/// Clones share one flag. Once triggered it stays triggered.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl Interrupt {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wake every sleeper and fail every later sleep.
    pub fn trigger(&self) {
        let (triggered, wake) = &*self.inner;
        *triggered.lock().unwrap_or_else(PoisonError::into_inner) = true;
        wake.notify_all();
    }

    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block for `duration` unless triggered first.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::Interrupted` if triggered before or during the wait.
    pub fn sleep(&self, duration: Duration) -> Result<()> {
        let (triggered, wake) = &*self.inner;
        let guard = triggered.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = wake
            .wait_timeout_while(guard, duration, |triggered| !*triggered)
            .unwrap_or_else(PoisonError::into_inner);

        if *guard {
            Err(DeviceError::Interrupted)
        } else {
            Ok(())
        }
    }
}
