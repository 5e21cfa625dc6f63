//! The single active-session marker.
//!
//! At most one session holds the slot. Claiming and releasing go through one
//! mutex so a session ending and a connection arriving never both own it.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::session::SessionId;

/// Shared handle to the active-session marker.
#[derive(Debug, Clone, Default)]
pub struct SessionSlot {
    active: Arc<Mutex<Option<SessionId>>>,
}

/// Another session already holds the slot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Session {0} is active")]
pub struct SlotOccupied(pub SessionId);

impl SessionSlot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `id` active if no session is.
    ///
    /// # Errors
    ///
    /// Returns `SlotOccupied` with the active session's id otherwise.
    pub fn try_claim(&self, id: SessionId) -> Result<SlotLease, SlotOccupied> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(current) = active.as_ref() {
            return Err(SlotOccupied(current.clone()));
        }

        *active = Some(id.clone());
        debug!("Session slot claimed by {}", id);
        Ok(SlotLease {
            slot: self.clone(),
            id,
            released: false,
        })
    }

    #[must_use]
    pub fn active(&self) -> Option<SessionId> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active().is_some()
    }

    fn release(&self, id: &SessionId) -> bool {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if active.as_ref() == Some(id) {
            *active = None;
            true
        } else {
            false
        }
    }
}

/// Ownership of the slot by one session.
///
/// The slot is cleared exactly once, by [`SlotLease::release`] or on drop,
/// whichever comes first.
#[derive(Debug)]
pub struct SlotLease {
    slot: SessionSlot,
    id: SessionId,
    released: bool,
}

impl SlotLease {
    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn release(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if self.slot.release(&self.id) {
            debug!("Session slot released by {}", self.id);
        }
    }
}

impl Drop for SlotLease {
    fn drop(&mut self) {
        self.release_once();
    }
}
