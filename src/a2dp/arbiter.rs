//! Service discovery arbiter
//!
//! Only one SDP lookup may be outstanding system-wide. Streams ask the
//! arbiter for the slot before starting a lookup; a stream that finds the
//! slot taken is queued and is handed the slot (as a `DiscoveryGranted`
//! event) when the current owner releases it.

use super::{A2dpError, StreamHandle};
use crate::constants::MAX_STREAMS;
use heapless::Deque;

/// Outcome of a slot request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Acquire {
    /// The caller owns the slot and may start the lookup
    Granted,
    /// Another stream owns the slot; the caller waits for `DiscoveryGranted`
    Queued,
}

/// Single-owner discovery slot with a FIFO of waiting streams
#[derive(Debug, Default)]
pub struct DiscoveryArbiter {
    owner: Option<StreamHandle>,
    waiters: Deque<StreamHandle, MAX_STREAMS>,
}

impl DiscoveryArbiter {
    /// Create an idle arbiter
    #[must_use]
    pub const fn new() -> Self {
        Self {
            owner: None,
            waiters: Deque::new(),
        }
    }

    /// Stream currently owning the slot
    #[must_use]
    pub const fn owner(&self) -> Option<StreamHandle> {
        self.owner
    }

    /// True when `handle` waits for the slot
    #[must_use]
    pub fn is_waiting(&self, handle: StreamHandle) -> bool {
        self.waiters.iter().any(|waiter| *waiter == handle)
    }

    /// Request the slot for `handle`
    ///
    /// # Errors
    /// Returns [`A2dpError::Busy`] if the wait queue is full
    pub fn acquire(&mut self, handle: StreamHandle) -> Result<Acquire, A2dpError> {
        match self.owner {
            None => {
                self.owner = Some(handle);
                debug!("[ARBITER] stream {} owns discovery", handle);
                Ok(Acquire::Granted)
            }
            Some(owner) if owner == handle => Ok(Acquire::Granted),
            Some(owner) => {
                if !self.is_waiting(handle) {
                    self.waiters
                        .push_back(handle)
                        .map_err(|_| A2dpError::Busy)?;
                }
                debug!(
                    "[ARBITER] stream {} queued behind stream {}",
                    handle, owner
                );
                Ok(Acquire::Queued)
            }
        }
    }

    /// Give up the slot or a pending claim.
    ///
    /// Returns the stream the slot was handed to, if any.
    pub fn release(&mut self, handle: StreamHandle) -> Option<StreamHandle> {
        if self.owner == Some(handle) {
            self.owner = self.waiters.pop_front();
            if let Some(next) = self.owner {
                debug!("[ARBITER] discovery handed from {} to {}", handle, next);
            }
            return self.owner;
        }

        for _ in 0..self.waiters.len() {
            match self.waiters.pop_front() {
                Some(waiter) if waiter != handle => {
                    self.waiters.push_back(waiter).ok();
                }
                _ => {}
            }
        }
        None
    }
}
