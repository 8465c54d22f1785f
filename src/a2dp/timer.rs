//! Session timers
//!
//! Timers are owned by the application's executor. Expiry is posted back as
//! an [`Envelope::Timer`](crate::Envelope::Timer) and re-enters the state
//! machine as an ordinary event.

use super::StreamHandle;
use super::event::SsmEvent;

/// Named per-stream timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerId {
    /// Remote control discovery delay, also used to re-check a pending role switch
    RcDiscovery,
    /// Guard on a close request the peer never answers
    CloseGuard,
    /// Guard on an incoming connection the peer never configures
    AcceptSignalling,
}

impl TimerId {
    /// Every timer
    pub const ALL: [Self; 3] = [Self::RcDiscovery, Self::CloseGuard, Self::AcceptSignalling];

    /// Event raised when the timer expires
    #[must_use]
    pub const fn expiry_event(self) -> SsmEvent {
        match self {
            Self::RcDiscovery => SsmEvent::AvrcTimer,
            Self::CloseGuard => SsmEvent::ApiClose,
            Self::AcceptSignalling => SsmEvent::CollisionTimeout,
        }
    }
}

/// One-shot timer scheduling
pub trait TimerService {
    /// Arm (or re-arm) a timer for `handle`
    fn start(&mut self, handle: StreamHandle, id: TimerId, timeout_ms: u32);

    /// Disarm a timer; no-op when not running
    fn cancel(&mut self, handle: StreamHandle, id: TimerId);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_events() {
        assert_eq!(TimerId::RcDiscovery.expiry_event(), SsmEvent::AvrcTimer);
        assert_eq!(TimerId::CloseGuard.expiry_event(), SsmEvent::ApiClose);
        assert_eq!(
            TimerId::AcceptSignalling.expiry_event(),
            SsmEvent::CollisionTimeout
        );
    }
}
