#![no_std]
#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![allow(dead_code, clippy::unused_async, clippy::too_many_lines)]

mod fmt;

mod address;
pub mod a2dp;
pub mod api;
pub mod constants;
pub mod processor;

use crate::a2dp::avdtp::{PscMask, StreamConfig};
use crate::a2dp::event::{Notification, ProtectData, SsmEvent};
use crate::a2dp::timer::TimerId;
use crate::a2dp::{AvdtpErrorCode, StreamHandle};
use crate::constants::{
    DEFAULT_ACCEPT_SIGNALLING_MS, DEFAULT_CLOSE_GUARD_MS, DEFAULT_QUEUE_CHECK_THRESHOLD,
    DEFAULT_RC_DISCOVERY_DELAY_MS, DEFAULT_RECONFIG_RETRY, MAX_PENDING_FRAMES, MAX_QUEUED_EVENTS,
};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Channel;

pub use address::BluetoothAddress;

/// Options for configuring the stream session state machine
///
/// Feature bits select optional protocol behaviour; the remaining fields
/// tune timers and the media queue. Every field has a `with_*` setter so
/// options can be built in a `const` context.
///
/// # Examples
///
/// ```rust
/// use bondybird_a2dp::SessionOptions;
///
/// let options = SessionOptions::default()
///     .with_delay_report(true)
///     .with_reconfig_retry_limit(3);
/// assert_eq!(options.reconfig_retry_limit, 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SessionOptions {
    /// Content protection is supported
    pub protect: bool,
    /// Insist on the master role on the link before streaming
    pub prefer_master: bool,
    /// Offer the delay reporting service capability
    pub delay_report: bool,
    /// As acceptor, follow a peer that is already streaming with a local start
    pub acceptor_start: bool,
    /// Attempts allowed to re-establish a stream during reconfiguration
    pub reconfig_retry_limit: u8,
    /// Time a close request may stay unanswered before the link is dropped (ms)
    pub close_guard_ms: u32,
    /// Delay before remote control is requested or the role is re-checked (ms)
    pub rc_discovery_delay_ms: u32,
    /// Time the peer gets to configure a stream after connecting to us (ms)
    pub accept_signalling_ms: u32,
    /// Transport queue depth at or above which media is held back
    pub queue_check_threshold: usize,
    /// Frames kept in the pending media queue
    ///
    /// Capped by [`MAX_PENDING_FRAMES`].
    pub max_pending_frames: usize,
    /// Set the RTP marker bit on outgoing media packets
    pub rtp_marker_bit: bool,
}

impl SessionOptions {
    /// Default options
    #[must_use]
    pub const fn new() -> Self {
        Self {
            protect: false,
            prefer_master: false,
            delay_report: false,
            acceptor_start: false,
            reconfig_retry_limit: DEFAULT_RECONFIG_RETRY,
            close_guard_ms: DEFAULT_CLOSE_GUARD_MS,
            rc_discovery_delay_ms: DEFAULT_RC_DISCOVERY_DELAY_MS,
            accept_signalling_ms: DEFAULT_ACCEPT_SIGNALLING_MS,
            queue_check_threshold: DEFAULT_QUEUE_CHECK_THRESHOLD,
            max_pending_frames: MAX_PENDING_FRAMES,
            rtp_marker_bit: true,
        }
    }

    /// Enable or disable content protection
    #[must_use]
    pub const fn with_protect(mut self, enabled: bool) -> Self {
        self.protect = enabled;
        self
    }

    /// Require the master role before streaming
    #[must_use]
    pub const fn with_prefer_master(mut self, enabled: bool) -> Self {
        self.prefer_master = enabled;
        self
    }

    /// Offer delay reporting
    #[must_use]
    pub const fn with_delay_report(mut self, enabled: bool) -> Self {
        self.delay_report = enabled;
        self
    }

    /// Start locally when accepting a stream while another one is streaming
    #[must_use]
    pub const fn with_acceptor_start(mut self, enabled: bool) -> Self {
        self.acceptor_start = enabled;
        self
    }

    /// Set the reconfiguration retry bound
    #[must_use]
    pub const fn with_reconfig_retry_limit(mut self, limit: u8) -> Self {
        self.reconfig_retry_limit = limit;
        self
    }

    /// Set the close guard time
    #[must_use]
    pub const fn with_close_guard_ms(mut self, ms: u32) -> Self {
        self.close_guard_ms = ms;
        self
    }

    /// Set the remote control discovery delay
    #[must_use]
    pub const fn with_rc_discovery_delay_ms(mut self, ms: u32) -> Self {
        self.rc_discovery_delay_ms = ms;
        self
    }

    /// Set the accept signalling guard
    #[must_use]
    pub const fn with_accept_signalling_ms(mut self, ms: u32) -> Self {
        self.accept_signalling_ms = ms;
        self
    }

    /// Set the transport queue threshold
    #[must_use]
    pub const fn with_queue_check_threshold(mut self, depth: usize) -> Self {
        self.queue_check_threshold = depth;
        self
    }

    /// Set the pending media queue length
    #[must_use]
    pub const fn with_max_pending_frames(mut self, frames: usize) -> Self {
        self.max_pending_frames = frames;
        self
    }

    /// Enable or disable the RTP marker bit
    #[must_use]
    pub const fn with_rtp_marker_bit(mut self, enabled: bool) -> Self {
        self.rtp_marker_bit = enabled;
        self
    }

    /// Pending queue length actually used, between 1 and [`MAX_PENDING_FRAMES`]
    #[must_use]
    pub fn pending_frame_limit(&self) -> usize {
        self.max_pending_frames.clamp(1, MAX_PENDING_FRAMES)
    }

    /// Service capabilities offered by the local endpoints
    #[must_use]
    pub const fn local_psc(&self) -> PscMask {
        if self.delay_report {
            PscMask::TRANS.union(PscMask::DELAY_RPT)
        } else {
            PscMask::TRANS
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Requests from the application, delivered to the processor over a channel
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ApiRequest {
    /// Open a stream towards `peer`
    Open {
        /// Stream
        handle: StreamHandle,
        /// Remote device
        peer: BluetoothAddress,
        /// Bring up remote control once open
        use_rc: bool,
    },
    /// Close a stream
    Close {
        /// Stream
        handle: StreamHandle,
    },
    /// Start streaming
    Start {
        /// Stream
        handle: StreamHandle,
    },
    /// Stop or suspend streaming
    Stop {
        /// Stream
        handle: StreamHandle,
        /// Suspend instead of a local stop
        suspend: bool,
        /// Drop buffers queued in the transport
        flush: bool,
    },
    /// Change the stream configuration
    Reconfigure {
        /// Stream
        handle: StreamHandle,
        /// New configuration
        config: StreamConfig,
        /// Remote endpoint index
        sep_index: u8,
        /// Allow the suspend fast path
        suspend: bool,
    },
    /// Send a content protection request
    ProtectRequest {
        /// Stream
        handle: StreamHandle,
        /// Payload
        data: ProtectData,
    },
    /// Answer a content protection request
    ProtectResponse {
        /// Stream
        handle: StreamHandle,
        /// Result code
        error: AvdtpErrorCode,
        /// Payload
        data: ProtectData,
    },
    /// Remote control is wanted on the stream
    RemoteControlOpen {
        /// Stream
        handle: StreamHandle,
    },
    /// Hand the data path to the hardware codec
    OffloadStart {
        /// Stream
        handle: StreamHandle,
    },
    /// The encoder has media ready
    DataReady {
        /// Stream
        handle: StreamHandle,
    },
    /// Release the stream's control block
    Deregister {
        /// Stream
        handle: StreamHandle,
    },
}

impl ApiRequest {
    /// Stream the request is addressed to
    #[must_use]
    pub const fn handle(&self) -> StreamHandle {
        match self {
            Self::Open { handle, .. }
            | Self::Close { handle }
            | Self::Start { handle }
            | Self::Stop { handle, .. }
            | Self::Reconfigure { handle, .. }
            | Self::ProtectRequest { handle, .. }
            | Self::ProtectResponse { handle, .. }
            | Self::RemoteControlOpen { handle }
            | Self::OffloadStart { handle }
            | Self::DataReady { handle }
            | Self::Deregister { handle } => *handle,
        }
    }

    /// State machine event carried by the request
    ///
    /// `None` for [`ApiRequest::Deregister`], which the manager handles itself.
    #[must_use]
    pub fn into_event(self) -> Option<SsmEvent> {
        let event = match self {
            Self::Open { peer, use_rc, .. } => SsmEvent::ApiOpen { peer, use_rc },
            Self::Close { .. } => SsmEvent::ApiClose,
            Self::Start { .. } => SsmEvent::ApiStart,
            Self::Stop { suspend, flush, .. } => SsmEvent::ApiStop { suspend, flush },
            Self::Reconfigure {
                config,
                sep_index,
                suspend,
                ..
            } => SsmEvent::ApiReconfig {
                config,
                sep_index,
                suspend,
            },
            Self::ProtectRequest { data, .. } => SsmEvent::ApiProtectReq { data },
            Self::ProtectResponse { error, data, .. } => SsmEvent::ApiProtectRsp { error, data },
            Self::RemoteControlOpen { .. } => SsmEvent::ApiRcOpen,
            Self::OffloadStart { .. } => SsmEvent::ApiOffloadStart,
            Self::DataReady { .. } => SsmEvent::SrcDataReady,
            Self::Deregister { .. } => return None,
        };
        Some(event)
    }
}

/// Input from the collaborators (transport, service discovery, timers)
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Envelope {
    /// An event for one stream
    Event {
        /// Stream
        handle: StreamHandle,
        /// Event
        event: SsmEvent,
    },
    /// A stream timer fired
    Timer {
        /// Stream
        handle: StreamHandle,
        /// Timer
        id: TimerId,
    },
    /// The shared service discovery finished
    ServiceDiscovery {
        /// A matching record was found
        found: bool,
    },
}

/// Channels connecting the application and the collaborators to the processor
///
/// The raw mutex is the caller's choice: `CriticalSectionRawMutex` for a
/// `static` shared with interrupt handlers, `NoopRawMutex` on a single
/// executor.
///
/// # Examples
///
/// ```rust
/// use bondybird_a2dp::SessionChannels;
/// use embassy_sync::blocking_mutex::raw::NoopRawMutex;
///
/// let channels: SessionChannels<NoopRawMutex> = SessionChannels::new();
/// let _notifier = channels.notifier();
/// ```
pub struct SessionChannels<M: RawMutex> {
    pub(crate) requests: Channel<M, ApiRequest, MAX_QUEUED_EVENTS>,
    pub(crate) events: Channel<M, Envelope, MAX_QUEUED_EVENTS>,
    pub(crate) notifications: Channel<M, Notification, MAX_QUEUED_EVENTS>,
}

impl<M: RawMutex> SessionChannels<M> {
    /// Create empty channels
    #[must_use]
    pub const fn new() -> Self {
        Self {
            requests: Channel::new(),
            events: Channel::new(),
            notifications: Channel::new(),
        }
    }

    /// A [`Notifier`](a2dp::event::Notifier) feeding the notification channel
    #[must_use]
    pub fn notifier(&self) -> processor::ChannelNotifier<'_, M> {
        processor::ChannelNotifier::new(self.notifications.sender())
    }
}

impl<M: RawMutex> Default for SessionChannels<M> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = SessionOptions::default();
        assert_eq!(options.reconfig_retry_limit, 6);
        assert_eq!(options.close_guard_ms, 4000);
        assert_eq!(options.rc_discovery_delay_ms, 3500);
        assert_eq!(options.accept_signalling_ms, 2000);
        assert_eq!(options.queue_check_threshold, 5);
        assert!(options.rtp_marker_bit);
        assert!(!options.protect);
        assert_eq!(options.local_psc(), PscMask::TRANS);
    }

    #[test]
    fn test_option_setters() {
        let options = SessionOptions::new()
            .with_protect(true)
            .with_prefer_master(true)
            .with_acceptor_start(true)
            .with_close_guard_ms(100)
            .with_rtp_marker_bit(false);
        assert!(options.protect);
        assert!(options.prefer_master);
        assert!(options.acceptor_start);
        assert_eq!(options.close_guard_ms, 100);
        assert!(!options.rtp_marker_bit);
    }

    #[test]
    fn test_delay_report_extends_psc() {
        let options = SessionOptions::default().with_delay_report(true);
        assert!(options.local_psc().contains(PscMask::DELAY_RPT));
        assert!(options.local_psc().contains(PscMask::TRANS));
    }

    #[test]
    fn test_pending_frame_limit_is_clamped() {
        let options = SessionOptions::default();
        assert_eq!(options.with_max_pending_frames(0).pending_frame_limit(), 1);
        assert_eq!(options.with_max_pending_frames(2).pending_frame_limit(), 2);
        assert_eq!(
            options.with_max_pending_frames(100).pending_frame_limit(),
            MAX_PENDING_FRAMES
        );
    }

    #[test]
    fn test_request_into_event() {
        let peer = BluetoothAddress::new([1, 2, 3, 4, 5, 6]);
        let request = ApiRequest::Open {
            handle: 2,
            peer,
            use_rc: true,
        };
        assert_eq!(request.handle(), 2);
        assert_eq!(
            request.into_event(),
            Some(SsmEvent::ApiOpen { peer, use_rc: true })
        );

        let stop = ApiRequest::Stop {
            handle: 1,
            suspend: true,
            flush: false,
        };
        assert_eq!(
            stop.into_event(),
            Some(SsmEvent::ApiStop {
                suspend: true,
                flush: false
            })
        );
        assert_eq!(ApiRequest::Deregister { handle: 3 }.into_event(), None);
    }
}
