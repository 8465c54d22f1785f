//! Stream Control Block
//!
//! One [`StreamControlBlock`] per local stream endpoint. The coarse phase is
//! [`StreamState`]; everything orthogonal to it lives in small flag sets:
//!
//! - [`RoleFlags`]: who initiated what (acceptor, local start, suspend-for-optimization)
//! - [`WaitMask`]: gates a START or OPEN is blocked on (role switch, acceptor capability round-trip)
//! - [`CollisionMask`]: incoming-connection collision guard
//!
//! Gates never stand in for states; the state table lists which actions
//! consult them.

use super::avdtp::{DiscoveredEndpoints, MediaType, StreamConfig};
use super::data_path::MediaFrame;
use super::ssm::StreamState;
use super::{AvStatus, Role, StreamHandle};
use crate::BluetoothAddress;
use crate::constants::MAX_PENDING_FRAMES;
use heapless::Deque;

macro_rules! flag_set {
    ($(#[$meta:meta])* $name:ident { $($(#[$fmeta:meta])* $flag:ident = $value:expr,)* }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        pub struct $name(pub u8);

        impl $name {
            $($(#[$fmeta])* pub const $flag: Self = Self($value);)*

            /// No flag set
            pub const NONE: Self = Self(0);

            /// Check if every bit of `other` is set
            #[must_use]
            pub const fn contains(self, other: Self) -> bool {
                (self.0 & other.0) == other.0
            }

            /// Check if any bit of `other` is set
            #[must_use]
            pub const fn intersects(self, other: Self) -> bool {
                (self.0 & other.0) != 0
            }

            /// True when no flag is set
            #[must_use]
            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }

            /// Set the bits of `other`
            pub fn insert(&mut self, other: Self) {
                self.0 |= other.0;
            }

            /// Clear the bits of `other`
            pub fn remove(&mut self, other: Self) {
                self.0 &= !other.0;
            }

            /// Union of both sets
            #[must_use]
            pub const fn union(self, other: Self) -> Self {
                Self(self.0 | other.0)
            }
        }
    };
}

flag_set! {
    /// Initiator/acceptor side-channel of a stream
    RoleFlags {
        /// Peer configured the stream (we are the acceptor)
        ACCEPTOR = 0x01,
        /// Start was requested locally and is in flight
        START_INT = 0x10,
        /// Stream was started only to be suspended right away
        SUSPEND = 0x20,
        /// Acceptor-side stream should be suspended after the peer starts it
        SUSPEND_OPT = 0x40,
    }
}

flag_set! {
    /// Conditions a START or OPEN is waiting on
    WaitMask {
        /// Acceptor capability round-trip in progress
        ACP_CAPS_ON = 0x01,
        /// Start requested during the acceptor capability round-trip
        ACP_CAPS_STARTED = 0x02,
        /// Open parked on a role switch
        ROLE_SW_RES_OPEN = 0x04,
        /// Start parked on a role switch
        ROLE_SW_RES_START = 0x08,
        /// Stream started while a role switch was pending
        ROLE_SW_STARTED = 0x10,
        /// Role switch is being retried after the timer
        ROLE_SW_RETRY = 0x20,
        /// Remote control check deferred until the role switch resolves
        CHECK_RC = 0x40,
        /// Role switch failed while a start was pending
        ROLE_SW_FAILED = 0x80,
    }
}

impl WaitMask {
    /// Every role-switch related bit
    pub const ROLE_SW_BITS: Self = Self(0x04 | 0x08 | 0x10 | 0x20 | 0x80);
}

flag_set! {
    /// Incoming-connection collision guard
    CollisionMask {
        /// Accept-signalling guard timer is running
        INC_TIMER = 0x01,
        /// An API open arrived while the guard was running
        API_CALLED = 0x02,
    }
}

/// Operation parked until a role switch resolves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum QueueTag {
    /// An open request
    Open,
    /// A start request
    Start,
}

/// An open request remembered for later replay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OpenRequest {
    /// Remote device
    pub peer: BluetoothAddress,
    /// Bring up remote control once open
    pub use_rc: bool,
}

/// Per-stream control block
#[derive(Debug)]
pub struct StreamControlBlock {
    pub(crate) handle: StreamHandle,
    pub(crate) local_role: Role,
    pub(crate) media_type: MediaType,
    pub(crate) state: StreamState,
    pub(crate) peer: BluetoothAddress,
    /// Negotiated configuration, mutated only by negotiation and reconfiguration
    pub(crate) config: StreamConfig,
    /// Peer capabilities of the endpoint under the discovery cursor
    pub(crate) peer_caps: StreamConfig,
    pub(crate) seps: DiscoveredEndpoints,
    pub(crate) num_disc_sinks: usize,
    pub(crate) rcfg_index: usize,
    pub(crate) role: RoleFlags,
    pub(crate) wait: WaitMask,
    pub(crate) coll: CollisionMask,
    pub(crate) queued: Option<QueueTag>,
    pub(crate) open_api: Option<OpenRequest>,
    pub(crate) queued_open: Option<OpenRequest>,
    pub(crate) num_recfg: u8,
    pub(crate) reconfig_supported: bool,
    pub(crate) suspend_supported: bool,
    pub(crate) started: bool,
    pub(crate) codec_started: bool,
    pub(crate) offload_active: bool,
    pub(crate) offload_pending: bool,
    pub(crate) congested: bool,
    pub(crate) use_rc: bool,
    /// Restart streaming once a reconfiguration completes
    pub(crate) rcfg_restart: bool,
    pub(crate) open_status: AvStatus,
    pub(crate) stream_mtu: u16,
    pub(crate) media_queue: Deque<MediaFrame, MAX_PENDING_FRAMES>,
    pub(crate) deregistering: bool,
}

impl StreamControlBlock {
    /// Create an idle control block for a local endpoint
    #[must_use]
    pub fn new(handle: StreamHandle, local_role: Role, media_type: MediaType) -> Self {
        Self {
            handle,
            local_role,
            media_type,
            state: StreamState::Init,
            peer: BluetoothAddress::EMPTY,
            config: StreamConfig::default(),
            peer_caps: StreamConfig::default(),
            seps: DiscoveredEndpoints::new(),
            num_disc_sinks: 0,
            rcfg_index: 0,
            role: RoleFlags::NONE,
            wait: WaitMask::NONE,
            coll: CollisionMask::NONE,
            queued: None,
            open_api: None,
            queued_open: None,
            num_recfg: 0,
            reconfig_supported: true,
            suspend_supported: true,
            started: false,
            codec_started: false,
            offload_active: false,
            offload_pending: false,
            congested: false,
            use_rc: false,
            rcfg_restart: false,
            open_status: AvStatus::Success,
            stream_mtu: 0,
            media_queue: Deque::new(),
            deregistering: false,
        }
    }

    /// Stream handle
    #[must_use]
    pub const fn handle(&self) -> StreamHandle {
        self.handle
    }

    /// Current session state
    #[must_use]
    pub const fn state(&self) -> StreamState {
        self.state
    }

    /// Remote device
    #[must_use]
    pub const fn peer(&self) -> BluetoothAddress {
        self.peer
    }

    /// Direction of the local endpoint
    #[must_use]
    pub const fn local_role(&self) -> Role {
        self.local_role
    }

    /// Media type of the local endpoint
    #[must_use]
    pub const fn media_type(&self) -> MediaType {
        self.media_type
    }

    /// Negotiated configuration
    #[must_use]
    pub const fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Discovery results and cursor
    #[must_use]
    pub const fn endpoints(&self) -> &DiscoveredEndpoints {
        &self.seps
    }

    /// Role side-channel
    #[must_use]
    pub const fn role_flags(&self) -> RoleFlags {
        self.role
    }

    /// Wait gates
    #[must_use]
    pub const fn wait_mask(&self) -> WaitMask {
        self.wait
    }

    /// Consecutive reconfiguration attempts
    #[must_use]
    pub const fn reconfig_attempts(&self) -> u8 {
        self.num_recfg
    }

    /// Peer accepted reconfigure commands so far
    #[must_use]
    pub const fn reconfig_supported(&self) -> bool {
        self.reconfig_supported
    }

    /// Peer accepted suspend commands so far
    #[must_use]
    pub const fn suspend_supported(&self) -> bool {
        self.suspend_supported
    }

    /// Stream is started in software
    #[must_use]
    pub const fn is_started(&self) -> bool {
        self.started
    }

    /// Data path is handed to the hardware codec
    #[must_use]
    pub const fn is_offload_active(&self) -> bool {
        self.offload_active
    }

    /// Transport outbound queue is considered full
    #[must_use]
    pub const fn is_congested(&self) -> bool {
        self.congested
    }

    /// Media MTU (peer MTU minus the media header)
    #[must_use]
    pub const fn stream_mtu(&self) -> u16 {
        self.stream_mtu
    }

    /// Frames waiting for the transport
    #[must_use]
    pub fn pending_frames(&self) -> usize {
        self.media_queue.len()
    }

    /// True for an open audio stream
    #[must_use]
    pub fn is_open_audio(&self) -> bool {
        self.media_type == MediaType::Audio && self.state == StreamState::Open
    }

    /// Record the peer; a different peer invalidates cached capability flags
    pub(crate) fn save_peer(&mut self, peer: BluetoothAddress) {
        if self.peer != peer {
            debug!(
                "[SSM] stream {} new peer, reset reconfig/suspend support",
                self.handle
            );
            self.reconfig_supported = true;
            self.suspend_supported = true;
        }
        self.peer = peer;
    }

    /// Queue a frame, dropping the oldest when the queue holds `limit` frames
    ///
    /// Returns true when a frame was dropped.
    pub(crate) fn enqueue_frame(&mut self, frame: MediaFrame, limit: usize) -> bool {
        let limit = limit.clamp(1, MAX_PENDING_FRAMES);
        let mut dropped = false;
        while self.media_queue.len() >= limit {
            self.media_queue.pop_front();
            dropped = true;
        }
        self.media_queue.push_back(frame).ok();
        dropped
    }
}
