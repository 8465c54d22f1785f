//! A2DP Stream Session State Machine
//!
//! This module drives one audio stream endpoint per [`StreamControlBlock`]
//! through discovery, capability negotiation, open, start, suspend,
//! reconfiguration and close. AVDTP signalling, SDP, L2CAP, the codec and
//! the vendor offload command live behind narrow collaborator traits; the
//! state machine only decides which primitive to issue next.
//!
//! ## Architecture
//!
//! - **State table** ([`ssm`]): `(state, event) -> actions + next state`
//! - **Action routines** (`actions`): one named routine per table entry
//! - **Control block** ([`scb`]): negotiated configuration and side-channel gates
//! - **Data path** ([`data_path`]): congestion-aware RTP fragmentation
//! - **Offload** ([`offload`]): hardware codec parameter block
//! - **Stream manager** ([`manager`]): owns every control block and routes events
//!
//! ## Usage
//!
//! ```rust
//! use bondybird_a2dp::SessionOptions;
//! use bondybird_a2dp::a2dp::{MediaType, Role, StreamManager, StreamState};
//!
//! let mut manager = StreamManager::new(SessionOptions::default());
//! let handle = manager.register(Role::Source, MediaType::Audio).unwrap();
//! assert_eq!(manager.state(handle), Some(StreamState::Init));
//! ```

pub(crate) mod actions;
pub mod arbiter;
pub mod avdtp;
pub mod callout;
pub mod codec;
pub mod data_path;
pub mod event;
pub mod link;
pub mod manager;
pub mod offload;
pub mod scb;
pub mod ssm;
pub mod timer;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use arbiter::{Acquire, DiscoveryArbiter};
pub use avdtp::*;
pub use callout::{AudioFormat, CodecCallout};
pub use codec::*;
pub use data_path::MediaFrame;
pub use event::{EventKind, Notification, Notifier, SsmEvent};
pub use link::LinkRoleCoordinator;
pub use manager::{Collaborators, StreamManager};
pub use offload::{OffloadCodec, OffloadController, OffloadParams};
pub use scb::{CollisionMask, QueueTag, RoleFlags, StreamControlBlock, WaitMask};
pub use ssm::{Action, Dispatch, StreamState, Transition, dispatch};
pub use timer::{TimerId, TimerService};
pub use transport::StreamTransport;

/// Stream Endpoint Identifier (SEID) type
pub type StreamEndpointId = u8;

/// Handle of a registered stream control block
pub type StreamHandle = u8;

/// Stream endpoint direction (AVDTP TSEP)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Role {
    /// Audio source (sends audio)
    Source,
    /// Audio sink (receives audio)
    Sink,
}

impl Role {
    /// The direction a remote endpoint must have to pair with a local one
    #[must_use]
    pub const fn peer(self) -> Self {
        match self {
            Self::Source => Self::Sink,
            Self::Sink => Self::Source,
        }
    }
}

/// Status carried in upper-layer notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum AvStatus {
    /// Operation succeeded
    Success = 0,
    /// Generic failure
    Fail = 1,
    /// Service discovery failed
    FailSdp = 2,
    /// Stream connection failed
    FailStream = 3,
    /// No resources (voice call active, start already pending)
    FailResources = 4,
    /// Link role switch failed
    FailRole = 5,
    /// No matching stream endpoint or codec
    FailGetCap = 6,
}

impl AvStatus {
    /// True for [`AvStatus::Success`]
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

/// AVDTP signalling error code reported by the peer or the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AvdtpErrorCode(pub u8);

impl AvdtpErrorCode {
    /// No error
    pub const SUCCESS: Self = Self(0x00);
    /// Signalling channel could not be connected
    pub const CONNECT: Self = Self(0x07);
    /// Peer did not answer in time
    pub const TIMEOUT: Self = Self(0x08);
    /// Service category not supported
    pub const NSC: Self = Self(0x19);
    /// Configuration not supported
    pub const UNSUP_CFG: Self = Self(0x29);
    /// Command not valid in the current stream state
    pub const BAD_STATE: Self = Self(0x31);

    /// True when no error is set
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 == 0
    }
}

/// A2DP Errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum A2dpError {
    /// Unknown or deregistered stream handle
    InvalidHandle,
    /// Invalid stream endpoint
    InvalidEndpoint,
    /// Codec not supported
    UnsupportedCodec,
    /// Stream configuration failed
    ConfigurationFailed,
    /// Stream not ready for operation
    StreamNotReady,
    /// No free stream control block
    TooManyStreams,
    /// Bounded queue is full
    QueueFull,
    /// Transport primitive could not be issued
    Transport,
    /// Resource already in use
    Busy,
}
