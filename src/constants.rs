//! `BondyBird` A2DP Constants
//!
//! Capacities, protocol values and default timings used by the stream
//! session state machine. Runtime-tunable values have a matching field in
//! [`SessionOptions`](crate::SessionOptions); the constants here are their
//! defaults or hard upper bounds.

/// Maximum number of registered stream control blocks (power of two)
pub const MAX_STREAMS: usize = 4;

/// Maximum number of remote stream endpoints kept from one discovery
pub const MAX_SEPS: usize = 8;

/// Maximum length of one encoded media frame in bytes
pub const MAX_MEDIA_FRAME_LEN: usize = 1024;

/// Capacity of the pending media queue per stream
pub const MAX_PENDING_FRAMES: usize = 3;

/// Depth of the request and event channels
pub const MAX_QUEUED_EVENTS: usize = 16;

/// Maximum number of events an action routine may raise while handling one event
pub const MAX_RAISED_EVENTS: usize = 4;

/// Maximum number of raised events processed for one external event
pub const MAX_EVENT_CHAIN: usize = 32;

/// Maximum length of content protection payloads
pub const MAX_PROTECT_LEN: usize = 16;

/// Maximum length of codec information elements
pub const MAX_CODEC_INFO_LEN: usize = 16;

/// Size of the AVDTP media packet header subtracted from the peer MTU
pub const AVDT_MEDIA_HDR_SIZE: u16 = 12;

/// Default number of reconfiguration retries before giving up
pub const DEFAULT_RECONFIG_RETRY: u8 = 6;

/// Guard time for an outstanding close request, in milliseconds
pub const DEFAULT_CLOSE_GUARD_MS: u32 = 4000;

/// Delay before remote control discovery / role re-check, in milliseconds
pub const DEFAULT_RC_DISCOVERY_DELAY_MS: u32 = 3500;

/// Time the peer gets to start signalling on an incoming connection, in milliseconds
pub const DEFAULT_ACCEPT_SIGNALLING_MS: u32 = 2000;

/// Transport queue depth at or above which media is held back
pub const DEFAULT_QUEUE_CHECK_THRESHOLD: usize = 5;

/// Largest media MTU on a 2 Mbps EDR link (2-DH5 minus AVDTP and L2CAP headers)
pub const MAX_2MBPS_AVDTP_MTU: u16 = 663;

/// Largest media MTU on a 3 Mbps EDR link (3-DH5 minus AVDTP and L2CAP headers)
pub const MAX_3MBPS_AVDTP_MTU: u16 = 1005;

/// SBC max bitpool at or below which the stream fits a 2 Mbps link
pub const SBC_MAX_BITPOOL_MQ: u8 = 35;

/// `BD_ADDR` length in bytes
pub const BD_ADDR_LENGTH: usize = 6;
