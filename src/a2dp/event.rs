//! Session events and upper-layer notifications
//!
//! [`SsmEvent`] is the tagged input of the state machine; [`EventKind`] is
//! its payload-free mirror used as the column index of the state table.
//! Results flow back to the application as [`Notification`]s through a
//! [`Notifier`], with success and failure disambiguated by [`AvStatus`].

use super::avdtp::{SepInfo, StreamConfig};
use super::codec::CodecInfo;
use super::{AvStatus, AvdtpErrorCode, StreamEndpointId, StreamHandle};
use crate::BluetoothAddress;
use crate::constants::{MAX_PROTECT_LEN, MAX_SEPS};
use heapless::Vec;

/// Content protection payload
pub type ProtectData = Vec<u8, MAX_PROTECT_LEN>;

/// Input event of the stream session state machine
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SsmEvent {
    /// Open a stream to `peer`
    ApiOpen {
        /// Remote device
        peer: BluetoothAddress,
        /// Bring up remote control once the stream is open
        use_rc: bool,
    },
    /// Close the stream
    ApiClose,
    /// Start streaming
    ApiStart,
    /// Stop streaming, optionally by suspending the stream
    ApiStop {
        /// Suspend instead of a plain local stop
        suspend: bool,
        /// Drop buffers already queued in the transport
        flush: bool,
    },
    /// Change the stream configuration
    ApiReconfig {
        /// Requested configuration
        config: StreamConfig,
        /// Index of the remote endpoint to use
        sep_index: u8,
        /// Caller allows the suspend/reconfigure fast path
        suspend: bool,
    },
    /// Send a content protection request to the peer
    ApiProtectReq {
        /// Payload
        data: ProtectData,
    },
    /// Answer a content protection request from the peer
    ApiProtectRsp {
        /// Result code
        error: AvdtpErrorCode,
        /// Payload
        data: ProtectData,
    },
    /// Remote control is wanted on this stream
    ApiRcOpen,
    /// The encoder has media ready
    SrcDataReady,
    /// Hand the data path to the hardware codec
    ApiOffloadStart,
    /// Hardware codec answered an offload start
    OffloadStartRsp {
        /// Hardware result
        status: AvStatus,
    },
    /// Codec callout accepted an incoming configuration
    SetConfigOk {
        /// Further remote endpoints worth probing
        extra_seids: Vec<StreamEndpointId, MAX_SEPS>,
        /// Stream should be reconfigured once started
        reconfig_needed: bool,
    },
    /// Codec callout rejected an incoming configuration
    SetConfigFail {
        /// Error returned to the peer
        error: AvdtpErrorCode,
    },
    /// Service record found
    SdpDiscOk,
    /// Service record lookup failed
    SdpDiscFail,
    /// The service discovery slot was handed to this stream
    DiscoveryGranted,
    /// Remote endpoints discovered
    StrDiscOk {
        /// Endpoints in discovery order
        seps: Vec<SepInfo, MAX_SEPS>,
    },
    /// Endpoint discovery failed
    StrDiscFail {
        /// Cause
        error: AvdtpErrorCode,
    },
    /// Capabilities of the endpoint under the cursor
    StrGetcapOk {
        /// Peer capabilities
        caps: StreamConfig,
    },
    /// Capability negotiation failed
    StrGetcapFail {
        /// Cause
        error: AvdtpErrorCode,
    },
    /// Stream opened (confirm or indication)
    StrOpenOk {
        /// Peer media MTU; `None` when re-entered after a reconfiguration
        peer_mtu: Option<u16>,
    },
    /// Stream open failed
    StrOpenFail {
        /// Cause
        error: AvdtpErrorCode,
    },
    /// Stream started (confirm or indication)
    StrStartOk,
    /// Stream start failed
    StrStartFail {
        /// Cause
        error: AvdtpErrorCode,
    },
    /// Stream closed (confirm or indication)
    StrClose,
    /// Peer configures one of our endpoints
    StrConfigInd {
        /// Remote device
        peer: BluetoothAddress,
        /// Initiator's endpoint id
        seid: StreamEndpointId,
        /// Proposed configuration
        config: StreamConfig,
    },
    /// Peer sent a content protection request
    StrSecurityInd {
        /// Payload
        data: ProtectData,
    },
    /// Peer answered our content protection request
    StrSecurityCfm {
        /// Result code
        error: AvdtpErrorCode,
        /// Payload
        data: ProtectData,
    },
    /// A media write completed
    StrWriteCfm,
    /// Stream suspended (confirm or indication)
    StrSuspendCfm {
        /// Result code
        error: AvdtpErrorCode,
        /// Suspend was requested locally
        initiator: bool,
    },
    /// Peer answered a reconfigure command
    StrReconfigCfm {
        /// Result code
        error: AvdtpErrorCode,
        /// Codec element in effect after the reconfiguration
        codec: Option<CodecInfo>,
    },
    /// Remote control / role re-check timer expired
    AvrcTimer,
    /// Signalling channel connected
    AvdtConnect,
    /// Signalling channel disconnected
    AvdtDisconnect,
    /// Link role switch completed
    RoleChange {
        /// HCI status of the switch (0 on success)
        hci_status: u8,
    },
    /// Sink reported its playback delay (1/10 ms)
    DelayReport {
        /// Delay value
        delay: u16,
    },
    /// Peer connected signalling to us
    AcpConnect {
        /// Remote device
        peer: BluetoothAddress,
    },
    /// Peer did not start signalling within the accept guard
    CollisionTimeout,
}

/// Payload-free event identifier, the column index of the state table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(missing_docs)]
pub enum EventKind {
    ApiOpen,
    ApiClose,
    ApiStart,
    ApiStop,
    ApiReconfig,
    ApiProtectReq,
    ApiProtectRsp,
    ApiRcOpen,
    SrcDataReady,
    ApiOffloadStart,
    OffloadStartRsp,
    SetConfigOk,
    SetConfigFail,
    SdpDiscOk,
    SdpDiscFail,
    DiscoveryGranted,
    StrDiscOk,
    StrDiscFail,
    StrGetcapOk,
    StrGetcapFail,
    StrOpenOk,
    StrOpenFail,
    StrStartOk,
    StrStartFail,
    StrClose,
    StrConfigInd,
    StrSecurityInd,
    StrSecurityCfm,
    StrWriteCfm,
    StrSuspendCfm,
    StrReconfigCfm,
    AvrcTimer,
    AvdtConnect,
    AvdtDisconnect,
    RoleChange,
    DelayReport,
    AcpConnect,
    CollisionTimeout,
}

impl EventKind {
    /// Every event kind, in declaration order
    pub const ALL: [Self; 38] = [
        Self::ApiOpen,
        Self::ApiClose,
        Self::ApiStart,
        Self::ApiStop,
        Self::ApiReconfig,
        Self::ApiProtectReq,
        Self::ApiProtectRsp,
        Self::ApiRcOpen,
        Self::SrcDataReady,
        Self::ApiOffloadStart,
        Self::OffloadStartRsp,
        Self::SetConfigOk,
        Self::SetConfigFail,
        Self::SdpDiscOk,
        Self::SdpDiscFail,
        Self::DiscoveryGranted,
        Self::StrDiscOk,
        Self::StrDiscFail,
        Self::StrGetcapOk,
        Self::StrGetcapFail,
        Self::StrOpenOk,
        Self::StrOpenFail,
        Self::StrStartOk,
        Self::StrStartFail,
        Self::StrClose,
        Self::StrConfigInd,
        Self::StrSecurityInd,
        Self::StrSecurityCfm,
        Self::StrWriteCfm,
        Self::StrSuspendCfm,
        Self::StrReconfigCfm,
        Self::AvrcTimer,
        Self::AvdtConnect,
        Self::AvdtDisconnect,
        Self::RoleChange,
        Self::DelayReport,
        Self::AcpConnect,
        Self::CollisionTimeout,
    ];
}

impl SsmEvent {
    /// Table column of this event
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::ApiOpen { .. } => EventKind::ApiOpen,
            Self::ApiClose => EventKind::ApiClose,
            Self::ApiStart => EventKind::ApiStart,
            Self::ApiStop { .. } => EventKind::ApiStop,
            Self::ApiReconfig { .. } => EventKind::ApiReconfig,
            Self::ApiProtectReq { .. } => EventKind::ApiProtectReq,
            Self::ApiProtectRsp { .. } => EventKind::ApiProtectRsp,
            Self::ApiRcOpen => EventKind::ApiRcOpen,
            Self::SrcDataReady => EventKind::SrcDataReady,
            Self::ApiOffloadStart => EventKind::ApiOffloadStart,
            Self::OffloadStartRsp { .. } => EventKind::OffloadStartRsp,
            Self::SetConfigOk { .. } => EventKind::SetConfigOk,
            Self::SetConfigFail { .. } => EventKind::SetConfigFail,
            Self::SdpDiscOk => EventKind::SdpDiscOk,
            Self::SdpDiscFail => EventKind::SdpDiscFail,
            Self::DiscoveryGranted => EventKind::DiscoveryGranted,
            Self::StrDiscOk { .. } => EventKind::StrDiscOk,
            Self::StrDiscFail { .. } => EventKind::StrDiscFail,
            Self::StrGetcapOk { .. } => EventKind::StrGetcapOk,
            Self::StrGetcapFail { .. } => EventKind::StrGetcapFail,
            Self::StrOpenOk { .. } => EventKind::StrOpenOk,
            Self::StrOpenFail { .. } => EventKind::StrOpenFail,
            Self::StrStartOk => EventKind::StrStartOk,
            Self::StrStartFail { .. } => EventKind::StrStartFail,
            Self::StrClose => EventKind::StrClose,
            Self::StrConfigInd { .. } => EventKind::StrConfigInd,
            Self::StrSecurityInd { .. } => EventKind::StrSecurityInd,
            Self::StrSecurityCfm { .. } => EventKind::StrSecurityCfm,
            Self::StrWriteCfm => EventKind::StrWriteCfm,
            Self::StrSuspendCfm { .. } => EventKind::StrSuspendCfm,
            Self::StrReconfigCfm { .. } => EventKind::StrReconfigCfm,
            Self::AvrcTimer => EventKind::AvrcTimer,
            Self::AvdtConnect => EventKind::AvdtConnect,
            Self::AvdtDisconnect => EventKind::AvdtDisconnect,
            Self::RoleChange { .. } => EventKind::RoleChange,
            Self::DelayReport { .. } => EventKind::DelayReport,
            Self::AcpConnect { .. } => EventKind::AcpConnect,
            Self::CollisionTimeout => EventKind::CollisionTimeout,
        }
    }

    /// Error code carried by a failure event, [`AvdtpErrorCode::SUCCESS`] otherwise
    #[must_use]
    pub fn error_code(&self) -> AvdtpErrorCode {
        match self {
            Self::SetConfigFail { error }
            | Self::StrDiscFail { error }
            | Self::StrGetcapFail { error }
            | Self::StrOpenFail { error }
            | Self::StrStartFail { error }
            | Self::StrSuspendCfm { error, .. }
            | Self::StrReconfigCfm { error, .. }
            | Self::StrSecurityCfm { error, .. }
            | Self::ApiProtectRsp { error, .. } => *error,
            _ => AvdtpErrorCode::SUCCESS,
        }
    }
}

/// One-way notification to the application
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Notification {
    /// Stream open finished (successfully or not)
    Opened {
        /// Stream
        handle: StreamHandle,
        /// Remote device
        peer: BluetoothAddress,
        /// Result
        status: AvStatus,
        /// A start follows because another stream is already streaming
        starting: bool,
    },
    /// Stream start finished
    Started {
        /// Stream
        handle: StreamHandle,
        /// Result
        status: AvStatus,
        /// Start was requested locally
        initiator: bool,
        /// The stream is about to be suspended again
        suspending: bool,
    },
    /// Stream suspended
    Suspended {
        /// Stream
        handle: StreamHandle,
        /// Result
        status: AvStatus,
        /// Suspend was requested locally
        initiator: bool,
    },
    /// Stream stopped locally without suspending
    Stopped {
        /// Stream
        handle: StreamHandle,
        /// Result
        status: AvStatus,
    },
    /// Stream closed
    Closed {
        /// Stream
        handle: StreamHandle,
    },
    /// Reconfiguration finished
    Reconfigured {
        /// Stream
        handle: StreamHandle,
        /// Result
        status: AvStatus,
    },
    /// Offload start finished
    OffloadStarted {
        /// Stream
        handle: StreamHandle,
        /// Result
        status: AvStatus,
    },
    /// An incoming configuration was rejected
    Rejected {
        /// Stream
        handle: StreamHandle,
        /// Remote device
        peer: BluetoothAddress,
    },
    /// Peer sent a content protection request
    ProtectRequest {
        /// Stream
        handle: StreamHandle,
        /// Payload
        data: ProtectData,
    },
    /// Peer answered a content protection request
    ProtectResponse {
        /// Stream
        handle: StreamHandle,
        /// Result code
        error: AvdtpErrorCode,
        /// Payload
        data: ProtectData,
    },
    /// Remote control should be brought up towards `peer`
    RemoteControlRequested {
        /// Stream
        handle: StreamHandle,
        /// Remote device
        peer: BluetoothAddress,
    },
    /// A deregistered stream released its control block
    Deregistered {
        /// Stream
        handle: StreamHandle,
    },
}

/// Sink for upper-layer notifications
pub trait Notifier {
    /// Deliver one notification; must not block
    fn notify(&mut self, notification: Notification);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_mirrors_event() {
        assert_eq!(SsmEvent::ApiClose.kind(), EventKind::ApiClose);
        assert_eq!(
            SsmEvent::StrOpenOk { peer_mtu: Some(895) }.kind(),
            EventKind::StrOpenOk
        );
        assert_eq!(
            SsmEvent::RoleChange { hci_status: 0 }.kind(),
            EventKind::RoleChange
        );
    }

    #[test]
    fn test_event_kind_all_is_unique() {
        for (i, a) in EventKind::ALL.iter().enumerate() {
            for b in &EventKind::ALL[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_error_code_extraction() {
        let event = SsmEvent::StrSuspendCfm {
            error: AvdtpErrorCode::BAD_STATE,
            initiator: true,
        };
        assert_eq!(event.error_code(), AvdtpErrorCode::BAD_STATE);
        assert_eq!(SsmEvent::StrStartOk.error_code(), AvdtpErrorCode::SUCCESS);
    }
}
