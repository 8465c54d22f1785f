//! AVDTP transport adapter interface
//!
//! The state machine issues signalling primitives through [`StreamTransport`]
//! and never waits for them: every primitive is answered later by a
//! confirmation or indication posted back as an [`SsmEvent`](super::SsmEvent).
//! A primitive that cannot even be issued returns `Err` and the caller turns
//! it into the matching failure event.

use super::avdtp::StreamConfig;
use super::{A2dpError, AvdtpErrorCode, StreamEndpointId, StreamHandle};
use crate::BluetoothAddress;
use bt_hci::param::ConnHandle;

/// Signalling, service discovery and media channel primitives
pub trait StreamTransport {
    /// Connect the signalling channel, answered by `AvdtConnect`/`AvdtDisconnect`
    ///
    /// # Errors
    /// Returns error if the request could not be issued
    fn connect(&mut self, peer: BluetoothAddress) -> Result<(), A2dpError>;

    /// Disconnect the signalling channel, answered by `AvdtDisconnect`
    ///
    /// # Errors
    /// Returns error if the request could not be issued
    fn disconnect(&mut self, peer: BluetoothAddress) -> Result<(), A2dpError>;

    /// Look up the A2DP service record, answered by `SdpDiscOk`/`SdpDiscFail`
    ///
    /// # Errors
    /// Returns error if the lookup could not be started
    fn find_service(&mut self, peer: BluetoothAddress) -> Result<(), A2dpError>;

    /// Discover remote stream endpoints, answered by `StrDiscOk`/`StrDiscFail`
    ///
    /// # Errors
    /// Returns error if the request could not be issued
    fn discover(&mut self, peer: BluetoothAddress) -> Result<(), A2dpError>;

    /// Fetch capabilities of one remote endpoint, answered by `StrGetcapOk`/`StrGetcapFail`
    ///
    /// # Errors
    /// Returns error if the request could not be issued
    fn get_capabilities(
        &mut self,
        peer: BluetoothAddress,
        seid: StreamEndpointId,
    ) -> Result<(), A2dpError>;

    /// Configure and open a stream, answered by `StrOpenOk`/`StrOpenFail`
    ///
    /// # Errors
    /// Returns error if the request could not be issued
    fn open(
        &mut self,
        handle: StreamHandle,
        peer: BluetoothAddress,
        seid: StreamEndpointId,
        config: &StreamConfig,
    ) -> Result<(), A2dpError>;

    /// Answer a peer's set-configuration command
    fn config_response(&mut self, handle: StreamHandle, error: AvdtpErrorCode);

    /// Start streams, answered by `StrStartOk`/`StrStartFail`
    ///
    /// # Errors
    /// Returns error if the request could not be issued
    fn start(&mut self, handles: &[StreamHandle]) -> Result<(), A2dpError>;

    /// Suspend streams, answered by `StrSuspendCfm`
    ///
    /// # Errors
    /// Returns error if the request could not be issued
    fn suspend(&mut self, handles: &[StreamHandle]) -> Result<(), A2dpError>;

    /// Close a stream, answered by `StrClose`
    ///
    /// # Errors
    /// Returns error if the request could not be issued
    fn close(&mut self, handle: StreamHandle) -> Result<(), A2dpError>;

    /// Reconfigure an open stream, answered by `StrReconfigCfm`
    ///
    /// # Errors
    /// Returns error if the request could not be issued
    fn reconfigure(&mut self, handle: StreamHandle, config: &StreamConfig)
    -> Result<(), A2dpError>;

    /// Send a content protection request, answered by `StrSecurityCfm`
    fn security_request(&mut self, handle: StreamHandle, data: &[u8]);

    /// Answer a content protection request from the peer
    fn security_response(&mut self, handle: StreamHandle, error: AvdtpErrorCode, data: &[u8]);

    /// Write one media fragment, answered by `StrWriteCfm`
    ///
    /// # Errors
    /// Returns error if the fragment was not accepted
    fn write(
        &mut self,
        handle: StreamHandle,
        fragment: &[u8],
        timestamp: u32,
        marker: bool,
    ) -> Result<(), A2dpError>;

    /// Buffers currently queued on the media channel
    fn queued_buffers(&mut self, handle: StreamHandle) -> usize;

    /// Drop buffers queued on the media channel
    fn flush(&mut self, handle: StreamHandle);

    /// Remote L2CAP channel id of the media channel
    fn remote_cid(&mut self, handle: StreamHandle) -> u16;

    /// ACL connection handle towards `peer`
    fn acl_handle(&mut self, peer: BluetoothAddress) -> ConnHandle;
}
