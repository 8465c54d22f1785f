//! Codec callout interface
//!
//! The local audio codec (encoder for a source, decoder for a sink) is
//! consulted while negotiating a configuration and driven while streaming.
//! `setcfg` is asynchronous: the callout answers with
//! [`SsmEvent::SetConfigOk`](super::SsmEvent::SetConfigOk) or
//! [`SsmEvent::SetConfigFail`](super::SsmEvent::SetConfigFail).

use super::avdtp::StreamConfig;
use super::codec::CodecInfo;
use super::data_path::MediaFrame;
use super::{AvdtpErrorCode, StreamEndpointId, StreamHandle};
use crate::BluetoothAddress;

/// PCM format and bitrate of a negotiated codec configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AudioFormat {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Bits per PCM sample
    pub bits_per_sample: u8,
    /// Number of audio channels
    pub channel_count: u8,
    /// Encoded bitrate in bits per second (0 when unknown)
    pub bitrate: u32,
}

/// Local codec operations used by the session state machine
pub trait CodecCallout {
    /// Discovery finished with `num_seps` endpoints of which `num_sinks` are usable
    fn disc_res(
        &mut self,
        handle: StreamHandle,
        num_seps: usize,
        num_sinks: usize,
        peer: BluetoothAddress,
    );

    /// Choose a configuration from the capabilities of remote endpoint `seid`
    ///
    /// # Errors
    /// Returns the AVDTP error to report when no usable configuration exists
    fn getcfg(
        &mut self,
        handle: StreamHandle,
        peer_caps: &StreamConfig,
        seid: StreamEndpointId,
    ) -> Result<StreamConfig, AvdtpErrorCode>;

    /// Validate a configuration proposed by the peer for remote endpoint `seid`
    fn setcfg(&mut self, handle: StreamHandle, config: &StreamConfig, seid: StreamEndpointId);

    /// Stream opened with media MTU `mtu`
    fn open(&mut self, handle: StreamHandle, mtu: u16);

    /// Stream closed
    fn close(&mut self, handle: StreamHandle);

    /// Start encoding/decoding with `config`
    fn start(&mut self, handle: StreamHandle, config: &StreamConfig);

    /// Stop encoding/decoding
    fn stop(&mut self, handle: StreamHandle);

    /// Pull the next encoded frame
    fn data(&mut self, handle: StreamHandle) -> Option<MediaFrame>;

    /// A frame was dropped before reaching the transport
    fn frame_dropped(&mut self, handle: StreamHandle);

    /// Sink reported its playback delay (1/10 ms)
    fn delay(&mut self, handle: StreamHandle, delay: u16);

    /// Media MTU changed after a reconfiguration
    fn update_mtu(&mut self, handle: StreamHandle, mtu: u16);

    /// Content protection (SCMS-T) is active towards `peer`
    fn cp_is_active(&mut self, peer: BluetoothAddress) -> bool;

    /// PCM format of a codec element, `None` when unknown
    fn audio_format(&mut self, codec: &CodecInfo) -> Option<AudioFormat>;
}
