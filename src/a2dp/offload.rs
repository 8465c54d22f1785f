//! Hardware codec offload
//!
//! When exactly one audio stream is started the encoded data path can be
//! handed to the controller. [`OffloadParams`] is the parameter block the
//! vendor command needs; encoding it into an HCI command is left to the
//! [`OffloadController`] implementation.
//!
//! The controller answers asynchronously with
//! [`SsmEvent::OffloadStartRsp`](super::SsmEvent::OffloadStartRsp). A
//! response arriving after the stream stopped is reported as a failure.

use super::A2dpError;
use super::avdtp::StreamConfig;
use super::callout::AudioFormat;
use super::codec::{CodecType, VendorCodec};
use crate::constants::{MAX_2MBPS_AVDTP_MTU, MAX_3MBPS_AVDTP_MTU, SBC_MAX_BITPOOL_MQ};
use bt_hci::param::ConnHandle;

/// Codec identifiers understood by the offload command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum OffloadCodec {
    /// SBC
    Sbc = 0x01,
    /// MPEG-2/4 AAC
    Aac = 0x02,
    /// aptX
    Aptx = 0x0100,
    /// aptX HD
    AptxHd = 0x0200,
    /// LDAC
    Ldac = 0x0400,
}

/// Offload start parameter block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OffloadParams {
    /// Codec
    pub codec: OffloadCodec,
    /// Sample rate in Hz (44100, 48000, 88200 or 96000)
    pub sample_rate: u32,
    /// Bits per sample (16, 24 or 32)
    pub bits_per_sample: u8,
    /// Number of channels
    pub channel_count: u8,
    /// Encoded bitrate in bits per second
    pub bitrate: u32,
    /// ACL connection handle
    pub acl_handle: ConnHandle,
    /// Remote L2CAP channel id of the media channel
    pub remote_cid: u16,
    /// Media MTU
    pub mtu: u16,
    /// SCMS-T content protection active
    pub scms_t: bool,
}

impl OffloadParams {
    /// Build the parameter block for a negotiated configuration
    ///
    /// # Errors
    /// Returns [`A2dpError::UnsupportedCodec`] for codecs or PCM formats the
    /// offload command cannot express
    pub fn from_config(
        config: &StreamConfig,
        format: &AudioFormat,
        acl_handle: ConnHandle,
        remote_cid: u16,
        stream_mtu: u16,
        scms_t: bool,
    ) -> Result<Self, A2dpError> {
        let codec_info = config.codec.as_ref().ok_or(A2dpError::UnsupportedCodec)?;
        let codec = match codec_info.codec_type {
            CodecType::Sbc => OffloadCodec::Sbc,
            CodecType::Mpeg24Aac => OffloadCodec::Aac,
            CodecType::VendorSpecific => match codec_info.vendor_codec() {
                Some(VendorCodec::Aptx) => OffloadCodec::Aptx,
                Some(VendorCodec::AptxHd) => OffloadCodec::AptxHd,
                Some(VendorCodec::Ldac) => OffloadCodec::Ldac,
                None => return Err(A2dpError::UnsupportedCodec),
            },
            _ => return Err(A2dpError::UnsupportedCodec),
        };

        if !matches!(format.sample_rate, 44_100 | 48_000 | 88_200 | 96_000) {
            return Err(A2dpError::UnsupportedCodec);
        }
        if !matches!(format.bits_per_sample, 16 | 24 | 32) {
            return Err(A2dpError::UnsupportedCodec);
        }

        let mut mtu = stream_mtu.min(MAX_3MBPS_AVDTP_MTU);
        if codec == OffloadCodec::Sbc {
            let medium_quality = codec_info
                .sbc_params()
                .is_some_and(|sbc| sbc.max_bitpool <= SBC_MAX_BITPOOL_MQ);
            if medium_quality {
                mtu = mtu.min(MAX_2MBPS_AVDTP_MTU);
            }
        }

        Ok(Self {
            codec,
            sample_rate: format.sample_rate,
            bits_per_sample: format.bits_per_sample,
            channel_count: format.channel_count,
            bitrate: format.bitrate,
            acl_handle,
            remote_cid,
            mtu,
            scms_t,
        })
    }
}

/// Vendor offload command interface
pub trait OffloadController {
    /// Send the start command, answered by `OffloadStartRsp`
    ///
    /// # Errors
    /// Returns error if the command could not be sent
    fn start(&mut self, params: &OffloadParams) -> Result<(), A2dpError>;

    /// Send the stop command; must be harmless when nothing is offloaded
    fn stop(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::a2dp::codec::{CodecInfo, SbcCapabilities};

    fn format() -> AudioFormat {
        AudioFormat {
            sample_rate: 44_100,
            bits_per_sample: 16,
            channel_count: 2,
            bitrate: 328_000,
        }
    }

    #[test]
    fn test_sbc_medium_quality_uses_2mbps_mtu() {
        let mut caps = SbcCapabilities::high_quality();
        caps.max_bitpool = 35;
        let config = StreamConfig::with_codec(CodecInfo::sbc(&caps));
        let params =
            OffloadParams::from_config(&config, &format(), ConnHandle::new(1), 0x41, 1000, false)
                .unwrap();
        assert_eq!(params.codec, OffloadCodec::Sbc);
        assert_eq!(params.mtu, 663);
    }

    #[test]
    fn test_mtu_capped_for_3mbps_links() {
        let config = StreamConfig::with_codec(CodecInfo::sbc(&SbcCapabilities::high_quality()));
        let params =
            OffloadParams::from_config(&config, &format(), ConnHandle::new(1), 0x41, 2000, true)
                .unwrap();
        assert_eq!(params.mtu, 1005);
        assert!(params.scms_t);
        assert_eq!(params.remote_cid, 0x41);
    }

    #[test]
    fn test_vendor_codec_mapping() {
        let codec = CodecInfo::vendor(VendorCodec::Ldac, &[0x3C, 0x07]).unwrap();
        let config = StreamConfig::with_codec(codec);
        let mut fmt = format();
        fmt.sample_rate = 96_000;
        fmt.bits_per_sample = 24;
        let params =
            OffloadParams::from_config(&config, &fmt, ConnHandle::new(2), 0x42, 800, false)
                .unwrap();
        assert_eq!(params.codec, OffloadCodec::Ldac);
        assert_eq!(params.mtu, 800);
    }

    #[test]
    fn test_rejects_unsupported_formats() {
        let config = StreamConfig::with_codec(CodecInfo::sbc(&SbcCapabilities::high_quality()));
        let mut fmt = format();
        fmt.sample_rate = 32_000;
        assert_eq!(
            OffloadParams::from_config(&config, &fmt, ConnHandle::new(1), 0x41, 600, false),
            Err(A2dpError::UnsupportedCodec)
        );
        assert_eq!(
            OffloadParams::from_config(
                &StreamConfig::default(),
                &format(),
                ConnHandle::new(1),
                0x41,
                600,
                false
            ),
            Err(A2dpError::UnsupportedCodec)
        );
    }
}
