//! Audio Codec Information for A2DP
//!
//! Codec information elements as carried in AVDTP configuration: the
//! mandatory SBC element is decoded field by field, vendor codecs are
//! identified by vendor and codec id so the offload path can name them.

use super::A2dpError;
use super::avdtp::MediaType;
use crate::constants::MAX_CODEC_INFO_LEN;
use heapless::Vec;

/// Audio codec types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum CodecType {
    /// SBC (Sub-Band Coding) - Mandatory codec for A2DP
    Sbc = 0x00,
    /// MPEG-1,2 Audio (MP3)
    Mpeg12Audio = 0x01,
    /// MPEG-2,4 AAC
    Mpeg24Aac = 0x02,
    /// ATRAC family
    Atrac = 0x04,
    /// Vendor-specific codec, identified by [`VendorCodec`]
    VendorSpecific = 0xFF,
}

impl TryFrom<u8> for CodecType {
    type Error = A2dpError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Self::Sbc),
            0x01 => Ok(Self::Mpeg12Audio),
            0x02 => Ok(Self::Mpeg24Aac),
            0x04 => Ok(Self::Atrac),
            0xFF => Ok(Self::VendorSpecific),
            _ => Err(A2dpError::UnsupportedCodec),
        }
    }
}

/// Vendor codecs the offload path knows how to hand to hardware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum VendorCodec {
    /// Qualcomm aptX
    Aptx,
    /// Qualcomm aptX HD
    AptxHd,
    /// Sony LDAC
    Ldac,
}

impl VendorCodec {
    /// Bluetooth SIG company id and vendor codec id of this codec
    #[must_use]
    pub const fn ids(self) -> (u32, u16) {
        match self {
            Self::Aptx => (0x0000_004F, 0x0001),
            Self::AptxHd => (0x0000_00D7, 0x0024),
            Self::Ldac => (0x0000_012D, 0x00AA),
        }
    }

    /// Look up a vendor codec from its company and codec id
    #[must_use]
    pub fn from_ids(vendor_id: u32, codec_id: u16) -> Option<Self> {
        [Self::Aptx, Self::AptxHd, Self::Ldac]
            .into_iter()
            .find(|codec| codec.ids() == (vendor_id, codec_id))
    }
}

/// SBC Sampling Frequency (bitfield, upper nibble of octet 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SbcSamplingFrequency(pub u8);

impl SbcSamplingFrequency {
    /// 16000 Hz
    pub const HZ_16000: u8 = 0x08;
    /// 32000 Hz
    pub const HZ_32000: u8 = 0x04;
    /// 44100 Hz
    pub const HZ_44100: u8 = 0x02;
    /// 48000 Hz
    pub const HZ_48000: u8 = 0x01;

    /// Create with all frequencies supported
    #[must_use]
    pub const fn all() -> Self {
        Self(Self::HZ_16000 | Self::HZ_32000 | Self::HZ_44100 | Self::HZ_48000)
    }

    /// Check if frequency is supported
    #[must_use]
    pub const fn supports(&self, freq: u8) -> bool {
        (self.0 & freq) != 0
    }

    /// Sample rate in Hz of the highest selected frequency
    #[must_use]
    pub const fn hz(&self) -> Option<u32> {
        if self.supports(Self::HZ_48000) {
            Some(48_000)
        } else if self.supports(Self::HZ_44100) {
            Some(44_100)
        } else if self.supports(Self::HZ_32000) {
            Some(32_000)
        } else if self.supports(Self::HZ_16000) {
            Some(16_000)
        } else {
            None
        }
    }
}

/// SBC Channel Mode (bitfield, lower nibble of octet 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SbcChannelMode(pub u8);

impl SbcChannelMode {
    /// Mono
    pub const MONO: u8 = 0x08;
    /// Dual Channel
    pub const DUAL_CHANNEL: u8 = 0x04;
    /// Stereo
    pub const STEREO: u8 = 0x02;
    /// Joint Stereo
    pub const JOINT_STEREO: u8 = 0x01;

    /// Create with all modes supported
    #[must_use]
    pub const fn all() -> Self {
        Self(Self::MONO | Self::DUAL_CHANNEL | Self::STEREO | Self::JOINT_STEREO)
    }

    /// Check if mode is supported
    #[must_use]
    pub const fn supports(&self, mode: u8) -> bool {
        (self.0 & mode) != 0
    }

    /// Number of audio channels for a single selected mode
    #[must_use]
    pub const fn channel_count(&self) -> u8 {
        if self.0 == Self::MONO { 1 } else { 2 }
    }
}

/// SBC Block Length (bitfield, upper nibble of octet 1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SbcBlockLength(pub u8);

impl SbcBlockLength {
    /// 4 blocks
    pub const BLOCKS_4: u8 = 0x08;
    /// 8 blocks
    pub const BLOCKS_8: u8 = 0x04;
    /// 12 blocks
    pub const BLOCKS_12: u8 = 0x02;
    /// 16 blocks
    pub const BLOCKS_16: u8 = 0x01;

    /// Create with all block lengths supported
    #[must_use]
    pub const fn all() -> Self {
        Self(Self::BLOCKS_4 | Self::BLOCKS_8 | Self::BLOCKS_12 | Self::BLOCKS_16)
    }
}

/// SBC Subbands (bitfield, bits 3..2 of octet 1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SbcSubbands(pub u8);

impl SbcSubbands {
    /// 4 subbands
    pub const SUBBANDS_4: u8 = 0x02;
    /// 8 subbands
    pub const SUBBANDS_8: u8 = 0x01;

    /// Create with all subbands supported
    #[must_use]
    pub const fn all() -> Self {
        Self(Self::SUBBANDS_4 | Self::SUBBANDS_8)
    }
}

/// SBC Allocation Method (bitfield, bits 1..0 of octet 1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SbcAllocationMethod(pub u8);

impl SbcAllocationMethod {
    /// SNR allocation method
    pub const SNR: u8 = 0x02;
    /// Loudness allocation method
    pub const LOUDNESS: u8 = 0x01;

    /// Create with all allocation methods supported
    #[must_use]
    pub const fn all() -> Self {
        Self(Self::SNR | Self::LOUDNESS)
    }
}

/// SBC codec information element (capabilities or a chosen configuration)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SbcCapabilities {
    /// Sampling frequency support (bitfield)
    pub sampling_frequencies: SbcSamplingFrequency,
    /// Channel mode support (bitfield)
    pub channel_modes: SbcChannelMode,
    /// Block length support (bitfield)
    pub block_lengths: SbcBlockLength,
    /// Subbands support (bitfield)
    pub subbands: SbcSubbands,
    /// Allocation method support (bitfield)
    pub allocation_methods: SbcAllocationMethod,
    /// Minimum bitpool value (2-250)
    pub min_bitpool: u8,
    /// Maximum bitpool value (2-250)
    pub max_bitpool: u8,
}

impl SbcCapabilities {
    /// Encoded length of the SBC element in octets
    pub const ENCODED_LEN: usize = 4;

    /// A typical 44.1 kHz joint-stereo configuration
    #[must_use]
    pub const fn high_quality() -> Self {
        Self {
            sampling_frequencies: SbcSamplingFrequency(SbcSamplingFrequency::HZ_44100),
            channel_modes: SbcChannelMode(SbcChannelMode::JOINT_STEREO),
            block_lengths: SbcBlockLength(SbcBlockLength::BLOCKS_16),
            subbands: SbcSubbands(SbcSubbands::SUBBANDS_8),
            allocation_methods: SbcAllocationMethod(SbcAllocationMethod::LOUDNESS),
            min_bitpool: 2,
            max_bitpool: 53,
        }
    }

    /// Validate SBC capabilities
    ///
    /// # Errors
    /// Returns error if bitpool values are invalid
    pub const fn validate(&self) -> Result<(), A2dpError> {
        if self.min_bitpool < 2 || self.min_bitpool > 250 {
            return Err(A2dpError::ConfigurationFailed);
        }
        if self.max_bitpool < 2 || self.max_bitpool > 250 {
            return Err(A2dpError::ConfigurationFailed);
        }
        if self.min_bitpool > self.max_bitpool {
            return Err(A2dpError::ConfigurationFailed);
        }
        Ok(())
    }

    /// Encode the SBC element into its 4-octet wire layout
    ///
    /// # Errors
    /// Returns error if buffer is too small
    pub fn encode(&self, buffer: &mut [u8]) -> Result<usize, A2dpError> {
        let out = buffer
            .get_mut(..Self::ENCODED_LEN)
            .ok_or(A2dpError::ConfigurationFailed)?;
        out[0] = (self.sampling_frequencies.0 << 4) | (self.channel_modes.0 & 0x0F);
        out[1] = (self.block_lengths.0 << 4)
            | ((self.subbands.0 & 0x03) << 2)
            | (self.allocation_methods.0 & 0x03);
        out[2] = self.min_bitpool;
        out[3] = self.max_bitpool;
        Ok(Self::ENCODED_LEN)
    }

    /// Decode the SBC element from its 4-octet wire layout
    ///
    /// # Errors
    /// Returns error if fewer than four octets are given
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, A2dpError> {
        if bytes.len() < Self::ENCODED_LEN {
            return Err(A2dpError::ConfigurationFailed);
        }
        Ok(Self {
            sampling_frequencies: SbcSamplingFrequency(bytes[0] >> 4),
            channel_modes: SbcChannelMode(bytes[0] & 0x0F),
            block_lengths: SbcBlockLength(bytes[1] >> 4),
            subbands: SbcSubbands((bytes[1] >> 2) & 0x03),
            allocation_methods: SbcAllocationMethod(bytes[1] & 0x03),
            min_bitpool: bytes[2],
            max_bitpool: bytes[3],
        })
    }

    /// Check if this capability set overlaps another
    #[must_use]
    pub const fn is_compatible_with(&self, other: &Self) -> bool {
        (self.sampling_frequencies.0 & other.sampling_frequencies.0) != 0
            && (self.channel_modes.0 & other.channel_modes.0) != 0
            && (self.block_lengths.0 & other.block_lengths.0) != 0
            && (self.subbands.0 & other.subbands.0) != 0
            && (self.allocation_methods.0 & other.allocation_methods.0) != 0
            && self.max_bitpool >= other.min_bitpool
            && self.min_bitpool <= other.max_bitpool
    }
}

impl Default for SbcCapabilities {
    fn default() -> Self {
        Self {
            sampling_frequencies: SbcSamplingFrequency::all(),
            channel_modes: SbcChannelMode::all(),
            block_lengths: SbcBlockLength::all(),
            subbands: SbcSubbands::all(),
            allocation_methods: SbcAllocationMethod::all(),
            min_bitpool: 2,
            max_bitpool: 53,
        }
    }
}

/// A codec information element: media type, codec type and the
/// codec-specific octets that follow them.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CodecInfo {
    /// Media type of the element
    pub media_type: MediaType,
    /// Codec type of the element
    pub codec_type: CodecType,
    /// Codec-specific information elements
    pub elements: Vec<u8, MAX_CODEC_INFO_LEN>,
}

impl CodecInfo {
    /// Build an audio SBC element
    #[must_use]
    pub fn sbc(caps: &SbcCapabilities) -> Self {
        let mut raw = [0u8; SbcCapabilities::ENCODED_LEN];
        let mut elements = Vec::new();
        if caps.encode(&mut raw).is_ok() {
            elements.extend_from_slice(&raw).ok();
        }
        Self {
            media_type: MediaType::Audio,
            codec_type: CodecType::Sbc,
            elements,
        }
    }

    /// Build an audio element for a vendor codec with its vendor-specific octets
    ///
    /// # Errors
    /// Returns error if the vendor octets do not fit the element
    pub fn vendor(codec: VendorCodec, specific: &[u8]) -> Result<Self, A2dpError> {
        let (vendor_id, codec_id) = codec.ids();
        let mut elements = Vec::new();
        elements
            .extend_from_slice(&vendor_id.to_le_bytes())
            .map_err(|()| A2dpError::ConfigurationFailed)?;
        elements
            .extend_from_slice(&codec_id.to_le_bytes())
            .map_err(|()| A2dpError::ConfigurationFailed)?;
        elements
            .extend_from_slice(specific)
            .map_err(|()| A2dpError::ConfigurationFailed)?;
        Ok(Self {
            media_type: MediaType::Audio,
            codec_type: CodecType::VendorSpecific,
            elements,
        })
    }

    /// Decode an element laid out as `[media_type << 4, codec_type, elements...]`
    ///
    /// # Errors
    /// Returns error if the element is truncated, too long, or names an unknown type
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, A2dpError> {
        let (header, rest) = bytes
            .split_first_chunk::<2>()
            .ok_or(A2dpError::ConfigurationFailed)?;
        let media_type = MediaType::try_from(header[0] >> 4)?;
        let codec_type = CodecType::try_from(header[1])?;
        let elements = Vec::from_slice(rest).map_err(|()| A2dpError::ConfigurationFailed)?;
        Ok(Self {
            media_type,
            codec_type,
            elements,
        })
    }

    /// Encode the element, returning the number of octets written
    ///
    /// # Errors
    /// Returns error if buffer is too small
    pub fn encode(&self, buffer: &mut [u8]) -> Result<usize, A2dpError> {
        let len = 2 + self.elements.len();
        let out = buffer.get_mut(..len).ok_or(A2dpError::ConfigurationFailed)?;
        out[0] = (self.media_type as u8) << 4;
        out[1] = self.codec_type as u8;
        out[2..].copy_from_slice(&self.elements);
        Ok(len)
    }

    /// Decoded SBC parameters when this is an SBC element
    #[must_use]
    pub fn sbc_params(&self) -> Option<SbcCapabilities> {
        if self.codec_type != CodecType::Sbc {
            return None;
        }
        SbcCapabilities::from_bytes(&self.elements).ok()
    }

    /// Vendor codec named by this element, if any
    #[must_use]
    pub fn vendor_codec(&self) -> Option<VendorCodec> {
        if self.codec_type != CodecType::VendorSpecific {
            return None;
        }
        let (vendor, rest) = self.elements.split_first_chunk::<4>()?;
        let (codec, _) = rest.split_first_chunk::<2>()?;
        VendorCodec::from_ids(u32::from_le_bytes(*vendor), u16::from_le_bytes(*codec))
    }
}

impl Default for CodecInfo {
    fn default() -> Self {
        Self::sbc(&SbcCapabilities::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sbc_sampling_frequency() {
        let freq = SbcSamplingFrequency(SbcSamplingFrequency::HZ_44100);
        assert!(freq.supports(SbcSamplingFrequency::HZ_44100));
        assert!(!freq.supports(SbcSamplingFrequency::HZ_16000));
        assert_eq!(freq.hz(), Some(44_100));
        assert_eq!(SbcSamplingFrequency(0).hz(), None);
    }

    #[test]
    fn test_sbc_capabilities_validation() {
        let mut caps = SbcCapabilities::default();
        assert!(caps.validate().is_ok());

        caps.min_bitpool = 1;
        assert!(caps.validate().is_err());

        caps.min_bitpool = 32;
        caps.max_bitpool = 16;
        assert!(caps.validate().is_err());
    }

    #[test]
    fn test_sbc_compatibility() {
        let caps1 = SbcCapabilities::high_quality();
        let caps2 = SbcCapabilities::default();

        assert!(caps1.is_compatible_with(&caps2));
        assert!(caps2.is_compatible_with(&caps1));
    }

    #[test]
    fn test_sbc_wire_layout() {
        let caps = SbcCapabilities::high_quality();
        let mut buffer = [0u8; 8];
        assert_eq!(caps.encode(&mut buffer).unwrap(), 4);
        // 44.1 kHz + joint stereo, 16 blocks + 8 subbands + loudness
        assert_eq!(&buffer[..4], &[0x21, 0x15, 2, 53]);
        assert_eq!(SbcCapabilities::from_bytes(&buffer[..4]).unwrap(), caps);

        assert!(caps.encode(&mut [0u8; 3]).is_err());
        assert!(SbcCapabilities::from_bytes(&[0x21, 0x15]).is_err());
    }

    #[test]
    fn test_codec_info_sbc() {
        let info = CodecInfo::sbc(&SbcCapabilities::high_quality());
        assert_eq!(info.codec_type, CodecType::Sbc);
        assert_eq!(info.sbc_params().unwrap().max_bitpool, 53);
        assert_eq!(info.vendor_codec(), None);

        let mut buffer = [0u8; 8];
        let len = info.encode(&mut buffer).unwrap();
        assert_eq!(len, 6);
        assert_eq!(buffer[0], 0x00);
        assert_eq!(CodecInfo::from_bytes(&buffer[..len]).unwrap(), info);
    }

    #[test]
    fn test_codec_info_vendor() {
        let info = CodecInfo::vendor(VendorCodec::Ldac, &[0x20, 0x01]).unwrap();
        assert_eq!(info.codec_type, CodecType::VendorSpecific);
        assert_eq!(info.vendor_codec(), Some(VendorCodec::Ldac));
        assert_eq!(info.sbc_params(), None);
        assert_eq!(VendorCodec::from_ids(0x4F, 0x0001), Some(VendorCodec::Aptx));
        assert_eq!(VendorCodec::from_ids(0x4F, 0x0002), None);
    }

    #[test]
    fn test_codec_info_rejects_unknown_types() {
        assert_eq!(
            CodecInfo::from_bytes(&[0x00, 0x07, 0x00]),
            Err(A2dpError::UnsupportedCodec)
        );
        assert_eq!(CodecInfo::from_bytes(&[0x00]), Err(A2dpError::ConfigurationFailed));
    }
}
