//! AVDTP (Audio/Video Distribution Transport Protocol) Data Model
//!
//! The state machine never encodes AVDTP PDUs itself. This module holds the
//! values it exchanges with the transport: remote stream endpoint
//! descriptors from a discovery round, the service capability mask, and the
//! stream configuration negotiated for an endpoint.

use super::codec::CodecInfo;
use super::{A2dpError, Role, StreamEndpointId};
use crate::constants::{MAX_PROTECT_LEN, MAX_SEPS};
use heapless::Vec;

/// Media Types supported by AVDTP
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum MediaType {
    /// Audio media
    Audio = 0x00,
    /// Video media
    Video = 0x01,
    /// Multimedia media
    Multimedia = 0x02,
}

impl TryFrom<u8> for MediaType {
    type Error = A2dpError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Self::Audio),
            0x01 => Ok(Self::Video),
            0x02 => Ok(Self::Multimedia),
            _ => Err(A2dpError::InvalidEndpoint),
        }
    }
}

/// Remote stream endpoint descriptor returned by a discovery round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SepInfo {
    /// Remote Stream Endpoint Identifier
    pub seid: StreamEndpointId,
    /// Whether the remote endpoint is already in use
    pub in_use: bool,
    /// Media type of the endpoint
    pub media_type: MediaType,
    /// Direction of the remote endpoint
    pub tsep: Role,
}

impl SepInfo {
    /// Create a descriptor for an idle endpoint
    #[must_use]
    pub const fn new(seid: StreamEndpointId, media_type: MediaType, tsep: Role) -> Self {
        Self {
            seid,
            in_use: false,
            media_type,
            tsep,
        }
    }

    /// True when the endpoint may carry a stream of `media_type` towards `tsep`
    #[must_use]
    pub fn is_candidate(&self, media_type: MediaType, tsep: Role) -> bool {
        !self.in_use && self.media_type == media_type && self.tsep == tsep
    }
}

/// Ordered discovery results plus the capability-iteration cursor.
///
/// Entries are never reordered; the cursor only moves forward while a
/// negotiation sequence is running and is rewound by [`Self::replace`] or
/// [`Self::clear`].
#[derive(Debug, Clone, Default)]
pub struct DiscoveredEndpoints {
    seps: Vec<SepInfo, MAX_SEPS>,
    cursor: usize,
}

impl DiscoveredEndpoints {
    /// Create an empty result set
    #[must_use]
    pub const fn new() -> Self {
        Self {
            seps: Vec::new(),
            cursor: 0,
        }
    }

    /// Replace the results with a fresh discovery round and rewind the cursor
    pub fn replace(&mut self, seps: &[SepInfo]) {
        self.seps.clear();
        for sep in seps.iter().take(MAX_SEPS) {
            self.seps.push(*sep).ok();
        }
        self.cursor = 0;
    }

    /// Append one endpoint
    ///
    /// # Errors
    /// Returns error if the result set is full
    pub fn push(&mut self, sep: SepInfo) -> Result<(), A2dpError> {
        self.seps.push(sep).map_err(|_| A2dpError::QueueFull)
    }

    /// Forget all endpoints
    pub fn clear(&mut self) {
        self.seps.clear();
        self.cursor = 0;
    }

    /// Number of endpoints
    #[must_use]
    pub fn len(&self) -> usize {
        self.seps.len()
    }

    /// True when no endpoint is known
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seps.is_empty()
    }

    /// All endpoints in discovery order
    #[must_use]
    pub fn as_slice(&self) -> &[SepInfo] {
        &self.seps
    }

    /// Current cursor position
    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    /// Move the cursor to an explicit index (reconfiguration target)
    pub fn set_cursor(&mut self, index: usize) {
        self.cursor = index;
    }

    /// Step past the endpoint under the cursor
    pub fn advance(&mut self) {
        self.cursor = self.cursor.saturating_add(1);
    }

    /// Endpoint under the cursor
    #[must_use]
    pub fn current(&self) -> Option<&SepInfo> {
        self.seps.get(self.cursor)
    }

    /// Move the cursor forward to the first usable endpoint at or after it.
    ///
    /// Returns `None` and leaves the cursor past the end when the list is
    /// exhausted.
    pub fn seek_candidate(&mut self, media_type: MediaType, tsep: Role) -> Option<SepInfo> {
        while let Some(sep) = self.seps.get(self.cursor) {
            if sep.is_candidate(media_type, tsep) {
                return Some(*sep);
            }
            self.cursor += 1;
        }
        None
    }

    /// Count endpoints usable for `media_type` towards `tsep`
    #[must_use]
    pub fn count_candidates(&self, media_type: MediaType, tsep: Role) -> usize {
        self.seps
            .iter()
            .filter(|sep| sep.is_candidate(media_type, tsep))
            .count()
    }
}

/// Protocol service capability mask (bit per AVDTP service category)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PscMask(pub u16);

impl PscMask {
    /// Media transport
    pub const TRANS: Self = Self(1 << 1);
    /// Reporting
    pub const REPORT: Self = Self(1 << 2);
    /// Recovery
    pub const RECOV: Self = Self(1 << 3);
    /// Header compression
    pub const HDRCMP: Self = Self(1 << 5);
    /// Multiplexing
    pub const MUX: Self = Self(1 << 6);
    /// Delay reporting
    pub const DELAY_RPT: Self = Self(1 << 8);

    /// Check if every bit of `other` is set
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Union of both masks
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Intersection of both masks
    #[must_use]
    pub const fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// This mask with the bits of `other` cleared
    #[must_use]
    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }
}

/// Stream configuration: codec element, service mask and content protection
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StreamConfig {
    /// Codec information element (`None` when the peer sent no codec)
    pub codec: Option<CodecInfo>,
    /// Service categories in use
    pub psc_mask: PscMask,
    /// Content protection descriptors
    pub protect: Vec<u8, MAX_PROTECT_LEN>,
}

impl StreamConfig {
    /// Configuration carrying only a codec element and the media transport service
    #[must_use]
    pub fn with_codec(codec: CodecInfo) -> Self {
        Self {
            codec: Some(codec),
            psc_mask: PscMask::TRANS,
            protect: Vec::new(),
        }
    }

    /// Media type of the codec element, if any
    #[must_use]
    pub fn media_type(&self) -> Option<MediaType> {
        self.codec.as_ref().map(|codec| codec.media_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::a2dp::codec::{CodecInfo, SbcCapabilities};

    fn sep(seid: u8, media_type: MediaType, tsep: Role, in_use: bool) -> SepInfo {
        SepInfo {
            seid,
            in_use,
            media_type,
            tsep,
        }
    }

    #[test]
    fn test_seek_candidate_skips_unusable_endpoints() {
        let mut seps = DiscoveredEndpoints::new();
        seps.replace(&[
            sep(1, MediaType::Audio, Role::Sink, true),
            sep(2, MediaType::Video, Role::Sink, false),
            sep(3, MediaType::Audio, Role::Source, false),
            sep(4, MediaType::Audio, Role::Sink, false),
        ]);

        let found = seps.seek_candidate(MediaType::Audio, Role::Sink).unwrap();
        assert_eq!(found.seid, 4);
        assert_eq!(seps.cursor(), 3);
        assert_eq!(seps.count_candidates(MediaType::Audio, Role::Sink), 1);

        seps.advance();
        assert_eq!(seps.seek_candidate(MediaType::Audio, Role::Sink), None);
        assert_eq!(seps.cursor(), 4);
        assert!(seps.current().is_none());
    }

    #[test]
    fn test_replace_rewinds_cursor() {
        let mut seps = DiscoveredEndpoints::new();
        seps.replace(&[sep(1, MediaType::Audio, Role::Sink, false)]);
        seps.advance();
        seps.replace(&[sep(7, MediaType::Audio, Role::Sink, false)]);
        assert_eq!(seps.cursor(), 0);
        assert_eq!(seps.current().unwrap().seid, 7);

        seps.clear();
        assert!(seps.is_empty());
    }

    #[test]
    fn test_psc_mask_operations() {
        let mask = PscMask::TRANS.union(PscMask::DELAY_RPT);
        assert!(mask.contains(PscMask::TRANS));
        assert!(!mask.contains(PscMask::REPORT));
        assert_eq!(mask.without(PscMask::DELAY_RPT), PscMask::TRANS);
        assert_eq!(mask.intersection(PscMask::DELAY_RPT), PscMask::DELAY_RPT);
    }

    #[test]
    fn test_stream_config_media_type() {
        let config = StreamConfig::with_codec(CodecInfo::sbc(&SbcCapabilities::default()));
        assert_eq!(config.media_type(), Some(MediaType::Audio));
        assert_eq!(StreamConfig::default().media_type(), None);
    }
}
