//! Media packet types handed from protocol producers to the owning application.

use bytes::Bytes;
use common::types::TrackId;
use serde::{Deserialize, Serialize};

/// Kind of media carried by a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum MediaType {
    /// Not yet known
    #[default]
    Unknown = 0x00,
    /// Video track
    Video = 0x01,
    /// Audio track
    Audio = 0x02,
    /// Timed metadata (ID3, AMF, cues)
    Data = 0x03,
    /// Subtitle track
    Subtitle = 0x04,
}

impl MediaType {
    /// Returns the media type as a string for logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            MediaType::Unknown => "unknown",
            MediaType::Video => "video",
            MediaType::Audio => "audio",
            MediaType::Data => "data",
            MediaType::Subtitle => "subtitle",
        }
    }
}

/// Bitstream layout of a packet payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BitstreamFormat {
    /// Not specified; rejected for every packet type except [`PacketType::Relay`]
    #[default]
    Unknown,
    /// H.264 length-prefixed NAL units
    H264Avcc,
    /// H.264 start-code delimited NAL units
    H264AnnexB,
    /// H.265 start-code delimited NAL units
    H265AnnexB,
    /// VP8 frames
    Vp8,
    /// Raw AAC access units
    AacRaw,
    /// AAC with ADTS headers
    AacAdts,
    /// AAC in LATM framing
    AacLatm,
    /// Opus packets
    Opus,
    /// JPEG image
    Jpeg,
    /// PNG image
    Png,
    /// ID3v2 tag
    Id3v2,
    /// AMF0 script data
    Amf0,
    /// Cue event
    Cue,
    /// `WebVTT` cue text
    Webvtt,
}

/// Role of a packet within its bitstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacketType {
    /// Not specified; always rejected by dispatch
    #[default]
    Unknown,
    /// Decoder configuration (SPS/PPS, `AudioSpecificConfig`)
    SequenceHeader,
    /// Coded picture data
    Nalu,
    /// Raw payload in the declared bitstream format
    Raw,
    /// Opaque relay passthrough, no bitstream format required
    Relay,
    /// Event or metadata payload
    Event,
}

/// A media packet with its timing and format tags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPacket {
    /// Media sequence id of the producing stream
    pub msid: u32,
    /// Kind of media in the payload
    pub media_type: MediaType,
    /// Track the packet belongs to
    pub track_id: TrackId,
    /// Packet payload
    pub payload: Bytes,
    /// Presentation timestamp in the track's timebase
    pub pts: i64,
    /// Decode timestamp in the track's timebase
    pub dts: i64,
    /// Bitstream layout of the payload
    pub bitstream_format: BitstreamFormat,
    /// Role of the packet
    pub packet_type: PacketType,
}

impl MediaPacket {
    /// Create a new packet
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        msid: u32,
        media_type: MediaType,
        track_id: TrackId,
        payload: Bytes,
        pts: i64,
        dts: i64,
        bitstream_format: BitstreamFormat,
        packet_type: PacketType,
    ) -> Self {
        Self {
            msid,
            media_type,
            track_id,
            payload,
            pts,
            dts,
            bitstream_format,
            packet_type,
        }
    }

    /// Payload length in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Whether the packet is an opaque relay packet
    #[must_use]
    pub fn is_relay(&self) -> bool {
        self.packet_type == PacketType::Relay
    }
}
