//! Stream descriptors.

use crate::track::{Track, TrackSet};
use common::types::StreamId;
use serde::{Deserialize, Serialize};

/// Protocol family a stream was ingested from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Unknown source
    #[default]
    Unknown,
    /// RTMP push
    Rtmp,
    /// RTSP push
    Rtsp,
    /// RTSP pull
    RtspPull,
    /// SRT
    Srt,
    /// WebRTC (WHIP)
    WebRtc,
    /// MPEG-TS over UDP
    Mpegts,
    /// Origin relay
    Ovt,
    /// File playback
    File,
}

impl SourceType {
    /// Returns the source type as a string for metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            SourceType::Unknown => "unknown",
            SourceType::Rtmp => "rtmp",
            SourceType::Rtsp => "rtsp",
            SourceType::RtspPull => "rtsp_pull",
            SourceType::Srt => "srt",
            SourceType::WebRtc => "webrtc",
            SourceType::Mpegts => "mpegts",
            SourceType::Ovt => "ovt",
            SourceType::File => "file",
        }
    }
}

/// Stream descriptor: identity, source and tracks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamInfo {
    /// Stream identifier
    pub id: StreamId,
    /// Stream name as published
    pub name: String,
    /// Media sequence id stamped on every packet of this stream
    pub msid: u32,
    /// Protocol family the stream arrives on
    pub source_type: SourceType,
    /// Tracks of the stream
    pub tracks: TrackSet,
    /// URL the stream was requested with, for pulled streams
    pub requested_url: Option<String>,
    /// URL finally connected to, after redirects
    pub final_url: Option<String>,
}

impl StreamInfo {
    /// Create a descriptor with no tracks
    #[must_use]
    pub fn new(id: StreamId, name: impl Into<String>, source_type: SourceType) -> Self {
        Self {
            id,
            name: name.into(),
            source_type,
            ..Self::default()
        }
    }

    /// Add a track, builder style
    #[must_use]
    pub fn with_track(mut self, track: Track) -> Self {
        self.tracks.add_track(track);
        self
    }
}
