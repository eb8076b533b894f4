//! Ingest provider error types.
//!
//! Every failure is local and recoverable: callers decide whether to drop
//! the frame, retry or escalate. Nothing here terminates the process.

use common::types::TrackId;
use thiserror::Error;

use crate::stream::StreamState;

/// Ingest provider error type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Track id is not present in the stream's track directory.
    #[error("Unknown track: {0}")]
    UnknownTrack(TrackId),

    /// Packet tags do not allow dispatch.
    #[error("Invalid packet: {0}")]
    InvalidPacket(&'static str),

    /// Data frame sent on a stream without a data track.
    #[error("Stream has no data track")]
    MissingDataTrack,

    /// Stream is not attached to a live application.
    #[error("Stream is detached from its application")]
    DetachedStream,

    /// Requested state change is not allowed through `set_state`.
    #[error("State transition rejected (current state: {0})")]
    RejectedTransition(StreamState),

    /// The owning application refused the packet.
    #[error("Application rejected the packet")]
    IngestRejected,
}

impl ProviderError {
    /// Returns a bounded label for this error, for logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            ProviderError::UnknownTrack(_) => "unknown_track",
            ProviderError::InvalidPacket(_) => "invalid_packet",
            ProviderError::MissingDataTrack => "missing_data_track",
            ProviderError::DetachedStream => "detached_stream",
            ProviderError::RejectedTransition(_) => "rejected_transition",
            ProviderError::IngestRejected => "ingest_rejected",
        }
    }
}
