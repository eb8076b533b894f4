//! Provider-side stream: lifecycle, timestamp continuity and frame dispatch.
//!
//! A protocol producer owns the ingress side of a [`ProviderStream`]: it
//! adjusts each raw timestamp through the stream, builds a [`MediaPacket`]
//! and hands it to [`ProviderStream::send_frame`]. A control path drives
//! [`start`](ProviderStream::start), [`stop`](ProviderStream::stop) and
//! [`terminate`](ProviderStream::terminate). Both paths mutate the same
//! timestamp state and must be serialized by the caller.
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──set_state──▶ Connected / Described / Playing / Error
//!   │                          │
//!   └────────── stop() ────────┴──▶ Stopped ──▶ ... ──terminate()──▶ Terminated
//! ```
//!
//! `Stopped` is only reachable through [`stop`](ProviderStream::stop), which
//! also closes the timestamp epoch. [`start`](ProviderStream::start) bridges
//! the outage since the last received packet into every track's base offset.

use bytes::Bytes;
use common::types::{StreamId, TrackId};
use media_protocol::packet::{BitstreamFormat, MediaPacket, MediaType, PacketType};
use media_protocol::stream::StreamInfo;
use media_protocol::track::{Track, TrackDirectory, TrackSet};
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::application::{Application, UNKNOWN_APPLICATION};
use crate::config::TimestampConfig;
use crate::errors::ProviderError;
use crate::observability::metrics::IngressMetrics;
use crate::timestamp::{AdjustedTimestamp, TimestampEngine};

/// Lifecycle state of a stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum StreamState {
    /// Created, nothing received yet
    #[default]
    Idle,
    /// Transport connected
    Connected,
    /// Tracks described
    Described,
    /// Media flowing
    Playing,
    /// Session ended; reachable only through `stop()`
    Stopped,
    /// Producer failed
    Error,
    /// Terminal state
    Terminated,
}

impl StreamState {
    /// Returns the state as a string for logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            StreamState::Idle => "idle",
            StreamState::Connected => "connected",
            StreamState::Described => "described",
            StreamState::Playing => "playing",
            StreamState::Stopped => "stopped",
            StreamState::Error => "error",
            StreamState::Terminated => "terminated",
        }
    }

    /// Whether the state belongs to the active family.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(
            self,
            StreamState::Connected | StreamState::Described | StreamState::Playing
        )
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stream as seen by the ingest provider.
pub struct ProviderStream {
    info: StreamInfo,
    application: Option<Weak<dyn Application>>,
    state: StreamState,
    timestamps: TimestampEngine,
    metrics: Arc<dyn IngressMetrics>,
    /// Instant the last packet was dispatched; `None` until the first one.
    last_packet_received: Option<Instant>,
}

impl fmt::Debug for ProviderStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderStream")
            .field("info", &self.info)
            .field("application", &self.application_name())
            .field("state", &self.state)
            .field("timestamps", &self.timestamps)
            .field("last_packet_received", &self.last_packet_received)
            .finish_non_exhaustive()
    }
}

impl ProviderStream {
    /// Create a stream that is not attached to any application.
    ///
    /// Packets cannot be dispatched until [`attach`](Self::attach) is called.
    #[must_use]
    pub fn new(
        info: StreamInfo,
        config: TimestampConfig,
        metrics: Arc<dyn IngressMetrics>,
    ) -> Self {
        Self {
            info,
            application: None,
            state: StreamState::Idle,
            timestamps: TimestampEngine::new(config),
            metrics,
            last_packet_received: None,
        }
    }

    /// Create a stream owned by `application`.
    #[must_use]
    pub fn with_application(
        application: &Arc<dyn Application>,
        info: StreamInfo,
        config: TimestampConfig,
        metrics: Arc<dyn IngressMetrics>,
    ) -> Self {
        let mut stream = Self::new(info, config, metrics);
        stream.attach(application);
        stream
    }

    /// Attach the stream to its owning application.
    pub fn attach(&mut self, application: &Arc<dyn Application>) {
        self.application = Some(Arc::downgrade(application));
    }

    // ------------------------------------------------------------------------
    // Descriptor
    // ------------------------------------------------------------------------

    /// Stream descriptor.
    #[must_use]
    pub const fn info(&self) -> &StreamInfo {
        &self.info
    }

    /// Stream identifier.
    #[must_use]
    pub const fn id(&self) -> StreamId {
        self.info.id
    }

    /// Stream name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Media sequence id stamped on outgoing packets.
    #[must_use]
    pub const fn msid(&self) -> u32 {
        self.info.msid
    }

    /// Tracks of the stream.
    #[must_use]
    pub const fn tracks(&self) -> &TrackSet {
        &self.info.tracks
    }

    /// Add or replace a track.
    pub fn add_track(&mut self, track: Track) {
        self.info.tracks.add_track(track);
    }

    /// URL the stream was requested with.
    #[must_use]
    pub fn requested_url(&self) -> Option<&str> {
        self.info.requested_url.as_deref()
    }

    /// Set the URL the stream was requested with.
    pub fn set_requested_url(&mut self, url: Option<String>) {
        self.info.requested_url = url;
    }

    /// URL finally connected to.
    #[must_use]
    pub fn final_url(&self) -> Option<&str> {
        self.info.final_url.as_deref()
    }

    /// Set the URL finally connected to.
    pub fn set_final_url(&mut self, url: Option<String>) {
        self.info.final_url = url;
    }

    fn application(&self) -> Option<Arc<dyn Application>> {
        self.application.as_ref().and_then(Weak::upgrade)
    }

    /// Name of the owning application, or `"Unknown"` when detached.
    #[must_use]
    pub fn application_name(&self) -> String {
        self.application()
            .map_or_else(|| UNKNOWN_APPLICATION.to_string(), |app| app.name().to_string())
    }

    /// Type name of the owning application, or `"Unknown"` when detached.
    #[must_use]
    pub fn application_type_name(&self) -> String {
        self.application().map_or_else(
            || UNKNOWN_APPLICATION.to_string(),
            |app| app.type_name().to_string(),
        )
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> StreamState {
        self.state
    }

    /// Set any state other than `Stopped`.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::RejectedTransition` for `Stopped`; use
    /// [`stop`](Self::stop) instead. The current state is left unchanged.
    pub fn set_state(&mut self, state: StreamState) -> Result<(), ProviderError> {
        if state == StreamState::Stopped {
            return Err(ProviderError::RejectedTransition(self.state));
        }

        if self.state == StreamState::Terminated {
            warn!(
                target: "provider.stream",
                stream_id = %self.info.id,
                stream = %self.info.name,
                next = %state,
                "State change on a terminated stream"
            );
        }

        self.state = state;
        Ok(())
    }

    /// Start (or restart) the stream at the current instant.
    pub fn start(&mut self) {
        self.start_at(Instant::now());
    }

    /// Start (or restart) the stream at `now`.
    ///
    /// If a packet was received before, the time since then is added to every
    /// track's base offset so the next session continues right after the last
    /// pre-outage timestamp.
    pub fn start_at(&mut self, now: Instant) {
        info!(
            target: "provider.stream",
            app = %self.application_name(),
            stream = %self.info.name,
            stream_id = %self.info.id,
            "Stream has been started"
        );

        if let Some(last) = self.last_packet_received {
            let gap = now.saturating_duration_since(last);
            let gap_us = i64::try_from(gap.as_micros()).unwrap_or(i64::MAX);

            debug!(
                target: "provider.stream",
                stream_id = %self.info.id,
                reconnect_ms = gap.as_millis(),
                "Adding reconnect time to base timestamp"
            );

            self.timestamps.bridge_gap(&self.info.tracks, gap_us);
        }
    }

    /// Stop the stream, closing the timestamp epoch. Idempotent.
    pub fn stop(&mut self) {
        if self.state == StreamState::Stopped {
            return;
        }

        info!(
            target: "provider.stream",
            app = %self.application_name(),
            stream = %self.info.name,
            stream_id = %self.info.id,
            "Stream has been stopped"
        );

        let anchor = self.timestamps.reset(&self.info.tracks);
        debug!(
            target: "provider.stream",
            stream_id = %self.info.id,
            anchor_us = ?anchor,
            "Timestamp epoch closed"
        );

        self.state = StreamState::Stopped;
    }

    /// Move the stream to its terminal state.
    pub fn terminate(&mut self) {
        info!(
            target: "provider.stream",
            app = %self.application_name(),
            stream = %self.info.name,
            stream_id = %self.info.id,
            "Stream has been terminated"
        );
        self.state = StreamState::Terminated;
    }

    // ------------------------------------------------------------------------
    // Timestamps
    // ------------------------------------------------------------------------

    /// Timestamp continuity state, for inspection.
    #[must_use]
    pub const fn timestamps(&self) -> &TimestampEngine {
        &self.timestamps
    }

    fn track(&self, track_id: TrackId) -> Result<&Track, ProviderError> {
        self.info
            .tracks
            .track(track_id)
            .ok_or(ProviderError::UnknownTrack(track_id))
    }

    /// Rebase raw PTS/DTS of a track onto the stream's continuous clock.
    ///
    /// See [`TimestampEngine::adjust_by_base`].
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::UnknownTrack` if the track does not exist; no
    /// state is modified in that case.
    pub fn adjust_timestamp_by_base(
        &mut self,
        track_id: TrackId,
        pts: i64,
        dts: i64,
        max_timestamp: i64,
    ) -> Result<AdjustedTimestamp, ProviderError> {
        let track = self.info.tracks.track(track_id).ok_or(ProviderError::UnknownTrack(track_id))?;
        Ok(self.timestamps.adjust_by_base(track, pts, dts, max_timestamp))
    }

    /// Advance a track's running clock by the increment of a raw timestamp.
    ///
    /// See [`TimestampEngine::adjust_by_delta`].
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::UnknownTrack` if the track does not exist.
    pub fn adjust_timestamp_by_delta(
        &mut self,
        track_id: TrackId,
        timestamp: i64,
        max_timestamp: i64,
    ) -> Result<i64, ProviderError> {
        self.track(track_id)?;
        Ok(self.timestamps.adjust_by_delta(track_id, timestamp, max_timestamp))
    }

    /// Increment of a raw timestamp over the track's previous one.
    ///
    /// See [`TimestampEngine::delta`].
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::UnknownTrack` if the track does not exist.
    pub fn delta_timestamp(
        &mut self,
        track_id: TrackId,
        timestamp: i64,
        max_timestamp: i64,
    ) -> Result<i64, ProviderError> {
        self.track(track_id)?;
        Ok(self.timestamps.delta(track_id, timestamp, max_timestamp))
    }

    /// Base offset of a track in the track's own timebase.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::UnknownTrack` if the track does not exist.
    pub fn base_timestamp(&self, track_id: TrackId) -> Result<i64, ProviderError> {
        let track = self.track(track_id)?;
        Ok(self.timestamps.base_timestamp_ticks(track))
    }

    // ------------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------------

    /// Instant the last packet was dispatched.
    #[must_use]
    pub const fn last_packet_received(&self) -> Option<Instant> {
        self.last_packet_received
    }

    /// Validate a packet and forward it to the owning application.
    ///
    /// # Errors
    ///
    /// See [`send_frame_at`](Self::send_frame_at).
    pub fn send_frame(&mut self, packet: MediaPacket) -> Result<(), ProviderError> {
        self.send_frame_at(packet, Instant::now())
    }

    /// Validate a packet received at `now` and forward it to the owning
    /// application.
    ///
    /// On success the payload size is reported to the ingress metrics and
    /// `now` becomes the last-packet instant used for reconnect bridging.
    ///
    /// # Errors
    ///
    /// - `ProviderError::DetachedStream` if the application is gone
    /// - `ProviderError::InvalidPacket` if the packet type is unknown, or the
    ///   bitstream format is unknown on a non-relay packet
    /// - `ProviderError::IngestRejected` if the application refused the packet
    pub fn send_frame_at(
        &mut self,
        packet: MediaPacket,
        now: Instant,
    ) -> Result<(), ProviderError> {
        let application = self.application().ok_or(ProviderError::DetachedStream)?;

        let invalid = if packet.packet_type == PacketType::Unknown {
            Some("packet type must be specified")
        } else if !packet.is_relay() && packet.bitstream_format == BitstreamFormat::Unknown {
            Some("bitstream format must be specified")
        } else {
            None
        };

        if let Some(reason) = invalid {
            let err = ProviderError::InvalidPacket(reason);
            error!(
                target: "provider.dispatch",
                app = %application.name(),
                stream = %self.info.name,
                stream_id = %self.info.id,
                track_id = %packet.track_id,
                kind = err.kind(),
                error = %err,
                "Packet rejected"
            );
            return Err(err);
        }

        self.metrics.record_ingress(&self.info, packet.len() as u64);
        self.last_packet_received = Some(now);

        if application.ingest(self, packet) {
            Ok(())
        } else {
            Err(ProviderError::IngestRejected)
        }
    }

    /// Send a payload on the stream's data track with PTS = DTS = `timestamp`.
    ///
    /// # Errors
    ///
    /// See [`send_data_frame_at`](Self::send_data_frame_at).
    pub fn send_data_frame(
        &mut self,
        timestamp: i64,
        format: BitstreamFormat,
        packet_type: PacketType,
        payload: Bytes,
    ) -> Result<(), ProviderError> {
        self.send_data_frame_at(timestamp, format, packet_type, payload, Instant::now())
    }

    /// Send a payload received at `now` on the stream's data track.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::MissingDataTrack` if the stream has no data
    /// track, otherwise any error of [`send_frame_at`](Self::send_frame_at).
    pub fn send_data_frame_at(
        &mut self,
        timestamp: i64,
        format: BitstreamFormat,
        packet_type: PacketType,
        payload: Bytes,
        now: Instant,
    ) -> Result<(), ProviderError> {
        let Some(data_track) = self.info.tracks.first_track_by_type(MediaType::Data) else {
            let err = ProviderError::MissingDataTrack;
            error!(
                target: "provider.dispatch",
                app = %self.application_name(),
                stream = %self.info.name,
                stream_id = %self.info.id,
                kind = err.kind(),
                "Data track is not found"
            );
            return Err(err);
        };

        let packet = MediaPacket::new(
            self.info.msid,
            MediaType::Data,
            data_track.id,
            payload,
            timestamp,
            timestamp,
            format,
            packet_type,
        );

        self.send_frame_at(packet, now)
    }
}
