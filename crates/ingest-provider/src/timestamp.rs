//! Per-track timestamp continuity.
//!
//! Converts raw producer timestamps (arbitrary origin, fixed-width counters,
//! reconnect gaps) into a continuous clock per track while keeping tracks of
//! the same stream aligned with each other.
//!
//! Two strategies are offered:
//!
//! - **Rebase** ([`TimestampEngine::adjust_by_base`]): for raw timestamps that
//!   share one domain across tracks (container timestamps). The first DTS of
//!   an epoch becomes the common origin and each track is shifted onto its
//!   base offset. Counter wraparound is detected per field against the last
//!   raw value.
//! - **Delta** ([`TimestampEngine::adjust_by_delta`]): for raw timestamps with
//!   a meaningless origin (RTP). Increments are integrated into a running
//!   clock that starts at zero.
//!
//! # State
//!
//! | Map | Unit | Written by |
//! |-----|------|------------|
//! | base | us | reconnect bridging, epoch reset |
//! | source | raw | delta strategy |
//! | last | us (rebase) / raw (delta) | both strategies |
//! | wraparound count (PTS, DTS) | count | rebase strategy |
//! | last origin (PTS, DTS) | raw | rebase strategy |
//!
//! Reads of absent entries default to zero. None of this state is
//! synchronized; one stream is driven by one caller at a time.

use common::types::TrackId;
use media_protocol::track::{Track, TrackDirectory};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::config::TimestampConfig;
use crate::observability::metrics::{record_delta_discontinuity, record_wraparound};

/// Share of `max_timestamp` above which a backward step of the delta strategy
/// counts as a counter wrap rather than a source restart.
const DELTA_WRAP_THRESHOLD_PERCENT: f64 = 99.99;

/// Which timestamp of a packet a counter refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimestampField {
    /// Presentation timestamp
    Pts,
    /// Decode timestamp
    Dts,
}

impl TimestampField {
    /// Returns the field as a string for metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            TimestampField::Pts => "pts",
            TimestampField::Dts => "dts",
        }
    }
}

/// Result of the rebase strategy, in the track's own timebase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdjustedTimestamp {
    /// Adjusted presentation timestamp
    pub pts: i64,
    /// Adjusted decode timestamp
    pub dts: i64,
}

#[derive(Debug, Default)]
struct PerField<T> {
    pts: T,
    dts: T,
}

impl<T> PerField<T> {
    fn get(&self, field: TimestampField) -> &T {
        match field {
            TimestampField::Pts => &self.pts,
            TimestampField::Dts => &self.dts,
        }
    }
}

/// Timestamp continuity state of one stream.
#[derive(Debug, Default)]
pub struct TimestampEngine {
    config: TimestampConfig,

    /// First DTS of the epoch in microseconds; `None` until captured.
    start_timestamp_us: Option<i64>,

    base_timestamp_us: HashMap<TrackId, i64>,
    source_timestamp: HashMap<TrackId, i64>,
    last_timestamp: HashMap<TrackId, i64>,
    wraparound_count: PerField<HashMap<TrackId, i64>>,
    last_origin: PerField<HashMap<TrackId, i64>>,
}

impl TimestampEngine {
    /// Create an engine with empty state.
    #[must_use]
    pub fn new(config: TimestampConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Settings this engine was created with.
    #[must_use]
    pub const fn config(&self) -> &TimestampConfig {
        &self.config
    }

    /// Start timestamp of the current epoch in microseconds, if captured.
    #[must_use]
    pub const fn start_timestamp(&self) -> Option<i64> {
        self.start_timestamp_us
    }

    /// Base offset of a track in microseconds.
    #[must_use]
    pub fn base_timestamp_us(&self, track_id: TrackId) -> i64 {
        self.base_timestamp_us.get(&track_id).copied().unwrap_or(0)
    }

    /// Last emitted timestamp of a track, if any.
    #[must_use]
    pub fn last_timestamp(&self, track_id: TrackId) -> Option<i64> {
        self.last_timestamp.get(&track_id).copied()
    }

    /// Accumulated wrap count of one field of a track.
    #[must_use]
    pub fn wraparound_count(&self, track_id: TrackId, field: TimestampField) -> i64 {
        self.wraparound_count
            .get(field)
            .get(&track_id)
            .copied()
            .unwrap_or(0)
    }

    /// Base offset of a track converted into the track's timebase.
    #[must_use]
    pub fn base_timestamp_ticks(&self, track: &Track) -> i64 {
        track
            .timebase
            .micros_to_ticks(self.base_timestamp_us(track.id), self.config.conversion)
    }

    /// Rebase a packet's PTS/DTS onto the track's base offset.
    ///
    /// `max_timestamp` is the wrap modulus of the raw domain (for example
    /// `2^33 - 1` for a 90 kHz MPEG-TS clock). The first call of an epoch
    /// captures the epoch's start timestamp from `dts`.
    pub fn adjust_by_base(
        &mut self,
        track: &Track,
        pts: i64,
        dts: i64,
        max_timestamp: i64,
    ) -> AdjustedTimestamp {
        let id = track.id;
        let timebase = track.timebase;
        let mode = self.config.conversion;

        let start_us = match self.start_timestamp_us {
            Some(start_us) => start_us,
            None => {
                let start_us = timebase.ticks_to_micros(dts, mode);
                self.start_timestamp_us = Some(start_us);
                debug!(
                    target: "provider.timestamp",
                    track_id = %id,
                    dts,
                    timebase = %timebase,
                    start_us,
                    "Captured start timestamp of epoch"
                );
                start_us
            }
        };
        let start_ticks = timebase.micros_to_ticks(start_us, mode);
        let base_ticks = self.base_timestamp_ticks(track);

        let mut final_pts = base_ticks.saturating_add(pts.saturating_sub(start_ticks));
        let mut final_dts = base_ticks.saturating_add(dts.saturating_sub(start_ticks));

        let half_range = max_timestamp / 2;

        // PTS is reordered around B-frames, so a raw PTS from before a wrap can
        // arrive after the wrap was counted.
        let mut reverse_wraparound = false;
        if let Some(&last_pts) = self.last_origin.pts.get(&id) {
            if last_pts.saturating_sub(pts) > half_range {
                *self.wraparound_count.pts.entry(id).or_insert(0) += 1;
                record_wraparound(TimestampField::Pts, "forward");
                warn!(
                    target: "provider.timestamp",
                    track_id = %id,
                    last_pts,
                    pts,
                    "PTS wraparound detected"
                );
            } else if pts.saturating_sub(last_pts) > half_range {
                reverse_wraparound = true;
                record_wraparound(TimestampField::Pts, "reverse");
                warn!(
                    target: "provider.timestamp",
                    track_id = %id,
                    last_pts,
                    pts,
                    "PTS reverse wraparound detected"
                );
            }
        }

        let mut pts_wraps = self.wraparound_count(id, TimestampField::Pts);
        if reverse_wraparound {
            pts_wraps = (pts_wraps - 1).max(0);
        }
        final_pts = final_pts.saturating_add(pts_wraps.saturating_mul(max_timestamp));

        if let Some(&last_dts) = self.last_origin.dts.get(&id) {
            if last_dts.saturating_sub(dts) > half_range {
                *self.wraparound_count.dts.entry(id).or_insert(0) += 1;
                record_wraparound(TimestampField::Dts, "forward");
                warn!(
                    target: "provider.timestamp",
                    track_id = %id,
                    last_dts,
                    dts,
                    "DTS wraparound detected"
                );
            }
        }

        let dts_wraps = self.wraparound_count(id, TimestampField::Dts);
        final_dts = final_dts.saturating_add(dts_wraps.saturating_mul(max_timestamp));

        self.last_timestamp
            .insert(id, timebase.ticks_to_micros(final_dts, mode));

        if !reverse_wraparound {
            self.last_origin.pts.insert(id, pts);
        }
        self.last_origin.dts.insert(id, dts);

        AdjustedTimestamp {
            pts: final_pts,
            dts: final_dts,
        }
    }

    /// Advance the track's running clock by the increment since the last raw
    /// timestamp and return the new clock value.
    ///
    /// The clock starts at zero and stays in the caller's raw units.
    pub fn adjust_by_delta(
        &mut self,
        track_id: TrackId,
        timestamp: i64,
        max_timestamp: i64,
    ) -> i64 {
        let current = self.last_timestamp.get(&track_id).copied().unwrap_or(0);
        let next = current.saturating_add(self.delta(track_id, timestamp, max_timestamp));
        self.last_timestamp.insert(track_id, next);
        next
    }

    /// Increment of `timestamp` over the previous raw timestamp of the track.
    ///
    /// Returns 0 for the first observation. A backward step is a wrap if the
    /// previous value was within the top 0.01% of `max_timestamp`; otherwise
    /// the source restarted and the step is swallowed.
    #[allow(clippy::cast_precision_loss)]
    pub fn delta(&mut self, track_id: TrackId, timestamp: i64, max_timestamp: i64) -> i64 {
        let Some(last) = self.source_timestamp.insert(track_id, timestamp) else {
            debug!(
                target: "provider.timestamp",
                track_id = %track_id,
                timestamp,
                "First timestamp of track"
            );
            return 0;
        };

        if timestamp >= last {
            return timestamp.saturating_sub(last);
        }

        if last as f64 > (max_timestamp as f64 * DELTA_WRAP_THRESHOLD_PERCENT) / 100.0 {
            debug!(
                target: "provider.timestamp",
                track_id = %track_id,
                last,
                timestamp,
                "Wrapped around"
            );
            record_delta_discontinuity("wraparound");
            max_timestamp.saturating_sub(last).saturating_add(timestamp)
        } else {
            debug!(
                target: "provider.timestamp",
                track_id = %track_id,
                last,
                timestamp,
                "Source changed"
            );
            record_delta_discontinuity("source_restart");
            0
        }
    }

    /// Add a reconnect gap to the base offset of every known track.
    pub fn bridge_gap(&mut self, tracks: &impl TrackDirectory, gap_us: i64) {
        for id in tracks.track_ids() {
            let base = self.base_timestamp_us.entry(id).or_insert(0);
            *base = base.saturating_add(gap_us);
        }
    }

    /// End the epoch: anchor the base offset of every known track, silent ones
    /// included, on the smallest last timestamp among known tracks. Also
    /// forget the start timestamp and the delta baselines.
    ///
    /// Returns the anchor, or `None` when no known track has emitted yet (base
    /// offsets are then left untouched).
    pub fn reset(&mut self, tracks: &impl TrackDirectory) -> Option<i64> {
        let anchor = self
            .last_timestamp
            .iter()
            .filter(|(id, _)| tracks.contains(**id))
            .map(|(_, ts)| *ts)
            .min();

        if let Some(anchor) = anchor {
            for id in tracks.track_ids() {
                let previous = self.base_timestamp_us.insert(id, anchor).unwrap_or(0);
                debug!(
                    target: "provider.timestamp",
                    track_id = %id,
                    previous,
                    base = anchor,
                    "Updated base timestamp"
                );
            }
        }

        self.start_timestamp_us = None;
        self.source_timestamp.clear();

        if self.config.clear_wraparound_on_stop {
            self.wraparound_count = PerField::default();
            self.last_origin = PerField::default();
        }

        anchor
    }
}
