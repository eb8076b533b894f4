//! Tracks and the per-stream track directory.

use crate::packet::MediaType;
use crate::timebase::Timebase;
use common::types::TrackId;
use std::collections::BTreeMap;

/// A single elementary track of a stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    /// Track identifier, unique within the stream
    pub id: TrackId,
    /// Kind of media carried by the track
    pub media_type: MediaType,
    /// Unit of the track's raw timestamps
    pub timebase: Timebase,
}

impl Track {
    /// Create a new track
    #[must_use]
    pub const fn new(id: TrackId, media_type: MediaType, timebase: Timebase) -> Self {
        Self {
            id,
            media_type,
            timebase,
        }
    }
}

/// Lookup of the tracks known to a stream.
///
/// Timestamp state is only ever kept for ids this directory resolves.
pub trait TrackDirectory {
    /// Look up a track by id
    fn track(&self, id: TrackId) -> Option<&Track>;

    /// First track (lowest id) carrying the given media type
    fn first_track_by_type(&self, media_type: MediaType) -> Option<&Track>;

    /// All known track ids
    fn track_ids(&self) -> Vec<TrackId>;

    /// Whether the id resolves to a track
    fn contains(&self, id: TrackId) -> bool {
        self.track(id).is_some()
    }
}

/// Ordered, id-indexed set of tracks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackSet {
    tracks: BTreeMap<TrackId, Track>,
}

impl TrackSet {
    /// Create an empty track set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a track, returning the track it replaced if the id was taken
    pub fn add_track(&mut self, track: Track) -> Option<Track> {
        self.tracks.insert(track.id, track)
    }

    /// Number of tracks
    #[must_use]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// Whether the set has no tracks
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Iterate tracks in id order
    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values()
    }
}

impl<'a> IntoIterator for &'a TrackSet {
    type Item = &'a Track;
    type IntoIter = std::collections::btree_map::Values<'a, TrackId, Track>;

    fn into_iter(self) -> Self::IntoIter {
        self.tracks.values()
    }
}

impl FromIterator<Track> for TrackSet {
    fn from_iter<I: IntoIterator<Item = Track>>(iter: I) -> Self {
        let mut set = Self::new();
        for track in iter {
            set.add_track(track);
        }
        set
    }
}

impl TrackDirectory for TrackSet {
    fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.get(&id)
    }

    fn first_track_by_type(&self, media_type: MediaType) -> Option<&Track> {
        self.tracks.values().find(|t| t.media_type == media_type)
    }

    fn track_ids(&self) -> Vec<TrackId> {
        self.tracks.keys().copied().collect()
    }
}
