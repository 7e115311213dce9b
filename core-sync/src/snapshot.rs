//! # Track Snapshot
//!
//! Validated view of one fetch from the Track Source.
//!
//! Raw [`TrackRecord`]s carry optional fields. Records missing a required
//! field are skipped for this merge; their track ids (when known) are kept so
//! the matching Songs are left untouched rather than deleted.

use crate::error::{Result, SyncError};
use bridge_traits::{TrackRecord, UNKNOWN_NUMBER};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::{debug, warn};

/// A track record with every required field present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalTrack {
    pub track_id: String,
    pub album_id: String,
    /// `None` when the host reported no disc number or the unknown sentinel
    pub disc_number: Option<u32>,
    /// `None` when the host reported no track number or the unknown sentinel
    pub track_number: Option<u32>,
    pub title: String,
    /// Empty when unknown
    pub artist: String,
    pub album_artist: Option<String>,
    pub date_added: DateTime<Utc>,
    pub release_date: Option<DateTime<Utc>>,
}

impl ExternalTrack {
    /// Artist used to order albums on first import.
    ///
    /// Album artist when present, track artist otherwise.
    pub fn sort_artist(&self) -> &str {
        match self.album_artist.as_deref() {
            Some(artist) if !artist.trim().is_empty() => artist,
            _ => &self.artist,
        }
    }
}

fn known_number(value: Option<u32>) -> Option<u32> {
    value.filter(|n| *n != UNKNOWN_NUMBER)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

impl TryFrom<TrackRecord> for ExternalTrack {
    type Error = SyncError;

    fn try_from(record: TrackRecord) -> Result<Self> {
        let track_id = non_blank(record.track_id);
        let missing = |field: &str| SyncError::MalformedRecord {
            track_id: track_id.clone(),
            field: field.to_string(),
        };

        let album_id = non_blank(record.album_id).ok_or_else(|| missing("album_id"))?;
        let title = non_blank(record.title).ok_or_else(|| missing("title"))?;
        let date_added = record.date_added.ok_or_else(|| missing("date_added"))?;
        let track_id = track_id.clone().ok_or_else(|| missing("track_id"))?;

        Ok(Self {
            track_id,
            album_id,
            disc_number: known_number(record.disc_number),
            track_number: known_number(record.track_number),
            title,
            artist: record.artist.unwrap_or_default(),
            album_artist: non_blank(record.album_artist),
            date_added,
            release_date: record.release_date,
        })
    }
}

/// Validated snapshot, in source order.
#[derive(Debug, Clone, Default)]
pub struct TrackSnapshot {
    tracks: Vec<ExternalTrack>,
    skipped_track_ids: HashSet<String>,
    skipped: usize,
}

impl TrackSnapshot {
    /// Validate raw records.
    ///
    /// Malformed records are skipped. When a track id repeats, the first
    /// valid occurrence wins.
    pub fn from_records(records: Vec<TrackRecord>) -> Self {
        let mut snapshot = Self::default();
        let mut seen = HashSet::with_capacity(records.len());

        for record in records {
            match ExternalTrack::try_from(record) {
                Ok(track) => {
                    if seen.insert(track.track_id.clone()) {
                        snapshot.tracks.push(track);
                    } else {
                        warn!(track_id = %track.track_id, "Duplicate track id in snapshot, keeping first");
                        snapshot.skipped += 1;
                    }
                }
                Err(SyncError::MalformedRecord { track_id, field }) => {
                    debug!(?track_id, %field, "Skipping malformed track record");
                    if let Some(id) = track_id {
                        snapshot.skipped_track_ids.insert(id);
                    }
                    snapshot.skipped += 1;
                }
                Err(other) => {
                    warn!(error = %other, "Skipping unreadable track record");
                    snapshot.skipped += 1;
                }
            }
        }

        // A later valid record vouches for the id.
        let valid = &seen;
        snapshot.skipped_track_ids.retain(|id| !valid.contains(id));
        snapshot
    }

    pub fn tracks(&self) -> &[ExternalTrack] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Ids of malformed records. Songs with these ids are kept as they are.
    pub fn skipped_track_ids(&self) -> &HashSet<String> {
        &self.skipped_track_ids
    }

    /// Number of records dropped for any reason.
    pub fn skipped_count(&self) -> usize {
        self.skipped
    }
}

impl From<Vec<ExternalTrack>> for TrackSnapshot {
    fn from(tracks: Vec<ExternalTrack>) -> Self {
        Self {
            tracks,
            skipped_track_ids: HashSet::new(),
            skipped: 0,
        }
    }
}
