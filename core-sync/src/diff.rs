//! # Diff Engine
//!
//! Classifies persisted Songs against a fresh snapshot.
//!
//! Every snapshot track lands in exactly one of `to_update` / `to_create`;
//! every persisted Song lands in exactly one of `to_update` / `to_delete` /
//! `untouched`. Runs in linear time over an id map.

use crate::snapshot::{ExternalTrack, TrackSnapshot};
use core_library::{LibraryTree, SongId};
use std::collections::HashMap;

/// Output of [`diff`].
#[derive(Debug, Clone, Default)]
pub struct MergeDiff {
    /// Persisted Songs still present, paired with their fresh record.
    /// Listed in custom order.
    pub to_update: Vec<(SongId, ExternalTrack)>,
    /// Persisted Songs missing from the snapshot.
    pub to_delete: Vec<SongId>,
    /// Snapshot tracks with no Song yet, in snapshot order.
    pub to_create: Vec<ExternalTrack>,
    /// Persisted Songs whose record was malformed this time round.
    pub untouched: Vec<SongId>,
}

impl MergeDiff {
    pub fn is_noop(&self) -> bool {
        self.to_delete.is_empty() && self.to_create.is_empty()
    }
}

/// Classify `tree`'s Songs against `snapshot`.
pub fn diff(tree: &LibraryTree, snapshot: &TrackSnapshot) -> MergeDiff {
    let mut remaining: HashMap<&str, &ExternalTrack> = snapshot
        .tracks()
        .iter()
        .map(|track| (track.track_id.as_str(), track))
        .collect();

    let mut result = MergeDiff::default();

    for album in tree.albums_in_custom_order() {
        for song_id in tree.song_ids(album) {
            let Some(song) = tree.song(*song_id) else {
                continue;
            };

            if let Some(track) = remaining.remove(song.external_track_id.as_str()) {
                result.to_update.push((song.id, track.clone()));
            } else if snapshot
                .skipped_track_ids()
                .contains(&song.external_track_id)
            {
                result.untouched.push(song.id);
            } else {
                result.to_delete.push(song.id);
            }
        }
    }

    result.to_create = snapshot
        .tracks()
        .iter()
        .filter(|track| remaining.contains_key(track.track_id.as_str()))
        .cloned()
        .collect();

    result
}
