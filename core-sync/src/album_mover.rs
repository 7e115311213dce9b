//! # Album Migration Mover
//!
//! Relocates Songs whose fresh record names a different external album id
//! than their current Album.
//!
//! Songs are sorted by custom order and processed back to front, each one
//! prepended to its destination. Processing in reverse keeps their original
//! relative order at the top of the destination.
//!
//! A destination is the Album already known for the target id (pre-existing
//! or created earlier in this pass). Otherwise a new Album is created at the
//! top of the Song's current Collection and remembered.

use crate::container_resolver::CanonicalAlbums;
use crate::error::Result;
use crate::snapshot::ExternalTrack;
use core_library::tree::Placement;
use core_library::{LibraryTree, SongId};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MoveOutcome {
    pub songs_moved: usize,
    pub albums_created: usize,
}

/// Move reassigned Songs. `canonical` gains an entry for every new Album.
pub fn migrate_albums(
    tree: &mut LibraryTree,
    to_update: &[(SongId, ExternalTrack)],
    canonical: &mut CanonicalAlbums,
) -> Result<MoveOutcome> {
    let mut reassigned: Vec<(SongId, &str)> = to_update
        .iter()
        .filter_map(|(song, record)| {
            let album = tree.album(tree.song(*song)?.album_id)?;
            (album.external_album_id != record.album_id).then_some((*song, record.album_id.as_str()))
        })
        .collect();

    if reassigned.is_empty() {
        return Ok(MoveOutcome::default());
    }

    let keys = tree.custom_order_keys();
    reassigned.sort_by_key(|(song, _)| keys.get(song).copied());

    let mut outcome = MoveOutcome::default();
    for (song, target) in reassigned.into_iter().rev() {
        let destination = match canonical.get(target) {
            Some(album) => *album,
            None => {
                let Some(collection) = tree
                    .song(song)
                    .and_then(|s| tree.album(s.album_id))
                    .map(|a| a.collection_id)
                else {
                    continue;
                };
                let album = tree.create_album(collection, target, Placement::Front)?;
                canonical.insert(target.to_string(), album);
                outcome.albums_created += 1;
                album
            }
        };

        tree.move_song(song, destination, Placement::Front)?;
        outcome.songs_moved += 1;
    }

    debug!(
        moved = outcome.songs_moved,
        albums_created = outcome.albums_created,
        "Migrated reassigned songs"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container_resolver::canonical_albums;
    use chrono::{TimeZone, Utc};

    fn record(track: &str, album: &str) -> ExternalTrack {
        ExternalTrack {
            track_id: track.to_string(),
            album_id: album.to_string(),
            disc_number: None,
            track_number: None,
            title: track.to_string(),
            artist: String::new(),
            album_artist: None,
            date_added: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            release_date: None,
        }
    }

    #[test]
    fn test_reassigned_song_gets_new_album_at_top() {
        let mut tree = LibraryTree::new();
        let collection = tree.create_collection("");
        let album = tree.create_album(collection, "10", Placement::Back).unwrap();
        let s1 = tree.create_song(album, "s1", Placement::Back).unwrap();
        let s2 = tree.create_song(album, "s2", Placement::Back).unwrap();
        let mut canonical = canonical_albums(&tree);

        let updates = vec![(s1, record("s1", "20")), (s2, record("s2", "10"))];
        let outcome = migrate_albums(&mut tree, &updates, &mut canonical).unwrap();

        assert_eq!(outcome, MoveOutcome { songs_moved: 1, albums_created: 1 });
        let created = canonical["20"];
        assert_eq!(tree.album_ids(collection), &[created, album]);
        assert_eq!(tree.song_ids(created), &[s1]);
        assert_eq!(tree.song_ids(album), &[s2]);
    }

    #[test]
    fn test_moved_songs_keep_relative_order() {
        let mut tree = LibraryTree::new();
        let collection = tree.create_collection("");
        let source = tree.create_album(collection, "10", Placement::Back).unwrap();
        let target = tree.create_album(collection, "20", Placement::Back).unwrap();
        let existing = tree.create_song(target, "e1", Placement::Back).unwrap();
        let a = tree.create_song(source, "a", Placement::Back).unwrap();
        let b = tree.create_song(source, "b", Placement::Back).unwrap();
        let c = tree.create_song(source, "c", Placement::Back).unwrap();
        let mut canonical = canonical_albums(&tree);

        let updates = vec![
            (c, record("c", "20")),
            (a, record("a", "20")),
            (b, record("b", "20")),
        ];
        migrate_albums(&mut tree, &updates, &mut canonical).unwrap();

        assert_eq!(tree.song_ids(target), &[a, b, c, existing]);
        assert!(tree.song_ids(source).is_empty());
    }

    #[test]
    fn test_second_song_reuses_album_created_in_pass() {
        let mut tree = LibraryTree::new();
        let collection = tree.create_collection("");
        let album = tree.create_album(collection, "10", Placement::Back).unwrap();
        let s1 = tree.create_song(album, "s1", Placement::Back).unwrap();
        let s2 = tree.create_song(album, "s2", Placement::Back).unwrap();
        let mut canonical = canonical_albums(&tree);

        let updates = vec![(s1, record("s1", "30")), (s2, record("s2", "30"))];
        let outcome = migrate_albums(&mut tree, &updates, &mut canonical).unwrap();

        assert_eq!(outcome.albums_created, 1);
        assert_eq!(tree.song_ids(canonical["30"]), &[s1, s2]);
    }
}
