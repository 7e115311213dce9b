//! # Creator
//!
//! Materializes Songs, and Albums/Collections as needed, for snapshot tracks
//! that have no Song yet.
//!
//! ## Group order
//!
//! New tracks are grouped by external album id.
//!
//! - **First import** (the store held no songs): groups are sorted by
//!   album artist ([`finder_cmp`]), then earliest release date (undated
//!   last), then external album id. New Albums are appended.
//! - **Incremental import**: groups are sorted by earliest date added,
//!   ascending, and each new Album is inserted at the top. The most recently
//!   added album ends up first.
//!
//! ## Within a group
//!
//! An existing Album receives the new Songs as a block at its top. If the
//! Album was in default order beforehand, the whole Album is then re-sorted
//! by default order; a user-arranged Album is left as arranged. A new Album
//! receives its Songs already in default order.

use crate::container_resolver::CanonicalAlbums;
use crate::error::Result;
use crate::ordering::{default_order_cmp, finder_cmp, is_in_default_order};
use crate::snapshot::ExternalTrack;
use chrono::{DateTime, Utc};
use core_library::tree::Placement;
use core_library::{AlbumId, CollectionId, LibraryTree, SongId};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CreateOutcome {
    pub songs_created: usize,
    pub albums_created: usize,
    pub collections_created: usize,
}

/// New tracks sharing one external album id.
#[derive(Debug)]
struct AlbumGroup {
    external_album_id: String,
    tracks: Vec<ExternalTrack>,
}

impl AlbumGroup {
    fn sort_artist(&self) -> &str {
        self.tracks
            .iter()
            .map(ExternalTrack::sort_artist)
            .find(|artist| !artist.is_empty())
            .unwrap_or("")
    }

    fn earliest_release(&self) -> Option<DateTime<Utc>> {
        self.tracks.iter().filter_map(|t| t.release_date).min()
    }

    fn earliest_added(&self) -> Option<DateTime<Utc>> {
        self.tracks.iter().map(|t| t.date_added).min()
    }
}

fn group_by_album(to_create: Vec<ExternalTrack>) -> Vec<AlbumGroup> {
    let mut groups: Vec<AlbumGroup> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for track in to_create {
        match positions.get(&track.album_id) {
            Some(position) => groups[*position].tracks.push(track),
            None => {
                positions.insert(track.album_id.clone(), groups.len());
                groups.push(AlbumGroup {
                    external_album_id: track.album_id.clone(),
                    tracks: vec![track],
                });
            }
        }
    }

    groups
}

/// Dated before undated, earlier dates first.
fn earliest_first(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn first_import_cmp(a: &AlbumGroup, b: &AlbumGroup) -> Ordering {
    finder_cmp(a.sort_artist(), b.sort_artist())
        .then_with(|| earliest_first(a.earliest_release(), b.earliest_release()))
        .then_with(|| a.external_album_id.cmp(&b.external_album_id))
}

fn incremental_cmp(a: &AlbumGroup, b: &AlbumGroup) -> Ordering {
    earliest_first(a.earliest_added(), b.earliest_added())
        .then_with(|| a.external_album_id.cmp(&b.external_album_id))
}

/// Create Songs for `to_create`.
///
/// `known_records` maps surviving Songs to their fresh record; a surviving
/// Song without one counts as out of default order. `doomed` lists Songs the
/// Cleaner will delete. `canonical` resolves existing Albums and gains an
/// entry for each Album created here.
pub fn create_missing(
    tree: &mut LibraryTree,
    to_create: Vec<ExternalTrack>,
    known_records: &HashMap<SongId, ExternalTrack>,
    doomed: &HashSet<SongId>,
    canonical: &mut CanonicalAlbums,
    first_import: bool,
) -> Result<CreateOutcome> {
    let mut outcome = CreateOutcome::default();
    if to_create.is_empty() {
        return Ok(outcome);
    }

    let collection = match tree.collection_ids().first() {
        Some(collection) => *collection,
        None => {
            outcome.collections_created += 1;
            tree.create_collection("")
        }
    };

    let mut groups = group_by_album(to_create);
    if first_import {
        groups.sort_by(first_import_cmp);
    } else {
        groups.sort_by(incremental_cmp);
    }

    for mut group in groups {
        group.tracks.sort_by(default_order_cmp);
        outcome.songs_created += group.tracks.len();

        let existing = canonical
            .get(&group.external_album_id)
            .copied()
            .filter(|album| tree.album(*album).is_some());

        match existing {
            Some(album) => {
                prepend_to_existing(tree, album, group.tracks, known_records, doomed)?
            }
            None => {
                let placement = if first_import {
                    Placement::Back
                } else {
                    Placement::Front
                };
                let album = create_album_with(tree, collection, &group, placement)?;
                canonical.insert(group.external_album_id.clone(), album);
                outcome.albums_created += 1;
            }
        }
    }

    debug!(
        songs_created = outcome.songs_created,
        albums_created = outcome.albums_created,
        first_import,
        "Created missing songs"
    );
    Ok(outcome)
}

fn create_album_with(
    tree: &mut LibraryTree,
    collection: CollectionId,
    group: &AlbumGroup,
    placement: Placement,
) -> Result<AlbumId> {
    let album = tree.create_album(collection, group.external_album_id.as_str(), placement)?;
    for track in &group.tracks {
        tree.create_song(album, track.track_id.as_str(), Placement::Back)?;
    }
    Ok(album)
}

/// `tracks` must already be in default order.
///
/// Songs in `doomed` are about to be deleted and do not count when deciding
/// whether the Album is in default order.
fn prepend_to_existing(
    tree: &mut LibraryTree,
    album: AlbumId,
    tracks: Vec<ExternalTrack>,
    known_records: &HashMap<SongId, ExternalTrack>,
    doomed: &HashSet<SongId>,
) -> Result<()> {
    let mut existing: Vec<(SongId, &ExternalTrack)> = Vec::new();
    let mut leaving = Vec::new();
    let mut fully_known = true;
    for song in tree.song_ids(album) {
        if let Some(record) = known_records.get(song) {
            existing.push((*song, record));
        } else if doomed.contains(song) {
            leaving.push(*song);
        } else {
            fully_known = false;
        }
    }

    let was_default_order = fully_known && {
        let records: Vec<&ExternalTrack> = existing.iter().map(|(_, record)| *record).collect();
        is_in_default_order(&records)
    };

    let mut created = Vec::with_capacity(tracks.len());
    for track in tracks.iter().rev() {
        let song = tree.create_song(album, track.track_id.as_str(), Placement::Front)?;
        created.push((song, track));
    }

    if was_default_order {
        let mut everything: Vec<(SongId, &ExternalTrack)> = created;
        everything.extend(existing);
        everything.sort_by(|(_, a), (_, b)| default_order_cmp(a, b));

        let mut order: Vec<SongId> = everything.into_iter().map(|(song, _)| song).collect();
        order.extend(leaving);
        tree.reorder_songs(album, order)?;
    }

    Ok(())
}
