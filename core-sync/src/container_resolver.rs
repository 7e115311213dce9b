//! # Container Resolver
//!
//! Repairs containers that should not coexist:
//!
//! 1. [`consolidate_collections`] folds every Collection after the first into
//!    the first one.
//! 2. [`resolve_duplicate_albums`] picks, for each external album id, the
//!    topmost Album in custom order as canonical and relocates Songs from the
//!    other Albums sharing that id onto its tail.
//!
//! The canonical map is returned for the Album Migration Mover to reuse.

use crate::error::Result;
use core_library::tree::Placement;
use core_library::{AlbumId, LibraryTree, SongId};
use std::collections::HashMap;
use tracing::{debug, info};

/// External album id → canonical Album.
pub type CanonicalAlbums = HashMap<String, AlbumId>;

#[derive(Debug, Clone, Default)]
pub struct ResolveOutcome {
    pub canonical: CanonicalAlbums,
    /// Songs moved onto a canonical Album.
    pub songs_relocated: usize,
    /// Duplicate Albums removed after being emptied.
    pub albums_deleted: usize,
}

/// Move every Album into the first Collection, preserving order, and delete
/// the emptied Collections. Returns how many Collections were removed.
pub fn consolidate_collections(tree: &mut LibraryTree) -> Result<usize> {
    let collections = tree.collection_ids().to_vec();
    let Some((first, rest)) = collections.split_first() else {
        return Ok(0);
    };

    for collection in rest {
        for album in tree.album_ids(*collection).to_vec() {
            tree.move_album(album, *first, Placement::Back)?;
        }
        tree.remove_collection(*collection)?;
    }

    if !rest.is_empty() {
        info!(merged = rest.len(), "Consolidated legacy collections");
    }
    Ok(rest.len())
}

/// Canonical Album per external id: the first one met in custom order.
pub fn canonical_albums(tree: &LibraryTree) -> CanonicalAlbums {
    let mut canonical = CanonicalAlbums::new();
    for album in tree.albums_in_custom_order() {
        if let Some(row) = tree.album(album) {
            canonical
                .entry(row.external_album_id.clone())
                .or_insert(album);
        }
    }
    canonical
}

/// Merge duplicate Albums.
///
/// `songs` are the Songs that survive this merge (updated or untouched).
/// Those sitting in a non-canonical Album are appended to the canonical one
/// in custom order; duplicates left empty are deleted. Index gaps remain for
/// the Cleaner to close.
pub fn resolve_duplicate_albums(tree: &mut LibraryTree, songs: &[SongId]) -> Result<ResolveOutcome> {
    let canonical = canonical_albums(tree);

    let mut marked: Vec<(SongId, AlbumId)> = songs
        .iter()
        .filter_map(|song| {
            let album = tree.album(tree.song(*song)?.album_id)?;
            let target = *canonical.get(&album.external_album_id)?;
            (target != album.id).then_some((*song, target))
        })
        .collect();

    if marked.is_empty() {
        return Ok(ResolveOutcome {
            canonical,
            ..Default::default()
        });
    }

    let keys = tree.custom_order_keys();
    marked.sort_by_key(|(song, _)| keys.get(song).copied());

    let mut sources = Vec::new();
    for (song, target) in &marked {
        if let Some(source) = tree.song(*song).map(|s| s.album_id) {
            if !sources.contains(&source) {
                sources.push(source);
            }
        }
        tree.move_song(*song, *target, Placement::Back)?;
    }

    let mut albums_deleted = 0;
    for source in sources {
        if tree.song_ids(source).is_empty() {
            tree.remove_album(source)?;
            albums_deleted += 1;
        }
    }

    debug!(
        relocated = marked.len(),
        albums_deleted, "Resolved duplicate albums"
    );

    Ok(ResolveOutcome {
        canonical,
        songs_relocated: marked.len(),
        albums_deleted,
    })
}
