//! # Cleaner / Reindexer
//!
//! Final structural pass of a merge:
//!
//! 1. Delete Songs missing from the snapshot, then Albums left empty, then
//!    Collections left empty.
//! 2. Recompute every Album's release-date estimate from fresh records.
//! 3. On first import, order Albums newest release first with undated Albums
//!    last in their existing relative order.
//! 4. Renumber every level to contiguous `0..n-1`.

use crate::error::Result;
use chrono::{DateTime, Utc};
use core_library::{AlbumId, LibraryTree, SongId};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanOutcome {
    pub songs_deleted: usize,
    pub albums_deleted: usize,
    pub collections_deleted: usize,
    /// Rows whose order index was rewritten.
    pub indices_rewritten: usize,
}

/// Run the cleanup.
///
/// `release_dates` maps external track ids to the release date in their
/// fresh record; tracks without one are absent. `sort_by_release_date`
/// enables the first-import album ordering.
pub fn clean(
    tree: &mut LibraryTree,
    to_delete: &[SongId],
    release_dates: &HashMap<String, DateTime<Utc>>,
    sort_by_release_date: bool,
) -> Result<CleanOutcome> {
    let mut outcome = CleanOutcome::default();

    for song in to_delete {
        if tree.song(*song).is_some() {
            tree.remove_song(*song)?;
            outcome.songs_deleted += 1;
        }
    }

    for album in tree.albums_in_custom_order() {
        if tree.song_ids(album).is_empty() {
            tree.remove_album(album)?;
            outcome.albums_deleted += 1;
        }
    }

    for collection in tree.collection_ids().to_vec() {
        if tree.album_ids(collection).is_empty() {
            tree.remove_collection(collection)?;
            outcome.collections_deleted += 1;
        }
    }

    recompute_release_estimates(tree, release_dates)?;

    if sort_by_release_date {
        sort_albums_by_release(tree)?;
    }

    outcome.indices_rewritten = tree.reindex();

    debug!(
        songs_deleted = outcome.songs_deleted,
        albums_deleted = outcome.albums_deleted,
        collections_deleted = outcome.collections_deleted,
        indices_rewritten = outcome.indices_rewritten,
        "Cleaned library tree"
    );
    Ok(outcome)
}

/// Newest release date among each Album's current Songs.
fn recompute_release_estimates(
    tree: &mut LibraryTree,
    release_dates: &HashMap<String, DateTime<Utc>>,
) -> Result<()> {
    for album in tree.albums_in_custom_order() {
        let estimate = tree
            .song_ids(album)
            .iter()
            .filter_map(|song| tree.song(*song))
            .filter_map(|song| release_dates.get(&song.external_track_id).copied())
            .max();
        tree.set_release_date_estimate(album, estimate)?;
    }
    Ok(())
}

/// Stable sort by estimate descending, then a stable partition that moves
/// undated Albums after dated ones.
fn sort_albums_by_release(tree: &mut LibraryTree) -> Result<()> {
    for collection in tree.collection_ids().to_vec() {
        let estimate = |album: &AlbumId| tree.album(*album).and_then(|a| a.release_date_estimate);

        let mut order = tree.album_ids(collection).to_vec();
        order.sort_by(|a, b| estimate(b).cmp(&estimate(a)));
        let (mut dated, undated): (Vec<AlbumId>, Vec<AlbumId>) =
            order.into_iter().partition(|album| estimate(album).is_some());
        dated.extend(undated);

        tree.reorder_albums(collection, dated)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use core_library::tree::Placement;

    fn date(year: i32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_last_song_removal_cascades() {
        let mut tree = LibraryTree::new();
        let collection = tree.create_collection("");
        let album = tree.create_album(collection, "a1", Placement::Back).unwrap();
        let song = tree.create_song(album, "t1", Placement::Back).unwrap();

        let outcome = clean(&mut tree, &[song], &HashMap::new(), false).unwrap();

        assert_eq!(
            outcome,
            CleanOutcome {
                songs_deleted: 1,
                albums_deleted: 1,
                collections_deleted: 1,
                indices_rewritten: 0,
            }
        );
        assert_eq!(tree.collection_count(), 0);
    }

    #[test]
    fn test_gaps_are_closed() {
        let mut tree = LibraryTree::new();
        let collection = tree.create_collection("");
        let album = tree.create_album(collection, "a1", Placement::Back).unwrap();
        let first = tree.create_song(album, "t1", Placement::Back).unwrap();
        let second = tree.create_song(album, "t2", Placement::Back).unwrap();
        let third = tree.create_song(album, "t3", Placement::Back).unwrap();

        clean(&mut tree, &[first], &HashMap::new(), false).unwrap();

        assert_eq!(tree.song(second).unwrap().index, 0);
        assert_eq!(tree.song(third).unwrap().index, 1);
    }

    #[test]
    fn test_release_estimate_is_newest_song() {
        let mut tree = LibraryTree::new();
        let collection = tree.create_collection("");
        let album = tree.create_album(collection, "a1", Placement::Back).unwrap();
        tree.create_song(album, "t1", Placement::Back).unwrap();
        tree.create_song(album, "t2", Placement::Back).unwrap();
        tree.create_song(album, "t3", Placement::Back).unwrap();
        let dates = HashMap::from([("t1".to_string(), date(1999)), ("t2".to_string(), date(2004))]);

        clean(&mut tree, &[], &dates, false).unwrap();
        assert_eq!(tree.album(album).unwrap().release_date_estimate, Some(date(2004)));

        clean(&mut tree, &[], &HashMap::new(), false).unwrap();
        assert_eq!(tree.album(album).unwrap().release_date_estimate, None);
    }

    #[test]
    fn test_first_import_orders_by_release_with_undated_last() {
        let mut tree = LibraryTree::new();
        let collection = tree.create_collection("");
        let mut dates = HashMap::new();
        for (ext, year) in [("u1", None), ("old", Some(1990)), ("u2", None), ("new", Some(2020))] {
            let album = tree.create_album(collection, ext, Placement::Back).unwrap();
            let track = format!("{}-t", ext);
            tree.create_song(album, track.as_str(), Placement::Back).unwrap();
            if let Some(year) = year {
                dates.insert(track, date(year));
            }
        }

        clean(&mut tree, &[], &dates, true).unwrap();

        let order: Vec<String> = tree
            .album_ids(collection)
            .iter()
            .map(|id| tree.album(*id).unwrap().external_album_id.clone())
            .collect();
        assert_eq!(order, vec!["new", "old", "u1", "u2"]);
        for (position, album) in tree.album_ids(collection).iter().enumerate() {
            assert_eq!(tree.album(*album).unwrap().index, position as i64);
        }
    }
}
