//! # Library Tree
//!
//! Id-indexed arena holding the whole `Collection → Album → Song` hierarchy in
//! memory while a merge runs.
//!
//! ## Overview
//!
//! - Rows live in per-level maps keyed by id.
//! - Each parent owns an ordered `Vec` of child ids. That vector is the source
//!   of truth for ordering; the `index` field on each row mirrors it and may
//!   carry gaps until [`LibraryTree::reindex`] runs.
//! - Every mutation is recorded. [`LibraryTree::pending_changes`] turns the
//!   record into a [`ChangeSet`] that a [`LibraryStore`](crate::LibraryStore)
//!   applies in one commit.
//!
//! ## Usage
//!
//! ```rust
//! use core_library::tree::{LibraryTree, Placement};
//!
//! let mut tree = LibraryTree::new();
//! let collection = tree.create_collection("");
//! let album = tree.create_album(collection, "album-10", Placement::Back)?;
//! tree.create_song(album, "track-1", Placement::Back)?;
//!
//! let changes = tree.pending_changes();
//! assert_eq!(changes.songs.len(), 1);
//! # Ok::<(), core_library::LibraryError>(())
//! ```

use crate::error::{LibraryError, Result};
use crate::models::{Album, AlbumId, Collection, CollectionId, Song, SongId};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

/// Where a new or moved child lands among its siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Index 0; every existing sibling's index is incremented.
    Front,
    /// Index equal to the current child count.
    Back,
}

/// Position of a song in the user's full custom order.
///
/// Compares lexicographically: collection position, then album position
/// within the collection, then song position within the album.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CustomOrderKey {
    pub collection: usize,
    pub album: usize,
    pub song: usize,
}

/// Mutations awaiting a commit.
///
/// Upserts are listed parents first and deletions children first, so a store
/// can apply them in order without violating parent references.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub collections: Vec<Collection>,
    pub albums: Vec<Album>,
    pub songs: Vec<Song>,
    pub deleted_songs: Vec<SongId>,
    pub deleted_albums: Vec<AlbumId>,
    pub deleted_collections: Vec<CollectionId>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
            && self.albums.is_empty()
            && self.songs.is_empty()
            && self.deleted_songs.is_empty()
            && self.deleted_albums.is_empty()
            && self.deleted_collections.is_empty()
    }

    /// Total number of row writes.
    pub fn len(&self) -> usize {
        self.collections.len()
            + self.albums.len()
            + self.songs.len()
            + self.deleted_songs.len()
            + self.deleted_albums.len()
            + self.deleted_collections.len()
    }
}

#[derive(Debug, Clone, Default)]
struct PendingChanges {
    collections: HashSet<CollectionId>,
    albums: HashSet<AlbumId>,
    songs: HashSet<SongId>,
    deleted_collections: HashSet<CollectionId>,
    deleted_albums: HashSet<AlbumId>,
    deleted_songs: HashSet<SongId>,
}

/// In-memory arena of the persisted hierarchy.
#[derive(Debug, Clone, Default)]
pub struct LibraryTree {
    collections: HashMap<CollectionId, Collection>,
    albums: HashMap<AlbumId, Album>,
    songs: HashMap<SongId, Song>,
    collection_order: Vec<CollectionId>,
    collection_albums: HashMap<CollectionId, Vec<AlbumId>>,
    album_songs: HashMap<AlbumId, Vec<SongId>>,
    pending: PendingChanges,
}

impl LibraryTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a tree from persisted rows.
    ///
    /// Siblings are ordered by their stored index; ties fall back to id so the
    /// result is deterministic even for damaged data. The tree starts with no
    /// pending changes.
    ///
    /// # Errors
    ///
    /// [`LibraryError::Corrupt`] when a row references a missing parent.
    pub fn from_rows(
        mut collections: Vec<Collection>,
        mut albums: Vec<Album>,
        mut songs: Vec<Song>,
    ) -> Result<Self> {
        let mut tree = Self::new();

        collections.sort_by(|a, b| a.index.cmp(&b.index).then(a.id.cmp(&b.id)));
        for collection in collections {
            tree.collection_order.push(collection.id);
            tree.collection_albums.insert(collection.id, Vec::new());
            tree.collections.insert(collection.id, collection);
        }

        albums.sort_by(|a, b| a.index.cmp(&b.index).then(a.id.cmp(&b.id)));
        for album in albums {
            let siblings = tree
                .collection_albums
                .get_mut(&album.collection_id)
                .ok_or_else(|| {
                    LibraryError::Corrupt(format!(
                        "album {} references missing collection {}",
                        album.id, album.collection_id
                    ))
                })?;
            siblings.push(album.id);
            tree.album_songs.insert(album.id, Vec::new());
            tree.albums.insert(album.id, album);
        }

        songs.sort_by(|a, b| a.index.cmp(&b.index).then(a.id.cmp(&b.id)));
        for song in songs {
            let siblings = tree.album_songs.get_mut(&song.album_id).ok_or_else(|| {
                LibraryError::Corrupt(format!(
                    "song {} references missing album {}",
                    song.id, song.album_id
                ))
            })?;
            siblings.push(song.id);
            tree.songs.insert(song.id, song);
        }

        Ok(tree)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// True when the tree holds no songs.
    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    pub fn collection_count(&self) -> usize {
        self.collections.len()
    }

    pub fn album_count(&self) -> usize {
        self.albums.len()
    }

    pub fn song_count(&self) -> usize {
        self.songs.len()
    }

    pub fn collection(&self, id: CollectionId) -> Option<&Collection> {
        self.collections.get(&id)
    }

    pub fn album(&self, id: AlbumId) -> Option<&Album> {
        self.albums.get(&id)
    }

    pub fn song(&self, id: SongId) -> Option<&Song> {
        self.songs.get(&id)
    }

    pub fn songs(&self) -> impl Iterator<Item = &Song> {
        self.songs.values()
    }

    pub fn albums(&self) -> impl Iterator<Item = &Album> {
        self.albums.values()
    }

    /// Collections in order.
    pub fn collection_ids(&self) -> &[CollectionId] {
        &self.collection_order
    }

    /// Albums of a collection in order. Empty for unknown ids.
    pub fn album_ids(&self, collection: CollectionId) -> &[AlbumId] {
        self.collection_albums
            .get(&collection)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Songs of an album in order. Empty for unknown ids.
    pub fn song_ids(&self, album: AlbumId) -> &[SongId] {
        self.album_songs
            .get(&album)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every album, walking collections in order and albums within each.
    pub fn albums_in_custom_order(&self) -> Vec<AlbumId> {
        self.collection_order
            .iter()
            .flat_map(|collection| self.album_ids(*collection).iter().copied())
            .collect()
    }

    /// Custom order key for every song, computed in a single pass.
    pub fn custom_order_keys(&self) -> HashMap<SongId, CustomOrderKey> {
        let mut keys = HashMap::with_capacity(self.songs.len());
        for (collection_pos, collection) in self.collection_order.iter().enumerate() {
            for (album_pos, album) in self.album_ids(*collection).iter().enumerate() {
                for (song_pos, song) in self.song_ids(*album).iter().enumerate() {
                    keys.insert(
                        *song,
                        CustomOrderKey {
                            collection: collection_pos,
                            album: album_pos,
                            song: song_pos,
                        },
                    );
                }
            }
        }
        keys
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// Create a collection after every existing one.
    pub fn create_collection(&mut self, title: impl Into<String>) -> CollectionId {
        let collection = Collection::new(title, self.collection_order.len() as i64);
        let id = collection.id;
        self.collection_order.push(id);
        self.collection_albums.insert(id, Vec::new());
        self.collections.insert(id, collection);
        self.pending.collections.insert(id);
        id
    }

    pub fn create_album(
        &mut self,
        collection: CollectionId,
        external_album_id: impl Into<String>,
        placement: Placement,
    ) -> Result<AlbumId> {
        if !self.collections.contains_key(&collection) {
            return Err(LibraryError::not_found("Collection", collection));
        }

        let album = Album::new(collection, external_album_id, 0);
        let id = album.id;
        self.albums.insert(id, album);
        self.album_songs.insert(id, Vec::new());
        self.attach_album(id, collection, placement);
        Ok(id)
    }

    pub fn create_song(
        &mut self,
        album: AlbumId,
        external_track_id: impl Into<String>,
        placement: Placement,
    ) -> Result<SongId> {
        if !self.albums.contains_key(&album) {
            return Err(LibraryError::not_found("Album", album));
        }

        let song = Song::new(album, external_track_id, 0);
        let id = song.id;
        self.songs.insert(id, song);
        self.attach_song(id, album, placement);
        Ok(id)
    }

    // =========================================================================
    // Moves
    // =========================================================================

    /// Move a song into `album`. The album it leaves keeps its index gap.
    pub fn move_song(&mut self, song: SongId, album: AlbumId, placement: Placement) -> Result<()> {
        if !self.albums.contains_key(&album) {
            return Err(LibraryError::not_found("Album", album));
        }
        let previous = self
            .songs
            .get(&song)
            .map(|s| s.album_id)
            .ok_or_else(|| LibraryError::not_found("Song", song))?;

        if let Some(siblings) = self.album_songs.get_mut(&previous) {
            siblings.retain(|id| *id != song);
        }
        self.attach_song(song, album, placement);
        Ok(())
    }

    /// Move an album into `collection`. The collection it leaves keeps its index gap.
    pub fn move_album(
        &mut self,
        album: AlbumId,
        collection: CollectionId,
        placement: Placement,
    ) -> Result<()> {
        if !self.collections.contains_key(&collection) {
            return Err(LibraryError::not_found("Collection", collection));
        }
        let previous = self
            .albums
            .get(&album)
            .map(|a| a.collection_id)
            .ok_or_else(|| LibraryError::not_found("Album", album))?;

        if let Some(siblings) = self.collection_albums.get_mut(&previous) {
            siblings.retain(|id| *id != album);
        }
        self.attach_album(album, collection, placement);
        Ok(())
    }

    /// Replace an album's song order. `order` must be a permutation of its songs.
    ///
    /// Indices are rewritten to match the new order.
    pub fn reorder_songs(&mut self, album: AlbumId, order: Vec<SongId>) -> Result<()> {
        let current = self
            .album_songs
            .get(&album)
            .ok_or_else(|| LibraryError::not_found("Album", album))?;
        if !is_permutation(current, &order) {
            return Err(LibraryError::InvalidInput {
                field: "order".to_string(),
                message: format!("not a permutation of the songs in album {}", album),
            });
        }

        for (position, song) in order.iter().enumerate() {
            self.set_song_index(*song, position as i64);
        }
        self.album_songs.insert(album, order);
        Ok(())
    }

    /// Replace a collection's album order. `order` must be a permutation of its albums.
    pub fn reorder_albums(&mut self, collection: CollectionId, order: Vec<AlbumId>) -> Result<()> {
        let current = self
            .collection_albums
            .get(&collection)
            .ok_or_else(|| LibraryError::not_found("Collection", collection))?;
        if !is_permutation(current, &order) {
            return Err(LibraryError::InvalidInput {
                field: "order".to_string(),
                message: format!("not a permutation of the albums in collection {}", collection),
            });
        }

        for (position, album) in order.iter().enumerate() {
            self.set_album_index(*album, position as i64);
        }
        self.collection_albums.insert(collection, order);
        Ok(())
    }

    // =========================================================================
    // Updates
    // =========================================================================

    /// Returns whether the stored estimate changed.
    pub fn set_release_date_estimate(
        &mut self,
        album: AlbumId,
        estimate: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        let row = self
            .albums
            .get_mut(&album)
            .ok_or_else(|| LibraryError::not_found("Album", album))?;
        if row.release_date_estimate == estimate {
            return Ok(false);
        }
        row.release_date_estimate = estimate;
        self.pending.albums.insert(album);
        Ok(true)
    }

    /// Renumber every level to contiguous `0..n-1` following current order.
    ///
    /// Returns the number of rows whose index changed.
    pub fn reindex(&mut self) -> usize {
        let mut changed = 0;

        let collections = self.collection_order.clone();
        for (position, collection) in collections.iter().enumerate() {
            if self.set_collection_index(*collection, position as i64) {
                changed += 1;
            }

            let albums = self.album_ids(*collection).to_vec();
            for (position, album) in albums.iter().enumerate() {
                if self.set_album_index(*album, position as i64) {
                    changed += 1;
                }

                let songs = self.song_ids(*album).to_vec();
                for (position, song) in songs.iter().enumerate() {
                    if self.set_song_index(*song, position as i64) {
                        changed += 1;
                    }
                }
            }
        }

        changed
    }

    // =========================================================================
    // Removal
    // =========================================================================

    pub fn remove_song(&mut self, song: SongId) -> Result<Song> {
        let row = self
            .songs
            .remove(&song)
            .ok_or_else(|| LibraryError::not_found("Song", song))?;
        if let Some(siblings) = self.album_songs.get_mut(&row.album_id) {
            siblings.retain(|id| *id != song);
        }
        self.pending.songs.remove(&song);
        self.pending.deleted_songs.insert(song);
        Ok(row)
    }

    /// Remove an album together with any songs it still holds.
    pub fn remove_album(&mut self, album: AlbumId) -> Result<Album> {
        if !self.albums.contains_key(&album) {
            return Err(LibraryError::not_found("Album", album));
        }
        for song in self.song_ids(album).to_vec() {
            self.remove_song(song)?;
        }

        let row = self
            .albums
            .remove(&album)
            .ok_or_else(|| LibraryError::not_found("Album", album))?;
        self.album_songs.remove(&album);
        if let Some(siblings) = self.collection_albums.get_mut(&row.collection_id) {
            siblings.retain(|id| *id != album);
        }
        self.pending.albums.remove(&album);
        self.pending.deleted_albums.insert(album);
        Ok(row)
    }

    /// Remove a collection together with any albums it still holds.
    pub fn remove_collection(&mut self, collection: CollectionId) -> Result<Collection> {
        if !self.collections.contains_key(&collection) {
            return Err(LibraryError::not_found("Collection", collection));
        }
        for album in self.album_ids(collection).to_vec() {
            self.remove_album(album)?;
        }

        let row = self
            .collections
            .remove(&collection)
            .ok_or_else(|| LibraryError::not_found("Collection", collection))?;
        self.collection_albums.remove(&collection);
        self.collection_order.retain(|id| *id != collection);
        self.pending.collections.remove(&collection);
        self.pending.deleted_collections.insert(collection);
        Ok(row)
    }

    // =========================================================================
    // Change tracking
    // =========================================================================

    pub fn has_pending_changes(&self) -> bool {
        let p = &self.pending;
        !(p.collections.is_empty()
            && p.albums.is_empty()
            && p.songs.is_empty()
            && p.deleted_collections.is_empty()
            && p.deleted_albums.is_empty()
            && p.deleted_songs.is_empty())
    }

    /// Snapshot of every mutation since the last [`mark_committed`](Self::mark_committed).
    ///
    /// Rows are sorted by id so identical trees yield identical change sets.
    pub fn pending_changes(&self) -> ChangeSet {
        let mut changes = ChangeSet {
            collections: self
                .pending
                .collections
                .iter()
                .filter_map(|id| self.collections.get(id).cloned())
                .collect(),
            albums: self
                .pending
                .albums
                .iter()
                .filter_map(|id| self.albums.get(id).cloned())
                .collect(),
            songs: self
                .pending
                .songs
                .iter()
                .filter_map(|id| self.songs.get(id).cloned())
                .collect(),
            deleted_songs: self.pending.deleted_songs.iter().copied().collect(),
            deleted_albums: self.pending.deleted_albums.iter().copied().collect(),
            deleted_collections: self.pending.deleted_collections.iter().copied().collect(),
        };

        changes.collections.sort_by_key(|c| c.id);
        changes.albums.sort_by_key(|a| a.id);
        changes.songs.sort_by_key(|s| s.id);
        changes.deleted_songs.sort();
        changes.deleted_albums.sort();
        changes.deleted_collections.sort();
        changes
    }

    /// Forget recorded mutations after a successful commit.
    pub fn mark_committed(&mut self) {
        self.pending = PendingChanges::default();
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn attach_song(&mut self, song: SongId, album: AlbumId, placement: Placement) {
        let siblings = self.album_songs.entry(album).or_default().clone();
        let index = match placement {
            Placement::Front => {
                for sibling in &siblings {
                    if let Some(current) = self.songs.get(sibling).map(|s| s.index) {
                        self.set_song_index(*sibling, current + 1);
                    }
                }
                0
            }
            Placement::Back => siblings.len() as i64,
        };

        if let Some(row) = self.songs.get_mut(&song) {
            row.album_id = album;
            row.index = index;
        }
        self.pending.songs.insert(song);

        let list = self.album_songs.entry(album).or_default();
        match placement {
            Placement::Front => list.insert(0, song),
            Placement::Back => list.push(song),
        }
    }

    fn attach_album(&mut self, album: AlbumId, collection: CollectionId, placement: Placement) {
        let siblings = self.collection_albums.entry(collection).or_default().clone();
        let index = match placement {
            Placement::Front => {
                for sibling in &siblings {
                    if let Some(current) = self.albums.get(sibling).map(|a| a.index) {
                        self.set_album_index(*sibling, current + 1);
                    }
                }
                0
            }
            Placement::Back => siblings.len() as i64,
        };

        if let Some(row) = self.albums.get_mut(&album) {
            row.collection_id = collection;
            row.index = index;
        }
        self.pending.albums.insert(album);

        let list = self.collection_albums.entry(collection).or_default();
        match placement {
            Placement::Front => list.insert(0, album),
            Placement::Back => list.push(album),
        }
    }

    fn set_collection_index(&mut self, collection: CollectionId, index: i64) -> bool {
        match self.collections.get_mut(&collection) {
            Some(row) if row.index != index => {
                row.index = index;
                self.pending.collections.insert(collection);
                true
            }
            _ => false,
        }
    }

    fn set_album_index(&mut self, album: AlbumId, index: i64) -> bool {
        match self.albums.get_mut(&album) {
            Some(row) if row.index != index => {
                row.index = index;
                self.pending.albums.insert(album);
                true
            }
            _ => false,
        }
    }

    fn set_song_index(&mut self, song: SongId, index: i64) -> bool {
        match self.songs.get_mut(&song) {
            Some(row) if row.index != index => {
                row.index = index;
                self.pending.songs.insert(song);
                true
            }
            _ => false,
        }
    }
}

fn is_permutation<T: Copy + Eq + std::hash::Hash>(current: &[T], proposed: &[T]) -> bool {
    if current.len() != proposed.len() {
        return false;
    }
    let expected: HashSet<T> = current.iter().copied().collect();
    let mut seen = HashSet::with_capacity(proposed.len());
    proposed
        .iter()
        .all(|id| expected.contains(id) && seen.insert(*id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indices(tree: &LibraryTree, album: AlbumId) -> Vec<i64> {
        tree.song_ids(album)
            .iter()
            .map(|id| tree.song(*id).unwrap().index)
            .collect()
    }

    fn tree_with_album(tracks: &[&str]) -> (LibraryTree, CollectionId, AlbumId) {
        let mut tree = LibraryTree::new();
        let collection = tree.create_collection("");
        let album = tree.create_album(collection, "album-10", Placement::Back).unwrap();
        for track in tracks {
            tree.create_song(album, *track, Placement::Back).unwrap();
        }
        (tree, collection, album)
    }

    #[test]
    fn test_append_uses_current_count() {
        let (tree, _, album) = tree_with_album(&["t1", "t2", "t3"]);
        assert_eq!(indices(&tree, album), vec![0, 1, 2]);
    }

    #[test]
    fn test_prepend_increments_siblings() {
        let (mut tree, _, album) = tree_with_album(&["t1", "t2"]);
        let front = tree.create_song(album, "t0", Placement::Front).unwrap();

        assert_eq!(tree.song_ids(album)[0], front);
        assert_eq!(indices(&tree, album), vec![0, 1, 2]);
    }

    #[test]
    fn test_move_song_leaves_gap_until_reindex() {
        let (mut tree, collection, album) = tree_with_album(&["t1", "t2", "t3"]);
        let other = tree.create_album(collection, "album-20", Placement::Back).unwrap();
        let middle = tree.song_ids(album)[1];

        tree.move_song(middle, other, Placement::Back).unwrap();

        assert_eq!(indices(&tree, album), vec![0, 2]);
        assert_eq!(tree.song(middle).unwrap().album_id, other);
        assert_eq!(tree.song(middle).unwrap().index, 0);

        assert_eq!(tree.reindex(), 1);
        assert_eq!(indices(&tree, album), vec![0, 1]);
    }

    #[test]
    fn test_create_album_at_front() {
        let (mut tree, collection, first) = tree_with_album(&[]);
        let second = tree.create_album(collection, "album-20", Placement::Front).unwrap();

        assert_eq!(tree.album_ids(collection), &[second, first]);
        assert_eq!(tree.album(second).unwrap().index, 0);
        assert_eq!(tree.album(first).unwrap().index, 1);
    }

    #[test]
    fn test_remove_collection_cascades() {
        let (mut tree, collection, album) = tree_with_album(&["t1", "t2"]);
        tree.mark_committed();

        tree.remove_collection(collection).unwrap();

        assert_eq!(tree.collection_count(), 0);
        assert_eq!(tree.album_count(), 0);
        assert!(tree.is_empty());
        let changes = tree.pending_changes();
        assert_eq!(changes.deleted_songs.len(), 2);
        assert_eq!(changes.deleted_albums, vec![album]);
        assert_eq!(changes.deleted_collections, vec![collection]);
        assert!(changes.songs.is_empty());
    }

    #[test]
    fn test_reorder_rejects_non_permutation() {
        let (mut tree, _, album) = tree_with_album(&["t1", "t2"]);
        let ids = tree.song_ids(album).to_vec();

        let err = tree.reorder_songs(album, vec![ids[0], ids[0]]).unwrap_err();
        assert!(matches!(err, LibraryError::InvalidInput { .. }));

        tree.reorder_songs(album, vec![ids[1], ids[0]]).unwrap();
        assert_eq!(tree.song_ids(album), &[ids[1], ids[0]]);
        assert_eq!(indices(&tree, album), vec![0, 1]);
    }

    #[test]
    fn test_from_rows_orders_by_index_and_is_clean() {
        let collection = Collection::new("", 0);
        let album = Album::new(collection.id, "album-10", 0);
        let late = Song::new(album.id, "t2", 5);
        let early = Song::new(album.id, "t1", 1);

        let tree = LibraryTree::from_rows(
            vec![collection],
            vec![album.clone()],
            vec![late.clone(), early.clone()],
        )
        .unwrap();

        assert_eq!(tree.song_ids(album.id), &[early.id, late.id]);
        assert!(!tree.has_pending_changes());
    }

    #[test]
    fn test_from_rows_rejects_orphans() {
        let album = Album::new(CollectionId::new(), "album-10", 0);
        let result = LibraryTree::from_rows(vec![], vec![album], vec![]);
        assert!(matches!(result, Err(LibraryError::Corrupt(_))));
    }

    #[test]
    fn test_release_date_estimate_only_dirty_on_change() {
        let (mut tree, _, album) = tree_with_album(&[]);
        tree.mark_committed();

        assert!(!tree.set_release_date_estimate(album, None).unwrap());
        assert!(!tree.has_pending_changes());

        let date = Utc::now();
        assert!(tree.set_release_date_estimate(album, Some(date)).unwrap());
        assert_eq!(tree.pending_changes().albums.len(), 1);
    }

    #[test]
    fn test_custom_order_keys() {
        let (mut tree, collection, first) = tree_with_album(&["t1", "t2"]);
        let second = tree.create_album(collection, "album-20", Placement::Back).unwrap();
        let song = tree.create_song(second, "t3", Placement::Back).unwrap();

        let keys = tree.custom_order_keys();
        let first_song = tree.song_ids(first)[1];
        assert_eq!(
            keys[&first_song],
            CustomOrderKey { collection: 0, album: 0, song: 1 }
        );
        assert_eq!(keys[&song], CustomOrderKey { collection: 0, album: 1, song: 0 });
        assert!(keys[&first_song] < keys[&song]);
    }

    #[test]
    fn test_mark_committed_clears_changes() {
        let (mut tree, _, _) = tree_with_album(&["t1"]);
        assert_eq!(tree.pending_changes().len(), 3);

        tree.mark_committed();
        assert!(tree.pending_changes().is_empty());
    }
}
