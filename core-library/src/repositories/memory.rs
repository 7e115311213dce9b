//! In-memory LibraryStore
//!
//! Keeps rows in hash maps behind a `tokio::sync::RwLock`. Used by tests and
//! by hosts that do not need persistence across launches.

use crate::error::{LibraryError, Result};
use crate::models::{Album, AlbumId, Collection, CollectionId, Song, SongId};
use crate::repositories::LibraryStore;
use crate::tree::{ChangeSet, LibraryTree};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

#[derive(Debug, Default, Clone)]
struct Rows {
    collections: HashMap<CollectionId, Collection>,
    albums: HashMap<AlbumId, Album>,
    songs: HashMap<SongId, Song>,
}

impl Rows {
    fn apply(&mut self, changes: &ChangeSet) {
        for collection in &changes.collections {
            self.collections.insert(collection.id, collection.clone());
        }
        for album in &changes.albums {
            self.albums.insert(album.id, album.clone());
        }
        for song in &changes.songs {
            self.songs.insert(song.id, song.clone());
        }
        for id in &changes.deleted_songs {
            self.songs.remove(id);
        }
        for id in &changes.deleted_albums {
            self.albums.remove(id);
        }
        for id in &changes.deleted_collections {
            self.collections.remove(id);
        }
    }

    /// Same guarantees the SQL schema enforces.
    fn check_integrity(&self) -> Result<()> {
        for album in self.albums.values() {
            if !self.collections.contains_key(&album.collection_id) {
                return Err(LibraryError::Corrupt(format!(
                    "album {} references missing collection {}",
                    album.id, album.collection_id
                )));
            }
        }

        let mut external_ids = HashSet::with_capacity(self.songs.len());
        for song in self.songs.values() {
            if !self.albums.contains_key(&song.album_id) {
                return Err(LibraryError::Corrupt(format!(
                    "song {} references missing album {}",
                    song.id, song.album_id
                )));
            }
            if !external_ids.insert(song.external_track_id.as_str()) {
                return Err(LibraryError::InvalidInput {
                    field: "external_track_id".to_string(),
                    message: format!("duplicate external track id {}", song.external_track_id),
                });
            }
        }
        Ok(())
    }
}

/// LibraryStore backed by process memory.
#[derive(Debug, Default)]
pub struct InMemoryLibraryStore {
    rows: RwLock<Rows>,
}

impl InMemoryLibraryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with rows, bypassing the merge engine.
    ///
    /// Useful for reproducing legacy states such as duplicate albums or
    /// several collections.
    pub async fn seed(&self, collections: Vec<Collection>, albums: Vec<Album>, songs: Vec<Song>) {
        let mut rows = self.rows.write().await;
        rows.collections.extend(collections.into_iter().map(|c| (c.id, c)));
        rows.albums.extend(albums.into_iter().map(|a| (a.id, a)));
        rows.songs.extend(songs.into_iter().map(|s| (s.id, s)));
    }
}

#[async_trait]
impl LibraryStore for InMemoryLibraryStore {
    async fn load_tree(&self) -> Result<LibraryTree> {
        let rows = self.rows.read().await;
        LibraryTree::from_rows(
            rows.collections.values().cloned().collect(),
            rows.albums.values().cloned().collect(),
            rows.songs.values().cloned().collect(),
        )
    }

    async fn commit(&self, changes: &ChangeSet) -> Result<()> {
        let mut rows = self.rows.write().await;

        // Stage on a copy so a rejected commit leaves the store untouched.
        let mut staged = rows.clone();
        staged.apply(changes);
        staged.check_integrity()?;

        *rows = staged;
        Ok(())
    }

    async fn collections(&self) -> Result<Vec<Collection>> {
        let rows = self.rows.read().await;
        let mut collections: Vec<Collection> = rows.collections.values().cloned().collect();
        collections.sort_by(|a, b| a.index.cmp(&b.index).then(a.id.cmp(&b.id)));
        Ok(collections)
    }

    async fn albums_in(&self, collection: CollectionId) -> Result<Vec<Album>> {
        let rows = self.rows.read().await;
        let mut albums: Vec<Album> = rows
            .albums
            .values()
            .filter(|a| a.collection_id == collection)
            .cloned()
            .collect();
        albums.sort_by(|a, b| a.index.cmp(&b.index).then(a.id.cmp(&b.id)));
        Ok(albums)
    }

    async fn songs_in(&self, album: AlbumId) -> Result<Vec<Song>> {
        let rows = self.rows.read().await;
        let mut songs: Vec<Song> = rows
            .songs
            .values()
            .filter(|s| s.album_id == album)
            .cloned()
            .collect();
        songs.sort_by(|a, b| a.index.cmp(&b.index).then(a.id.cmp(&b.id)));
        Ok(songs)
    }
}
