//! Library store trait and SQLite implementation

use crate::error::{LibraryError, Result};
use crate::models::{Album, AlbumId, Collection, CollectionId, Song, SongId};
use crate::tree::{ChangeSet, LibraryTree};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::{query, query_as, FromRow, SqlitePool};
use tracing::{debug, instrument};

/// Persisted store for the library hierarchy.
///
/// Reads return children sorted by order index. Writes go exclusively through
/// [`commit`](LibraryStore::commit), which applies a whole [`ChangeSet`]
/// atomically.
#[async_trait]
pub trait LibraryStore: Send + Sync {
    /// Load the complete hierarchy.
    ///
    /// # Errors
    /// Returns error if:
    /// - A row references a missing parent
    /// - Database error occurs
    async fn load_tree(&self) -> Result<LibraryTree>;

    /// Apply every mutation in `changes` as one unit.
    ///
    /// On error nothing is written.
    async fn commit(&self, changes: &ChangeSet) -> Result<()>;

    /// All collections, by order index.
    async fn collections(&self) -> Result<Vec<Collection>>;

    /// Albums of a collection, by order index.
    async fn albums_in(&self, collection: CollectionId) -> Result<Vec<Album>>;

    /// Songs of an album, by order index.
    async fn songs_in(&self, album: AlbumId) -> Result<Vec<Song>>;
}

// =============================================================================
// Row mapping
// =============================================================================

#[derive(Debug, FromRow)]
struct CollectionRow {
    id: String,
    position: i64,
    title: String,
}

#[derive(Debug, FromRow)]
struct AlbumRow {
    id: String,
    collection_id: String,
    position: i64,
    external_album_id: String,
    release_date_estimate: Option<i64>,
}

#[derive(Debug, FromRow)]
struct SongRow {
    id: String,
    album_id: String,
    position: i64,
    external_track_id: String,
}

fn corrupt(entity: &str, id: &str, err: impl std::fmt::Display) -> LibraryError {
    LibraryError::Corrupt(format!("{} {}: {}", entity, id, err))
}

fn millis_to_datetime(millis: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| LibraryError::Corrupt(format!("timestamp out of range: {}", millis)))
}

impl TryFrom<CollectionRow> for Collection {
    type Error = LibraryError;

    fn try_from(row: CollectionRow) -> Result<Self> {
        Ok(Self {
            id: CollectionId::from_string(&row.id).map_err(|e| corrupt("collection", &row.id, e))?,
            index: row.position,
            title: row.title,
        })
    }
}

impl TryFrom<AlbumRow> for Album {
    type Error = LibraryError;

    fn try_from(row: AlbumRow) -> Result<Self> {
        Ok(Self {
            id: AlbumId::from_string(&row.id).map_err(|e| corrupt("album", &row.id, e))?,
            collection_id: CollectionId::from_string(&row.collection_id)
                .map_err(|e| corrupt("album", &row.id, e))?,
            index: row.position,
            external_album_id: row.external_album_id,
            release_date_estimate: row
                .release_date_estimate
                .map(millis_to_datetime)
                .transpose()?,
        })
    }
}

impl TryFrom<SongRow> for Song {
    type Error = LibraryError;

    fn try_from(row: SongRow) -> Result<Self> {
        Ok(Self {
            id: SongId::from_string(&row.id).map_err(|e| corrupt("song", &row.id, e))?,
            album_id: AlbumId::from_string(&row.album_id).map_err(|e| corrupt("song", &row.id, e))?,
            index: row.position,
            external_track_id: row.external_track_id,
        })
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>>
where
    T: TryFrom<R, Error = LibraryError>,
{
    rows.into_iter().map(T::try_from).collect()
}

// =============================================================================
// SQLite implementation
// =============================================================================

/// SQLite implementation of LibraryStore
pub struct SqliteLibraryStore {
    pool: SqlitePool,
}

impl SqliteLibraryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LibraryStore for SqliteLibraryStore {
    #[instrument(skip(self))]
    async fn load_tree(&self) -> Result<LibraryTree> {
        let collections = self.collections().await?;

        let albums: Vec<AlbumRow> = query_as(
            "SELECT id, collection_id, position, external_album_id, release_date_estimate \
             FROM albums",
        )
        .fetch_all(&self.pool)
        .await?;

        let songs: Vec<SongRow> =
            query_as("SELECT id, album_id, position, external_track_id FROM songs")
                .fetch_all(&self.pool)
                .await?;

        debug!(
            collections = collections.len(),
            albums = albums.len(),
            songs = songs.len(),
            "Loaded library rows"
        );

        LibraryTree::from_rows(collections, convert_all(albums)?, convert_all(songs)?)
    }

    #[instrument(skip(self, changes), fields(writes = changes.len()))]
    async fn commit(&self, changes: &ChangeSet) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }

        for album in &changes.albums {
            album.validate().map_err(|message| LibraryError::InvalidInput {
                field: "Album".to_string(),
                message,
            })?;
        }
        for song in &changes.songs {
            song.validate().map_err(|message| LibraryError::InvalidInput {
                field: "Song".to_string(),
                message,
            })?;
        }

        let mut tx = self.pool.begin().await?;

        for collection in &changes.collections {
            query(
                r#"
                INSERT INTO collections (id, position, title)
                VALUES (?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    position = excluded.position,
                    title = excluded.title
                "#,
            )
            .bind(collection.id.to_string())
            .bind(collection.index)
            .bind(&collection.title)
            .execute(&mut *tx)
            .await?;
        }

        for album in &changes.albums {
            query(
                r#"
                INSERT INTO albums (
                    id, collection_id, position, external_album_id, release_date_estimate
                )
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    collection_id = excluded.collection_id,
                    position = excluded.position,
                    release_date_estimate = excluded.release_date_estimate
                "#,
            )
            .bind(album.id.to_string())
            .bind(album.collection_id.to_string())
            .bind(album.index)
            .bind(&album.external_album_id)
            .bind(album.release_date_estimate.map(|d| d.timestamp_millis()))
            .execute(&mut *tx)
            .await?;
        }

        for song in &changes.songs {
            query(
                r#"
                INSERT INTO songs (id, album_id, position, external_track_id)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    album_id = excluded.album_id,
                    position = excluded.position
                "#,
            )
            .bind(song.id.to_string())
            .bind(song.album_id.to_string())
            .bind(song.index)
            .bind(&song.external_track_id)
            .execute(&mut *tx)
            .await?;
        }

        for id in &changes.deleted_songs {
            query("DELETE FROM songs WHERE id = ?")
                .bind(id.to_string())
                .execute(&mut *tx)
                .await?;
        }

        for id in &changes.deleted_albums {
            query("DELETE FROM albums WHERE id = ?")
                .bind(id.to_string())
                .execute(&mut *tx)
                .await?;
        }

        for id in &changes.deleted_collections {
            query("DELETE FROM collections WHERE id = ?")
                .bind(id.to_string())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        debug!(writes = changes.len(), "Committed library changes");
        Ok(())
    }

    async fn collections(&self) -> Result<Vec<Collection>> {
        let rows: Vec<CollectionRow> =
            query_as("SELECT id, position, title FROM collections ORDER BY position, id")
                .fetch_all(&self.pool)
                .await?;

        convert_all(rows)
    }

    async fn albums_in(&self, collection: CollectionId) -> Result<Vec<Album>> {
        let rows: Vec<AlbumRow> = query_as(
            "SELECT id, collection_id, position, external_album_id, release_date_estimate \
             FROM albums WHERE collection_id = ? ORDER BY position, id",
        )
        .bind(collection.to_string())
        .fetch_all(&self.pool)
        .await?;

        convert_all(rows)
    }

    async fn songs_in(&self, album: AlbumId) -> Result<Vec<Song>> {
        let rows: Vec<SongRow> = query_as(
            "SELECT id, album_id, position, external_track_id \
             FROM songs WHERE album_id = ? ORDER BY position, id",
        )
        .bind(album.to_string())
        .fetch_all(&self.pool)
        .await?;

        convert_all(rows)
    }
}
