//! Shared fakes and assertions for the merge engine integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::{FixedClock, LibraryChange, TrackRecord, TrackSource};
use chrono::{DateTime, TimeZone, Utc};
use core_library::{ChangeSet, InMemoryLibraryStore, LibraryError, LibraryStore, LibraryTree};
use core_runtime::config::MergeSettings;
use core_runtime::events::EventBus;
use core_sync::{LibraryEngine, MergeConfig};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

// ============================================================================
// Records
// ============================================================================

pub fn day(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
}

pub fn year(year: i32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, 6, 1, 0, 0, 0).unwrap()
}

/// A valid record added on January `added`.
pub fn track(id: &str, album: &str, number: u32, added: u32) -> TrackRecord {
    TrackRecord::new(id, album, format!("Song {}", id), day(added)).with_track_number(number)
}

// ============================================================================
// Track Source
// ============================================================================

/// Track source whose contents can be swapped between merges.
pub struct ScriptedSource {
    records: Mutex<Vec<TrackRecord>>,
    changes: broadcast::Sender<LibraryChange>,
}

impl ScriptedSource {
    pub fn new(records: Vec<TrackRecord>) -> Arc<Self> {
        let (changes, _) = broadcast::channel(8);
        Arc::new(Self {
            records: Mutex::new(records),
            changes,
        })
    }

    pub async fn set(&self, records: Vec<TrackRecord>) {
        *self.records.lock().await = records;
    }

    pub fn notify(&self) {
        self.changes
            .send(LibraryChange {
                observed_at: Utc::now(),
            })
            .ok();
    }
}

#[async_trait]
impl TrackSource for ScriptedSource {
    async fn fetch_tracks(&self) -> bridge_traits::error::Result<Vec<TrackRecord>> {
        Ok(self.records.lock().await.clone())
    }

    fn subscribe_changes(&self) -> broadcast::Receiver<LibraryChange> {
        self.changes.subscribe()
    }
}

// ============================================================================
// Stores
// ============================================================================

/// Store that rejects the next `failures` commits.
pub struct FlakyStore {
    pub inner: InMemoryLibraryStore,
    failures: AtomicU32,
    pub commit_calls: AtomicU32,
}

impl FlakyStore {
    pub fn new(failures: u32) -> Arc<Self> {
        Arc::new(Self {
            inner: InMemoryLibraryStore::new(),
            failures: AtomicU32::new(failures),
            commit_calls: AtomicU32::new(0),
        })
    }

    pub fn heal(&self) {
        self.failures.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl LibraryStore for FlakyStore {
    async fn load_tree(&self) -> core_library::Result<LibraryTree> {
        self.inner.load_tree().await
    }

    async fn commit(&self, changes: &ChangeSet) -> core_library::Result<()> {
        self.commit_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(LibraryError::Corrupt("disk I/O error".to_string()));
        }
        self.inner.commit(changes).await
    }

    async fn collections(&self) -> core_library::Result<Vec<core_library::Collection>> {
        self.inner.collections().await
    }

    async fn albums_in(
        &self,
        collection: core_library::CollectionId,
    ) -> core_library::Result<Vec<core_library::Album>> {
        self.inner.albums_in(collection).await
    }

    async fn songs_in(&self, album: core_library::AlbumId) -> core_library::Result<Vec<core_library::Song>> {
        self.inner.songs_in(album).await
    }
}

// ============================================================================
// Engine
// ============================================================================

pub fn fast_config() -> MergeConfig {
    MergeSettings::default()
        .with_commit_retry_backoff_ms(0)
        .into()
}

pub fn engine(store: Arc<dyn LibraryStore>, source: Arc<dyn TrackSource>, bus: &EventBus) -> Arc<LibraryEngine> {
    Arc::new(LibraryEngine::new(
        store,
        source,
        bus.clone(),
        fast_config(),
        Arc::new(FixedClock::new(day(1))),
    ))
}

// ============================================================================
// Assertions
// ============================================================================

/// Album external ids with their Songs' external ids, in custom order.
pub fn layout(tree: &LibraryTree) -> Vec<(String, Vec<String>)> {
    tree.albums_in_custom_order()
        .into_iter()
        .map(|album| {
            let songs = tree
                .song_ids(album)
                .iter()
                .map(|song| tree.song(*song).unwrap().external_track_id.clone())
                .collect();
            (tree.album(album).unwrap().external_album_id.clone(), songs)
        })
        .collect()
}

pub fn layout_of(expected: &[(&str, &[&str])]) -> Vec<(String, Vec<String>)> {
    expected
        .iter()
        .map(|(album, songs)| {
            (
                album.to_string(),
                songs.iter().map(|s| s.to_string()).collect(),
            )
        })
        .collect()
}

/// Every level of the tree is numbered `0..n-1` and no external album id repeats.
pub fn assert_well_formed(tree: &LibraryTree) {
    for (position, collection) in tree.collection_ids().iter().enumerate() {
        assert_eq!(tree.collection(*collection).unwrap().index, position as i64);
        for (position, album) in tree.album_ids(*collection).iter().enumerate() {
            assert_eq!(tree.album(*album).unwrap().index, position as i64);
            for (position, song) in tree.song_ids(*album).iter().enumerate() {
                assert_eq!(tree.song(*song).unwrap().index, position as i64);
            }
        }
    }

    let mut seen = std::collections::HashSet::new();
    for album in tree.albums() {
        assert!(
            seen.insert(album.external_album_id.clone()),
            "duplicate album {}",
            album.external_album_id
        );
    }
}
