//! JSON snapshot Track Source
//!
//! Reads the host library from a JSON file exported by a desktop player or a
//! test harness. The file holds either a bare array of track records or an
//! object with a `tracks` array:
//!
//! ```json
//! [{ "track_id": "t1", "album_id": "a1", "title": "Intro", "date_added": "2024-01-01T00:00:00Z" }]
//! ```
//!
//! Records that do not parse are skipped with a warning; the rest of the
//! snapshot is still returned.
//!
//! Change notifications come from [`JsonSnapshotTrackSource::notify_changed`]
//! or from a modification-time poller started with
//! [`JsonSnapshotTrackSource::watch`].

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    library::{LibraryChange, TrackRecord, TrackSource},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const CHANGE_CHANNEL_CAPACITY: usize = 16;

/// File layout. Records stay untyped so one bad record cannot reject the
/// whole snapshot.
#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotFile {
    Bare(Vec<Value>),
    Wrapped { tracks: Vec<Value> },
}

impl SnapshotFile {
    fn into_records(self, path: &Path) -> Vec<TrackRecord> {
        let (SnapshotFile::Bare(tracks) | SnapshotFile::Wrapped { tracks }) = self;
        tracks
            .into_iter()
            .enumerate()
            .filter_map(|(index, value)| match serde_json::from_value(value) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(path = ?path, index, error = %e, "Skipping unreadable track record");
                    None
                }
            })
            .collect()
    }
}

/// Track Source backed by a JSON file on disk.
pub struct JsonSnapshotTrackSource {
    path: PathBuf,
    changes: broadcast::Sender<LibraryChange>,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl JsonSnapshotTrackSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            path: path.into(),
            changes,
            poller: Mutex::new(None),
        }
    }

    /// `<data dir>/shelf/library.json`, falling back to the working directory.
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("shelf")
            .join("library.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Tell subscribers the library changed.
    pub fn notify_changed(&self) {
        let observed_at = Utc::now();
        // No subscribers is fine.
        self.changes.send(LibraryChange { observed_at }).ok();
        debug!(path = ?self.path, "Library change announced");
    }

    /// Poll the file's modification time every `interval` and announce a
    /// change whenever it moves, appears or disappears.
    ///
    /// Replaces any poller started earlier.
    pub fn watch(&self, interval: Duration) {
        let path = self.path.clone();
        let changes = self.changes.clone();

        let handle = tokio::spawn(async move {
            let mut last = modified_at(&path).await;
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let current = modified_at(&path).await;
                if current != last {
                    last = current;
                    debug!(path = ?path, "Snapshot file changed");
                    changes
                        .send(LibraryChange {
                            observed_at: Utc::now(),
                        })
                        .ok();
                }
            }
        });

        let previous = self
            .poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
        info!(path = ?self.path, ?interval, "Watching snapshot file");
    }

    pub fn stop_watching(&self) {
        let handle = self
            .poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}

impl Drop for JsonSnapshotTrackSource {
    fn drop(&mut self) {
        self.stop_watching();
    }
}

async fn modified_at(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).await.ok()?.modified().ok()
}

#[async_trait]
impl TrackSource for JsonSnapshotTrackSource {
    async fn fetch_tracks(&self) -> Result<Vec<TrackRecord>> {
        let data = fs::read(&self.path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound | ErrorKind::PermissionDenied => BridgeError::NotAvailable(
                format!("Cannot read snapshot {}: {}", self.path.display(), e),
            ),
            _ => BridgeError::Io(e),
        })?;

        let file: SnapshotFile = serde_json::from_slice(&data).map_err(|e| {
            warn!(path = ?self.path, error = %e, "Snapshot file is not valid JSON");
            BridgeError::Malformed(format!("{}: {}", self.path.display(), e))
        })?;

        let records = file.into_records(&self.path);
        debug!(path = ?self.path, count = records.len(), "Read track snapshot");
        Ok(records)
    }

    fn subscribe_changes(&self) -> broadcast::Receiver<LibraryChange> {
        self.changes.subscribe()
    }
}
