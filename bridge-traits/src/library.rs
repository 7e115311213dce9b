//! Music Library Source Abstraction
//!
//! The device music library is an external, unordered and mutable collection
//! of tracks. Hosts expose it through [`TrackSource`]: a fetch returning the
//! current flat list of [`TrackRecord`]s and a broadcast stream of
//! [`LibraryChange`] notifications.
//!
//! Records arrive in their raw wire shape. Every field is optional here because
//! the host library can and does hand out incomplete entries; validation is the
//! core's job.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::Result;

/// Sentinel used by host libraries for an unknown disc or track number.
pub const UNKNOWN_NUMBER: u32 = 0;

/// One track as reported by the host library.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrackRecord {
    /// Opaque, stable track identifier. Never reused by the host.
    pub track_id: Option<String>,
    /// Opaque, stable identifier of the album this track belongs to.
    pub album_id: Option<String>,
    /// Disc number, `UNKNOWN_NUMBER` or absent when unknown.
    #[serde(default)]
    pub disc_number: Option<u32>,
    /// Track number, `UNKNOWN_NUMBER` or absent when unknown.
    #[serde(default)]
    pub track_number: Option<u32>,
    pub title: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub album_artist: Option<String>,
    pub date_added: Option<DateTime<Utc>>,
    #[serde(default)]
    pub release_date: Option<DateTime<Utc>>,
}

impl TrackRecord {
    /// Create a record carrying every field the core requires.
    pub fn new(
        track_id: impl Into<String>,
        album_id: impl Into<String>,
        title: impl Into<String>,
        date_added: DateTime<Utc>,
    ) -> Self {
        Self {
            track_id: Some(track_id.into()),
            album_id: Some(album_id.into()),
            title: Some(title.into()),
            date_added: Some(date_added),
            ..Default::default()
        }
    }

    pub fn with_disc_number(mut self, disc: u32) -> Self {
        self.disc_number = Some(disc);
        self
    }

    pub fn with_track_number(mut self, track: u32) -> Self {
        self.track_number = Some(track);
        self
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn with_album_artist(mut self, album_artist: impl Into<String>) -> Self {
        self.album_artist = Some(album_artist.into());
        self
    }

    pub fn with_release_date(mut self, release_date: DateTime<Utc>) -> Self {
        self.release_date = Some(release_date);
        self
    }
}

/// Notification that the host library changed.
///
/// Carries no diff; the core always re-fetches the full snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryChange {
    /// When the host observed the change.
    pub observed_at: DateTime<Utc>,
}

/// Source of ground-truth track data.
///
/// # Contract
///
/// - `fetch_tracks` returns the complete current library, in any order.
///   Track ids are unique within one snapshot.
/// - `fetch_tracks` returns [`BridgeError::NotAvailable`](crate::BridgeError::NotAvailable)
///   when the library cannot be queried (e.g. permission revoked).
/// - `subscribe_changes` fires at most once per underlying change. Each call
///   returns an independent receiver; callers are responsible for keeping a
///   single live subscription.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::library::TrackSource;
///
/// async fn count_tracks(source: &dyn TrackSource) -> usize {
///     source.fetch_tracks().await.map(|t| t.len()).unwrap_or(0)
/// }
/// ```
#[async_trait]
pub trait TrackSource: Send + Sync {
    /// Fetch the current flat track list.
    async fn fetch_tracks(&self) -> Result<Vec<TrackRecord>>;

    /// Subscribe to "library changed" notifications.
    fn subscribe_changes(&self) -> broadcast::Receiver<LibraryChange>;
}
