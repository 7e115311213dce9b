//! Domain models for the persisted library hierarchy
//!
//! `Collection → Album → Song`. Each child records its parent's id and its
//! own order index among its siblings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// =============================================================================
// ID Types
// =============================================================================

/// Unique identifier for a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CollectionId(pub Uuid);

impl CollectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for CollectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an album
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AlbumId(pub Uuid);

impl AlbumId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for AlbumId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AlbumId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a song
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SongId(pub Uuid);

impl SongId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for SongId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SongId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Domain Models
// =============================================================================

/// Top-level container. Steady state holds exactly one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub id: CollectionId,
    /// Position among all collections
    pub index: i64,
    /// Display title, may be empty
    pub title: String,
}

impl Collection {
    pub fn new(title: impl Into<String>, index: i64) -> Self {
        Self {
            id: CollectionId::new(),
            index,
            title: title.into(),
        }
    }
}

/// Album container, keyed externally by the host's album id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub id: AlbumId,
    pub collection_id: CollectionId,
    /// Position within the owning collection
    pub index: i64,
    /// Host album identifier, assigned once at creation
    pub external_album_id: String,
    /// Newest release date among the album's songs, recomputed every merge
    pub release_date_estimate: Option<DateTime<Utc>>,
}

impl Album {
    pub fn new(collection_id: CollectionId, external_album_id: impl Into<String>, index: i64) -> Self {
        Self {
            id: AlbumId::new(),
            collection_id,
            index,
            external_album_id: external_album_id.into(),
            release_date_estimate: None,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.external_album_id.is_empty() {
            return Err("External album id cannot be empty".to_string());
        }
        if self.index < 0 {
            return Err("Order index cannot be negative".to_string());
        }
        Ok(())
    }
}

/// A song, keyed externally by the host's track id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Song {
    pub id: SongId,
    pub album_id: AlbumId,
    /// Position within the owning album
    pub index: i64,
    /// Host track identifier, assigned once at creation
    pub external_track_id: String,
}

impl Song {
    pub fn new(album_id: AlbumId, external_track_id: impl Into<String>, index: i64) -> Self {
        Self {
            id: SongId::new(),
            album_id,
            index,
            external_track_id: external_track_id.into(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.external_track_id.is_empty() {
            return Err("External track id cannot be empty".to_string());
        }
        if self.index < 0 {
            return Err("Order index cannot be negative".to_string());
        }
        Ok(())
    }
}
