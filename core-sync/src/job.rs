//! # Merge Job State Machine
//!
//! Tracks one merge through its phases with validated transitions.
//!
//! ## State Machine
//!
//! ```text
//! Idle → Diffing → Updating → Creating → Cleaning → Saving → Idle
//!          │          │          │          │         │
//!          └──────────┴──────────┴──────────┴─────────┴────→ Idle (abort)
//! ```
//!
//! Updating (duplicate resolution and album migration) must finish before
//! Creating, so new tracks never target a container about to be merged away.
//! Creating must finish before Cleaning, so fresh containers are not mistaken
//! for orphans.
//!
//! ## Usage
//!
//! ```rust
//! use core_sync::job::{MergeJob, MergePhase};
//! use chrono::Utc;
//!
//! let mut job = MergeJob::new(false, Utc::now());
//! job.advance(MergePhase::Diffing)?;
//! job.advance(MergePhase::Updating)?;
//! assert!(job.advance(MergePhase::Saving).is_err());
//! job.abort();
//! assert_eq!(job.phase, MergePhase::Idle);
//! # Ok::<(), core_sync::SyncError>(())
//! ```

use crate::{Result, SyncError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for one merge run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MergeId(Uuid);

impl MergeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MergeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MergeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Phases
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergePhase {
    #[default]
    Idle,
    Diffing,
    Updating,
    Creating,
    Cleaning,
    Saving,
}

impl MergePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergePhase::Idle => "idle",
            MergePhase::Diffing => "diffing",
            MergePhase::Updating => "updating",
            MergePhase::Creating => "creating",
            MergePhase::Cleaning => "cleaning",
            MergePhase::Saving => "saving",
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, MergePhase::Idle)
    }

    /// The phase that follows this one in a successful merge.
    pub fn next(&self) -> MergePhase {
        match self {
            MergePhase::Idle => MergePhase::Diffing,
            MergePhase::Diffing => MergePhase::Updating,
            MergePhase::Updating => MergePhase::Creating,
            MergePhase::Creating => MergePhase::Cleaning,
            MergePhase::Cleaning => MergePhase::Saving,
            MergePhase::Saving => MergePhase::Idle,
        }
    }

    pub fn can_transition_to(&self, to: MergePhase) -> bool {
        // Aborting is always allowed; otherwise phases are strictly sequential.
        (to == MergePhase::Idle && self.is_active()) || self.next() == to
    }
}

impl std::fmt::Display for MergePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Counters collected over one merge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStats {
    pub songs_created: u64,
    pub songs_updated: u64,
    pub songs_deleted: u64,
    /// Songs moved by duplicate resolution or album migration
    pub songs_relocated: u64,
    pub albums_created: u64,
    pub albums_deleted: u64,
    pub collections_deleted: u64,
    /// Duplicate Albums and Collections folded into a canonical one
    pub duplicates_merged: u64,
    /// Snapshot records dropped as malformed or duplicate
    pub records_skipped: u64,
    pub duration_ms: u64,
}

impl MergeStats {
    /// True when the merge changed nothing structurally.
    pub fn is_noop(&self) -> bool {
        self.songs_created == 0
            && self.songs_deleted == 0
            && self.songs_relocated == 0
            && self.albums_created == 0
            && self.albums_deleted == 0
            && self.collections_deleted == 0
            && self.duplicates_merged == 0
    }
}

// ============================================================================
// Merge Job
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeJob {
    pub id: MergeId,
    pub phase: MergePhase,
    /// The store held no songs when the merge started
    pub first_import: bool,
    pub started_at: DateTime<Utc>,
}

impl MergeJob {
    pub fn new(first_import: bool, started_at: DateTime<Utc>) -> Self {
        Self {
            id: MergeId::new(),
            phase: MergePhase::Idle,
            first_import,
            started_at,
        }
    }

    /// Move to `to`, rejecting anything but the next phase or an abort.
    pub fn advance(&mut self, to: MergePhase) -> Result<()> {
        if !self.phase.can_transition_to(to) {
            return Err(SyncError::InvalidStateTransition {
                from: self.phase.as_str().to_string(),
                to: to.as_str().to_string(),
            });
        }
        self.phase = to;
        Ok(())
    }

    /// Return to `Idle` from any phase.
    pub fn abort(&mut self) {
        self.phase = MergePhase::Idle;
    }
}

// ============================================================================
// Tests
// ============================================================================
