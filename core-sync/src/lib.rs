//! # Library Merge Engine
//!
//! Reconciles the host's flat, unordered track list with the persisted
//! Collection → Album → Song hierarchy.
//!
//! ## Overview
//!
//! A merge takes a fresh snapshot from the `TrackSource` and:
//! - Classifies persisted Songs as updated, deleted, new or untouched
//! - Folds duplicate Collections and Albums into one canonical container
//! - Moves Songs whose external album changed
//! - Creates Albums and Songs for new tracks, preserving user ordering
//! - Deletes orphans and renumbers every level to `0..n-1`
//!
//! All of it happens in memory; the result is committed once.
//!
//! ## Components
//!
//! - **Snapshot** (`snapshot`): Validates raw `TrackRecord`s
//! - **Ordering** (`ordering`): Finder collation and default track order
//! - **Diff Engine** (`diff`): Buckets Songs against the snapshot
//! - **Container Resolver** (`container_resolver`): Duplicate container repair
//! - **Album Migration Mover** (`album_mover`): Relocates reassigned Songs
//! - **Creator** (`creator`): Materializes new tracks
//! - **Cleaner** (`cleaner`): Deletion, release estimates and reindexing
//! - **Reconcile** (`reconcile`): The synchronous pipeline
//! - **Merge Job** (`job`): Phase state machine and statistics
//! - **Library Engine** (`coordinator`): Single-flight orchestration,
//!   persistence with retry and events

pub mod album_mover;
pub mod cleaner;
pub mod container_resolver;
pub mod coordinator;
pub mod creator;
pub mod diff;
pub mod error;
pub mod job;
pub mod ordering;
pub mod reconcile;
pub mod snapshot;

pub use coordinator::{EngineStatus, LibraryEngine, MergeOutcome, MergeTrigger};
pub use diff::MergeDiff;
pub use error::{Result, SyncError};
pub use job::{MergeId, MergeJob, MergePhase, MergeStats};
pub use reconcile::{reconcile, MergeConfig};
pub use snapshot::{ExternalTrack, TrackSnapshot};
