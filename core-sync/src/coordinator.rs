//! # Library Engine
//!
//! Orchestrates merges of the host music library into the persisted
//! Collection → Album → Song hierarchy.
//!
//! ## Overview
//!
//! The `LibraryEngine` is the single owner of merge execution. It:
//! - Fetches a fresh snapshot from the `TrackSource`
//! - Loads the persisted tree from the `LibraryStore`
//! - Runs the [`reconcile`](crate::reconcile::reconcile) pipeline in memory
//! - Commits every pending mutation in one `LibraryStore::commit`
//! - Emits `MergeEvent`s on the `EventBus`
//!
//! ## Single flight
//!
//! At most one merge runs at a time. [`LibraryEngine::request_merge`] called
//! while a merge is running sets a "requested again" flag and returns
//! [`MergeTrigger::Coalesced`]. Whichever call holds the flight, including
//! [`LibraryEngine::merge_now`], loops once more when it finishes, so any
//! number of notifications during a merge collapse into one follow-up run.
//!
//! The flight is released when the holding future is dropped. A cancelled
//! caller also drops a pending follow-up; the next request merges the latest
//! snapshot anyway.
//!
//! ## Failure handling
//!
//! - Source unavailable: the merge is a no-op. No event, store untouched.
//! - Store unreadable: `MergeEvent::Failed` with zero attempts. No `Started`
//!   event precedes it, since no merge job was created.
//! - Commit failure: retried `commit_retry_attempts` times with a fixed
//!   backoff, then `MergeEvent::Failed` is emitted and `last_merge_failed` is
//!   set. The store keeps its last committed state.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::{LibraryEngine, MergeConfig};
//! use std::sync::Arc;
//!
//! # async fn example(engine: Arc<LibraryEngine>) {
//! engine.clone().spawn_change_listener();
//! engine.request_merge().await;
//! println!("last merge failed: {}", engine.status().last_merge_failed);
//! # }
//! ```

use crate::{
    job::{MergeId, MergeJob, MergePhase, MergeStats},
    reconcile::{reconcile, MergeConfig},
    snapshot::TrackSnapshot,
    Result, SyncError,
};
use bridge_traits::{Clock, TrackSource};
use core_library::LibraryStore;
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent, MergeEvent};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

// ============================================================================
// Public Types
// ============================================================================

/// Result of one merge run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The merge committed (or had nothing to commit).
    Completed(MergeStats),
    /// The Track Source could not be queried. Nothing happened.
    SourceUnavailable,
    /// The merge could not be committed. The store is unchanged.
    Failed { message: String, attempts: u32 },
}

impl MergeOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, MergeOutcome::Completed(_))
    }
}

/// Result of [`LibraryEngine::request_merge`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeTrigger {
    /// Another merge was running; it will run once more after finishing.
    Coalesced,
    /// This call ran `runs` merges back to back; `last` is the final one.
    Ran { runs: u32, last: MergeOutcome },
}

/// Snapshot of the engine's state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub phase: MergePhase,
    pub last_merge_failed: bool,
    pub last_error: Option<String>,
    pub last_stats: Option<MergeStats>,
    pub merges_completed: u64,
}

#[derive(Debug, Default)]
struct FlightState {
    in_progress: bool,
    requested_again: bool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Ownership of the single merge flight. Dropping it releases the flight.
struct FlightGuard<'a> {
    flight: &'a Mutex<FlightState>,
    released: bool,
}

impl<'a> FlightGuard<'a> {
    /// Take the flight, or record a follow-up request when `coalesce` is set
    /// and another merge holds it.
    fn acquire(flight: &'a Mutex<FlightState>, coalesce: bool) -> Option<Self> {
        let mut state = lock(flight);
        if state.in_progress {
            if coalesce {
                state.requested_again = true;
            }
            return None;
        }
        state.in_progress = true;
        Some(Self {
            flight,
            released: false,
        })
    }

    /// Consume a pending follow-up request, or release the flight.
    ///
    /// Both happen under one lock so a request cannot slip in between.
    fn continue_or_release(&mut self) -> bool {
        let mut state = lock(self.flight);
        if state.requested_again {
            state.requested_again = false;
            return true;
        }
        state.in_progress = false;
        self.released = true;
        false
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let mut state = lock(self.flight);
        if state.requested_again {
            warn!("Merge cancelled with a follow-up pending");
        }
        *state = FlightState::default();
    }
}

// ============================================================================
// Library Engine
// ============================================================================

pub struct LibraryEngine {
    store: Arc<dyn LibraryStore>,
    source: Arc<dyn TrackSource>,
    event_bus: EventBus,
    config: MergeConfig,
    clock: Arc<dyn Clock>,
    flight: Mutex<FlightState>,
    status: Mutex<EngineStatus>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl LibraryEngine {
    pub fn new(
        store: Arc<dyn LibraryStore>,
        source: Arc<dyn TrackSource>,
        event_bus: EventBus,
        config: MergeConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            source,
            event_bus,
            config,
            clock,
            flight: Mutex::new(FlightState::default()),
            status: Mutex::new(EngineStatus::default()),
            listener: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn LibraryStore> {
        &self.store
    }

    pub fn status(&self) -> EngineStatus {
        lock(&self.status).clone()
    }

    pub fn is_merging(&self) -> bool {
        lock(&self.flight).in_progress
    }

    /// Run a merge now, plus one follow-up if requests were coalesced
    /// into it. Returns the outcome of the last run.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::MergeInProgress` if a merge is already running.
    #[instrument(skip(self))]
    pub async fn merge_now(&self) -> Result<MergeOutcome> {
        let guard =
            FlightGuard::acquire(&self.flight, false).ok_or(SyncError::MergeInProgress)?;
        let (_, outcome) = self.fly(guard).await;
        Ok(outcome)
    }

    /// Merge now, or fold this request into the merge already running.
    #[instrument(skip(self))]
    pub async fn request_merge(&self) -> MergeTrigger {
        let Some(guard) = FlightGuard::acquire(&self.flight, true) else {
            debug!("Merge already running, coalescing request");
            self.event_bus
                .emit(CoreEvent::Merge(MergeEvent::Coalesced))
                .ok();
            return MergeTrigger::Coalesced;
        };

        let (runs, last) = self.fly(guard).await;
        MergeTrigger::Ran { runs, last }
    }

    /// Run merges until no follow-up is pending, then release the flight.
    async fn fly(&self, mut guard: FlightGuard<'_>) -> (u32, MergeOutcome) {
        let mut runs = 0;
        loop {
            let outcome = self.run_merge().await;
            runs += 1;
            if !guard.continue_or_release() {
                return (runs, outcome);
            }
            debug!(runs, "Running coalesced follow-up merge");
        }
    }

    /// Subscribe to the Track Source and request a merge per notification.
    ///
    /// Replaces any listener started earlier, so the engine holds at most
    /// one subscription.
    pub fn spawn_change_listener(self: Arc<Self>) {
        let mut receiver = self.source.subscribe_changes();
        let engine: Weak<Self> = Arc::downgrade(&self);

        let handle = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(_) => {}
                    Err(RecvError::Lagged(missed)) => {
                        debug!(missed, "Change listener lagged, treating as one change");
                    }
                    Err(RecvError::Closed) => {
                        debug!("Track source change stream closed");
                        break;
                    }
                }

                let Some(engine) = engine.upgrade() else {
                    break;
                };
                engine
                    .event_bus
                    .emit(CoreEvent::Library(LibraryEvent::Changed))
                    .ok();
                tokio::spawn(async move {
                    engine.request_merge().await;
                });
            }
        });

        if let Some(previous) = lock(&self.listener).replace(handle) {
            previous.abort();
        }
        info!("Library change listener started");
    }

    /// Stop the change listener, if one is running.
    pub fn stop_change_listener(&self) {
        if let Some(handle) = lock(&self.listener).take() {
            handle.abort();
            info!("Library change listener stopped");
        }
    }

    // ========================================================================
    // Merge execution
    // ========================================================================

    async fn run_merge(&self) -> MergeOutcome {
        let records = match self.source.fetch_tracks().await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Track source unavailable, skipping merge");
                return MergeOutcome::SourceUnavailable;
            }
        };
        let snapshot = TrackSnapshot::from_records(records);

        let mut tree = match self.store.load_tree().await {
            Ok(tree) => tree,
            Err(e) => {
                let merge_id = MergeId::new();
                return self.fail(&merge_id, SyncError::from(e).to_string(), 0);
            }
        };

        let started_at = self.clock.now();
        let mut job = MergeJob::new(tree.is_empty(), started_at);
        let merge_id = job.id.to_string();
        info!(
            merge_id = %merge_id,
            first_import = job.first_import,
            tracks = snapshot.len(),
            skipped = snapshot.skipped_count(),
            "Starting library merge"
        );
        self.event_bus
            .emit(CoreEvent::Merge(MergeEvent::Started {
                merge_id: merge_id.clone(),
                first_import: job.first_import,
            }))
            .ok();

        let reconciled = reconcile(&mut tree, &snapshot, &self.config, |phase| {
            self.enter_phase(&mut job, phase)
        });
        let mut stats = match reconciled {
            Ok(stats) => stats,
            Err(e) => {
                job.abort();
                return self.fail(&job.id, e.to_string(), 0);
            }
        };

        if let Err(e) = self.enter_phase(&mut job, MergePhase::Saving) {
            job.abort();
            return self.fail(&job.id, e.to_string(), 0);
        }

        let changes = tree.pending_changes();
        if !changes.is_empty() {
            let max_attempts = self.config.commit_retry_attempts + 1;
            let mut attempts = 0;
            loop {
                attempts += 1;
                match self.store.commit(&changes).await {
                    Ok(()) => break,
                    Err(e) if attempts < max_attempts => {
                        warn!(
                            merge_id = %merge_id,
                            attempt = attempts,
                            error = %e,
                            "Commit failed, retrying"
                        );
                        tokio::time::sleep(self.config.commit_retry_backoff).await;
                    }
                    Err(e) => {
                        job.abort();
                        let message = SyncError::Persistence(e.to_string()).to_string();
                        return self.fail(&job.id, message, attempts);
                    }
                }
            }
        }
        tree.mark_committed();
        job.advance(MergePhase::Idle).ok();
        let elapsed = self.clock.now() - started_at;
        stats.duration_ms = u64::try_from(elapsed.num_milliseconds()).unwrap_or(0);

        {
            let mut status = lock(&self.status);
            status.phase = MergePhase::Idle;
            status.last_merge_failed = false;
            status.last_error = None;
            status.last_stats = Some(stats);
            status.merges_completed += 1;
        }

        info!(
            merge_id = %merge_id,
            created = stats.songs_created,
            deleted = stats.songs_deleted,
            relocated = stats.songs_relocated,
            mutations = changes.len(),
            duration_ms = stats.duration_ms,
            "Library merge completed"
        );
        self.event_bus
            .emit(CoreEvent::Merge(MergeEvent::Completed {
                merge_id,
                songs_created: stats.songs_created,
                songs_updated: stats.songs_updated,
                songs_deleted: stats.songs_deleted,
                songs_relocated: stats.songs_relocated,
                albums_created: stats.albums_created,
                albums_deleted: stats.albums_deleted,
                collections_deleted: stats.collections_deleted,
                duplicates_merged: stats.duplicates_merged,
                records_skipped: stats.records_skipped,
                duration_ms: stats.duration_ms,
            }))
            .ok();

        MergeOutcome::Completed(stats)
    }

    fn enter_phase(&self, job: &mut MergeJob, phase: MergePhase) -> Result<()> {
        job.advance(phase)?;
        lock(&self.status).phase = phase;
        debug!(merge_id = %job.id, phase = %phase, "Merge phase changed");
        self.event_bus
            .emit(CoreEvent::Merge(MergeEvent::PhaseChanged {
                merge_id: job.id.to_string(),
                phase: phase.as_str().to_string(),
            }))
            .ok();
        Ok(())
    }

    fn fail(&self, merge_id: &MergeId, message: String, attempts: u32) -> MergeOutcome {
        error!(merge_id = %merge_id, attempts, error = %message, "Library merge failed");

        {
            let mut status = lock(&self.status);
            status.phase = MergePhase::Idle;
            status.last_merge_failed = true;
            status.last_error = Some(message.clone());
        }

        self.event_bus
            .emit(CoreEvent::Merge(MergeEvent::Failed {
                merge_id: merge_id.to_string(),
                message: message.clone(),
                attempts,
            }))
            .ok();

        MergeOutcome::Failed { message, attempts }
    }
}

impl Drop for LibraryEngine {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.listener).take() {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for LibraryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibraryEngine")
            .field("config", &self.config)
            .field("status", &self.status())
            .finish()
    }
}
