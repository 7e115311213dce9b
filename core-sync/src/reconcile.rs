//! # Reconcile Pipeline
//!
//! Runs one merge of a [`TrackSnapshot`] into a [`LibraryTree`], entirely in
//! memory. Nothing is persisted here: the caller commits
//! [`LibraryTree::pending_changes`] once the pipeline returns.
//!
//! ## Stages
//!
//! 1. **Diffing**: classify Songs against the snapshot.
//! 2. **Updating**: consolidate Collections, merge duplicate Albums, move
//!    Songs whose external album changed.
//! 3. **Creating**: materialize Songs for new tracks.
//! 4. **Cleaning**: delete missing Songs and empty containers, recompute
//!    release estimates and renumber.
//!
//! The `on_phase` callback fires as each stage begins; the orchestrator uses
//! it to drive the [`MergeJob`](crate::job::MergeJob) state machine.

use crate::album_mover::migrate_albums;
use crate::cleaner::clean;
use crate::container_resolver::{consolidate_collections, resolve_duplicate_albums};
use crate::creator::create_missing;
use crate::diff::diff;
use crate::error::Result;
use crate::job::{MergePhase, MergeStats};
use crate::snapshot::{ExternalTrack, TrackSnapshot};
use core_library::{LibraryTree, SongId};
use core_runtime::config::MergeSettings;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::debug;

/// Tuning for one engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeConfig {
    /// Order Albums newest release first when importing into an empty store.
    pub first_import_sort_by_release_date: bool,
    /// Extra commit attempts after the first one fails.
    pub commit_retry_attempts: u32,
    pub commit_retry_backoff: Duration,
}

impl Default for MergeConfig {
    fn default() -> Self {
        MergeSettings::default().into()
    }
}

impl From<MergeSettings> for MergeConfig {
    fn from(settings: MergeSettings) -> Self {
        Self {
            first_import_sort_by_release_date: settings.first_import_sort_by_release_date,
            commit_retry_attempts: settings.commit_retry_attempts,
            commit_retry_backoff: Duration::from_millis(settings.commit_retry_backoff_ms),
        }
    }
}

/// Reconcile `tree` against `snapshot`.
///
/// On error the tree may be half-mutated; callers must discard it.
pub fn reconcile<F>(
    tree: &mut LibraryTree,
    snapshot: &TrackSnapshot,
    config: &MergeConfig,
    mut on_phase: F,
) -> Result<MergeStats>
where
    F: FnMut(MergePhase) -> Result<()>,
{
    let first_import = tree.is_empty();
    let mut stats = MergeStats {
        records_skipped: snapshot.skipped_count() as u64,
        ..Default::default()
    };

    on_phase(MergePhase::Diffing)?;
    let merge_diff = diff(tree, snapshot);
    debug!(
        to_update = merge_diff.to_update.len(),
        to_delete = merge_diff.to_delete.len(),
        to_create = merge_diff.to_create.len(),
        untouched = merge_diff.untouched.len(),
        "Diffed library against snapshot"
    );

    on_phase(MergePhase::Updating)?;
    let collections_merged = consolidate_collections(tree)?;

    let survivors: Vec<SongId> = merge_diff
        .to_update
        .iter()
        .map(|(song, _)| *song)
        .chain(merge_diff.untouched.iter().copied())
        .collect();
    let resolved = resolve_duplicate_albums(tree, &survivors)?;
    let mut canonical = resolved.canonical;

    let moved = migrate_albums(tree, &merge_diff.to_update, &mut canonical)?;

    on_phase(MergePhase::Creating)?;
    let known_records: HashMap<SongId, ExternalTrack> = merge_diff.to_update.iter().cloned().collect();
    let doomed: HashSet<SongId> = merge_diff.to_delete.iter().copied().collect();
    let created = create_missing(
        tree,
        merge_diff.to_create,
        &known_records,
        &doomed,
        &mut canonical,
        first_import,
    )?;

    on_phase(MergePhase::Cleaning)?;
    let release_dates = snapshot
        .tracks()
        .iter()
        .filter_map(|track| Some((track.track_id.clone(), track.release_date?)))
        .collect();
    let cleaned = clean(
        tree,
        &merge_diff.to_delete,
        &release_dates,
        first_import && config.first_import_sort_by_release_date,
    )?;

    stats.songs_created = created.songs_created as u64;
    stats.songs_updated = known_records.len() as u64;
    stats.songs_deleted = cleaned.songs_deleted as u64;
    stats.songs_relocated = (resolved.songs_relocated + moved.songs_moved) as u64;
    stats.albums_created = (moved.albums_created + created.albums_created) as u64;
    stats.albums_deleted = (resolved.albums_deleted + cleaned.albums_deleted) as u64;
    stats.collections_deleted = (collections_merged + cleaned.collections_deleted) as u64;
    stats.duplicates_merged = (collections_merged + resolved.albums_deleted) as u64;

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::TrackRecord;
    use chrono::{TimeZone, Utc};

    fn record(track: &str, album: &str, day: u32) -> TrackRecord {
        TrackRecord::new(
            track,
            album,
            track,
            Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
        )
    }

    fn phases_of(tree: &mut LibraryTree, snapshot: &TrackSnapshot) -> Vec<MergePhase> {
        let mut phases = Vec::new();
        reconcile(tree, snapshot, &MergeConfig::default(), |phase| {
            phases.push(phase);
            Ok(())
        })
        .unwrap();
        phases
    }

    #[test]
    fn test_phases_run_in_order() {
        let mut tree = LibraryTree::new();
        let snapshot = TrackSnapshot::from_records(vec![record("t1", "a1", 1)]);

        assert_eq!(
            phases_of(&mut tree, &snapshot),
            vec![
                MergePhase::Diffing,
                MergePhase::Updating,
                MergePhase::Creating,
                MergePhase::Cleaning,
            ]
        );
    }

    #[test]
    fn test_failing_phase_callback_stops_pipeline() {
        let mut tree = LibraryTree::new();
        let snapshot = TrackSnapshot::from_records(vec![record("t1", "a1", 1)]);

        let result = reconcile(&mut tree, &snapshot, &MergeConfig::default(), |phase| {
            if phase == MergePhase::Creating {
                Err(crate::SyncError::MergeInProgress)
            } else {
                Ok(())
            }
        });

        assert!(result.is_err());
        assert_eq!(tree.song_count(), 0);
    }

    #[test]
    fn test_stats_count_each_kind_of_change() {
        let mut tree = LibraryTree::new();
        let first = TrackSnapshot::from_records(vec![
            record("t1", "a1", 1),
            record("t2", "a1", 1),
            record("t3", "a2", 2),
        ]);
        let stats = reconcile(&mut tree, &first, &MergeConfig::default(), |_| Ok(())).unwrap();
        assert_eq!(stats.songs_created, 3);
        assert_eq!(stats.albums_created, 2);

        let second = TrackSnapshot::from_records(vec![
            record("t1", "a3", 1),
            record("t2", "a1", 1),
            record("t4", "a1", 3),
            TrackRecord {
                album_id: Some("a9".into()),
                ..Default::default()
            },
        ]);
        let stats = reconcile(&mut tree, &second, &MergeConfig::default(), |_| Ok(())).unwrap();

        assert_eq!(stats.songs_created, 1);
        assert_eq!(stats.songs_updated, 2);
        assert_eq!(stats.songs_deleted, 1);
        assert_eq!(stats.songs_relocated, 1);
        assert_eq!(stats.albums_created, 1);
        assert_eq!(stats.albums_deleted, 1);
        assert_eq!(stats.records_skipped, 1);
        assert_eq!(tree.album_count(), 2);
    }

    #[test]
    fn test_config_from_settings() {
        let settings = MergeSettings::default()
            .with_commit_retry_attempts(3)
            .with_commit_retry_backoff_ms(10)
            .with_first_import_sort_by_release_date(false);
        let config = MergeConfig::from(settings);

        assert_eq!(config.commit_retry_attempts, 3);
        assert_eq!(config.commit_retry_backoff, Duration::from_millis(10));
        assert!(!config.first_import_sort_by_release_date);
    }
}
