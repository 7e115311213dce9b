//! Orchestration tests: single flight, commit retry, events and the change
//! listener.

mod common;

use async_trait::async_trait;
use bridge_traits::{BridgeError, LibraryChange, TrackRecord, TrackSource};
use common::*;
use core_library::{InMemoryLibraryStore, LibraryStore};
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent, MergeEvent};
use core_sync::{MergeOutcome, MergePhase, MergeTrigger, SyncError};
use mockall::mock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Notify, Semaphore};

mock! {
    Source {}

    #[async_trait]
    impl TrackSource for Source {
        async fn fetch_tracks(&self) -> bridge_traits::error::Result<Vec<TrackRecord>>;
        fn subscribe_changes(&self) -> broadcast::Receiver<LibraryChange>;
    }
}

/// Source whose fetch blocks until the test releases it.
struct GatedSource {
    records: Vec<TrackRecord>,
    entered: Notify,
    gate: Semaphore,
    fetches: AtomicUsize,
    changes: broadcast::Sender<LibraryChange>,
}

impl GatedSource {
    fn new(records: Vec<TrackRecord>) -> Arc<Self> {
        let (changes, _) = broadcast::channel(4);
        Arc::new(Self {
            records,
            entered: Notify::new(),
            gate: Semaphore::new(0),
            fetches: AtomicUsize::new(0),
            changes,
        })
    }
}

#[async_trait]
impl TrackSource for GatedSource {
    async fn fetch_tracks(&self) -> bridge_traits::error::Result<Vec<TrackRecord>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| BridgeError::OperationFailed(e.to_string()))?;
        permit.forget();
        Ok(self.records.clone())
    }

    fn subscribe_changes(&self) -> broadcast::Receiver<LibraryChange> {
        self.changes.subscribe()
    }
}

fn drain(events: &mut broadcast::Receiver<CoreEvent>) -> Vec<CoreEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}

// ============================================================================
// Single flight
// ============================================================================

#[tokio::test]
async fn test_requests_during_merge_coalesce_into_one_rerun() {
    let source = GatedSource::new(vec![track("t1", "a1", 1, 1)]);
    let bus = EventBus::new(64);
    let mut events = bus.subscribe();
    let engine = engine(Arc::new(InMemoryLibraryStore::new()), source.clone(), &bus);

    let running = tokio::spawn({
        let engine = engine.clone();
        async move { engine.request_merge().await }
    });
    source.entered.notified().await;
    assert!(engine.is_merging());

    assert_eq!(engine.request_merge().await, MergeTrigger::Coalesced);
    assert_eq!(engine.request_merge().await, MergeTrigger::Coalesced);
    assert!(matches!(
        engine.merge_now().await,
        Err(SyncError::MergeInProgress)
    ));

    source.gate.add_permits(10);
    let trigger = running.await.unwrap();

    match trigger {
        MergeTrigger::Ran { runs, last } => {
            assert_eq!(runs, 2);
            assert!(last.is_completed());
        }
        other => panic!("expected merges to run, got {:?}", other),
    }
    assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
    assert!(!engine.is_merging());

    let coalesced = drain(&mut events)
        .into_iter()
        .filter(|e| matches!(e, CoreEvent::Merge(MergeEvent::Coalesced)))
        .count();
    assert_eq!(coalesced, 2);
}

#[tokio::test]
async fn test_idle_request_runs_once() {
    let source = ScriptedSource::new(vec![track("t1", "a1", 1, 1)]);
    let engine = engine(Arc::new(InMemoryLibraryStore::new()), source, &EventBus::new(16));

    match engine.request_merge().await {
        MergeTrigger::Ran { runs, last } => {
            assert_eq!(runs, 1);
            assert!(last.is_completed());
        }
        other => panic!("expected a merge to run, got {:?}", other),
    }
}

#[tokio::test]
async fn test_request_during_merge_now_gets_follow_up_run() {
    let source = GatedSource::new(vec![track("t1", "a1", 1, 1)]);
    let engine = engine(Arc::new(InMemoryLibraryStore::new()), source.clone(), &EventBus::new(32));

    let running = tokio::spawn({
        let engine = engine.clone();
        async move { engine.merge_now().await }
    });
    source.entered.notified().await;

    assert_eq!(engine.request_merge().await, MergeTrigger::Coalesced);

    source.gate.add_permits(10);
    let outcome = running.await.unwrap().unwrap();

    assert!(outcome.is_completed());
    assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
    assert!(!engine.is_merging());
    assert_eq!(engine.status().merges_completed, 2);
}

#[tokio::test]
async fn test_cancelled_request_releases_flight() {
    let source = GatedSource::new(vec![track("t1", "a1", 1, 1)]);
    let store = Arc::new(InMemoryLibraryStore::new());
    let engine = engine(store.clone(), source.clone(), &EventBus::new(32));

    let timed_out = tokio::time::timeout(Duration::from_millis(50), engine.request_merge()).await;
    assert!(timed_out.is_err());
    assert!(!engine.is_merging());

    source.gate.add_permits(10);
    match engine.request_merge().await {
        MergeTrigger::Ran { runs, last } => {
            assert_eq!(runs, 1);
            assert!(last.is_completed());
        }
        other => panic!("expected a merge to run, got {:?}", other),
    }
    assert_eq!(store.load_tree().await.unwrap().song_count(), 1);
}

// ============================================================================
// Source failures
// ============================================================================

#[tokio::test]
async fn test_unavailable_source_leaves_store_untouched() {
    let store = Arc::new(InMemoryLibraryStore::new());
    let seed_source = ScriptedSource::new(vec![track("t1", "a1", 1, 1)]);
    engine(store.clone(), seed_source, &EventBus::new(16))
        .merge_now()
        .await
        .unwrap();
    let before = layout(&store.load_tree().await.unwrap());

    let mut source = MockSource::new();
    source
        .expect_fetch_tracks()
        .times(1)
        .returning(|| Err(BridgeError::NotAvailable("permission revoked".to_string())));
    let bus = EventBus::new(16);
    let mut events = bus.subscribe();
    let engine = engine(store.clone(), Arc::new(source), &bus);

    let trigger = engine.request_merge().await;

    assert_eq!(
        trigger,
        MergeTrigger::Ran {
            runs: 1,
            last: MergeOutcome::SourceUnavailable
        }
    );
    assert!(drain(&mut events).is_empty());
    assert!(!engine.status().last_merge_failed);
    assert_eq!(layout(&store.load_tree().await.unwrap()), before);
}

// ============================================================================
// Persistence failures
// ============================================================================

#[tokio::test]
async fn test_commit_failure_is_retried() {
    let store = FlakyStore::new(1);
    let source = ScriptedSource::new(vec![track("t1", "a1", 1, 1)]);
    let engine = engine(store.clone(), source, &EventBus::new(16));

    let outcome = engine.merge_now().await.unwrap();

    assert!(outcome.is_completed());
    assert_eq!(store.commit_calls.load(Ordering::SeqCst), 2);
    assert_eq!(store.inner.load_tree().await.unwrap().song_count(), 1);
}

#[tokio::test]
async fn test_repeated_commit_failure_is_recorded_and_recoverable() {
    let store = FlakyStore::new(5);
    let source = ScriptedSource::new(vec![track("t1", "a1", 1, 1)]);
    let bus = EventBus::new(32);
    let mut events = bus.subscribe();
    let engine = engine(store.clone(), source, &bus);

    let outcome = engine.merge_now().await.unwrap();

    match outcome {
        MergeOutcome::Failed { attempts, .. } => assert_eq!(attempts, 2),
        other => panic!("expected a failed merge, got {:?}", other),
    }
    let status = engine.status();
    assert!(status.last_merge_failed);
    assert!(status.last_error.is_some());
    assert_eq!(status.phase, MergePhase::Idle);
    assert_eq!(store.inner.load_tree().await.unwrap().song_count(), 0);
    assert!(drain(&mut events).iter().any(|e| matches!(
        e,
        CoreEvent::Merge(MergeEvent::Failed { attempts: 2, .. })
    )));

    store.heal();
    assert!(engine.merge_now().await.unwrap().is_completed());
    let status = engine.status();
    assert!(!status.last_merge_failed);
    assert_eq!(status.last_error, None);
    assert_eq!(store.inner.load_tree().await.unwrap().song_count(), 1);
}

// ============================================================================
// Events
// ============================================================================

#[tokio::test]
async fn test_merge_event_sequence() {
    let source = ScriptedSource::new(vec![track("t1", "a1", 1, 1), track("t2", "a2", 1, 2)]);
    let bus = EventBus::new(32);
    let mut events = bus.subscribe();
    let engine = engine(Arc::new(InMemoryLibraryStore::new()), source, &bus);

    engine.merge_now().await.unwrap();

    let seen = drain(&mut events);
    let merge_id = match seen.first() {
        Some(CoreEvent::Merge(MergeEvent::Started {
            merge_id,
            first_import,
        })) => {
            assert!(*first_import);
            merge_id.clone()
        }
        other => panic!("expected a start event, got {:?}", other),
    };
    match seen.last() {
        Some(CoreEvent::Merge(MergeEvent::Completed {
            merge_id: completed_id,
            songs_created,
            albums_created,
            ..
        })) => {
            assert_eq!(completed_id, &merge_id);
            assert_eq!(*songs_created, 2);
            assert_eq!(*albums_created, 2);
        }
        other => panic!("expected a completion event, got {:?}", other),
    }
    assert_eq!(seen.len(), 7);
}

// ============================================================================
// Change listener
// ============================================================================

#[tokio::test]
async fn test_change_notification_triggers_merge() {
    let store = Arc::new(InMemoryLibraryStore::new());
    let source = ScriptedSource::new(vec![track("t1", "a1", 1, 1)]);
    let bus = EventBus::new(32);
    let mut events = bus.subscribe();
    let engine = engine(store.clone(), source.clone(), &bus);

    engine.clone().spawn_change_listener();
    // Restarting replaces the first subscription.
    engine.clone().spawn_change_listener();
    tokio::task::yield_now().await;
    source.notify();

    let mut saw_change = false;
    let completed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Ok(CoreEvent::Library(LibraryEvent::Changed)) => saw_change = true,
                Ok(CoreEvent::Merge(MergeEvent::Completed { .. })) => break,
                Ok(_) => {}
                Err(e) => panic!("event stream failed: {:?}", e),
            }
        }
    })
    .await;

    assert!(completed.is_ok(), "merge did not complete");
    assert!(saw_change);
    assert_eq!(store.load_tree().await.unwrap().song_count(), 1);

    engine.stop_change_listener();
}
