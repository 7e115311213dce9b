//! Core service façade and bootstrap helpers.
//!
//! This crate wires a host-provided `TrackSource` and a database path into
//! the library core: it opens the SQLite store, builds the event bus and the
//! [`LibraryEngine`], and starts listening for library changes. Desktop apps
//! typically enable the `desktop-shims` feature (which depends on
//! `bridge-desktop`) and call [`bootstrap_desktop`].
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use core_service::CoreService;
//!
//! let config = CoreConfig::builder()
//!     .database_path("library.db")
//!     .track_source(source)
//!     .build()?;
//! let core = CoreService::bootstrap(config).await?;
//! core.request_merge().await;
//! let collections = core.collections().await?;
//! ```

pub mod error;

pub use error::{CoreError, Result};

#[cfg(all(feature = "desktop-shims", not(target_arch = "wasm32")))]
pub use bridge_desktop::JsonSnapshotTrackSource;

pub use core_sync::{EngineStatus, MergeOutcome, MergeTrigger};

use bridge_traits::SystemClock;
use core_library::db::{create_pool, DatabaseConfig};
use core_library::{
    Album, AlbumId, Collection, CollectionId, LibraryStore, LibraryTree, Song, SqliteLibraryStore,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, EventStream};
use core_runtime::logging::{init_logging, strip_path, LoggingConfig};
use core_sync::{LibraryEngine, MergeConfig};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Database path that selects a private in-memory database.
pub const IN_MEMORY_DATABASE: &str = ":memory:";

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    engine: Arc<LibraryEngine>,
    store: Arc<dyn LibraryStore>,
    event_bus: EventBus,
}

impl CoreService {
    /// Open the database described by `config` and start the engine.
    pub async fn bootstrap(config: CoreConfig) -> Result<Self> {
        config.validate()?;

        if let Some(sink) = config.logger_sink.clone() {
            if let Err(e) = init_logging(LoggingConfig::default().with_logger_sink(sink)) {
                warn!(error = %e, "Logging already initialised, host sink not installed");
            }
        }

        let database = database_config(&config.database_path).await?;
        let pool = create_pool(database).await?;
        let store: Arc<dyn LibraryStore> = Arc::new(SqliteLibraryStore::new(pool));

        Ok(Self::with_store(config, store))
    }

    /// Start the engine over an already opened store.
    pub fn with_store(config: CoreConfig, store: Arc<dyn LibraryStore>) -> Self {
        let event_bus = EventBus::new(config.event_buffer_size);
        let engine = Arc::new(LibraryEngine::new(
            store.clone(),
            config.track_source.clone(),
            event_bus.clone(),
            MergeConfig::from(config.merge.clone()),
            Arc::new(SystemClock),
        ));

        if config.watch_source_changes {
            engine.clone().spawn_change_listener();
        }

        let database = config.database_path.to_string_lossy();
        info!(
            database = %strip_path(&database),
            watch = config.watch_source_changes,
            "Library core started"
        );

        Self {
            engine,
            store,
            event_bus,
        }
    }

    pub fn engine(&self) -> &Arc<LibraryEngine> {
        &self.engine
    }

    // ========================================================================
    // Merging
    // ========================================================================

    /// Run one merge now; fails if a merge is already running.
    pub async fn merge_now(&self) -> Result<MergeOutcome> {
        Ok(self.engine.merge_now().await?)
    }

    /// Merge, or coalesce into the merge already running.
    pub async fn request_merge(&self) -> MergeTrigger {
        self.engine.request_merge().await
    }

    pub fn status(&self) -> EngineStatus {
        self.engine.status()
    }

    // ========================================================================
    // Events
    // ========================================================================

    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.event_bus.subscribe()
    }

    pub fn events(&self) -> EventStream {
        EventStream::new(self.event_bus.subscribe())
    }

    // ========================================================================
    // Read API
    // ========================================================================

    pub async fn collections(&self) -> Result<Vec<Collection>> {
        Ok(self.store.collections().await?)
    }

    pub async fn albums_in(&self, collection: CollectionId) -> Result<Vec<Album>> {
        Ok(self.store.albums_in(collection).await?)
    }

    pub async fn songs_in(&self, album: AlbumId) -> Result<Vec<Song>> {
        Ok(self.store.songs_in(album).await?)
    }

    pub async fn library_tree(&self) -> Result<LibraryTree> {
        Ok(self.store.load_tree().await?)
    }

    /// Stop reacting to library change notifications.
    pub fn shutdown(&self) {
        self.engine.stop_change_listener();
        info!("Library core stopped");
    }
}

async fn database_config(path: &Path) -> Result<DatabaseConfig> {
    if path.as_os_str() == IN_MEMORY_DATABASE {
        return Ok(DatabaseConfig::in_memory());
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            CoreError::InitializationFailed(format!(
                "Cannot create database directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }
    Ok(DatabaseConfig::new(path))
}

/// Convenience bootstrapper for desktop hosts.
///
/// Reads the library from the JSON snapshot at `snapshot_path` and, when
/// `poll_interval` is set, polls the file for changes.
#[cfg(all(feature = "desktop-shims", not(target_arch = "wasm32")))]
pub async fn bootstrap_desktop(
    database_path: impl AsRef<Path>,
    snapshot_path: impl AsRef<Path>,
    poll_interval: Option<std::time::Duration>,
) -> Result<CoreService> {
    let source = Arc::new(JsonSnapshotTrackSource::new(snapshot_path.as_ref()));
    if let Some(interval) = poll_interval {
        source.watch(interval);
    }

    let config = CoreConfig::builder()
        .database_path(database_path.as_ref())
        .track_source(source)
        .build()?;
    CoreService::bootstrap(config).await
}
