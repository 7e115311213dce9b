//! # Core Configuration Module
//!
//! Configuration for the library reconciliation core.
//!
//! ## Overview
//!
//! A builder constructs a [`CoreConfig`] holding every dependency and setting
//! the core needs. Validation is fail-fast: a missing [`TrackSource`] or an
//! out-of-range merge setting is reported from `build()`, never later.
//!
//! ## Required Dependencies
//!
//! - `TrackSource` - the host music library
//! - Database path - location of the persisted Library Tree
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, MergeSettings};
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .database_path("/path/to/library.db")
//!     .track_source(Arc::new(MyTrackSource))
//!     .merge_settings(MergeSettings::default().with_commit_retry_attempts(2))
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // No TrackSource injected
//! let config = CoreConfig::builder()
//!     .database_path("/path/to/library.db")
//!     .build()
//!     .expect("Should fail - missing track source");
//! ```

use crate::error::{Error, Result};
use bridge_traits::{LoggerSink, TrackSource};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Upper bound on commit retries per merge.
pub const MAX_COMMIT_RETRY_ATTEMPTS: u32 = 10;

/// Upper bound on the delay between commit retries.
pub const MAX_COMMIT_RETRY_BACKOFF_MS: u64 = 60_000;

const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

/// Core configuration.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Path to the SQLite database file
    pub database_path: PathBuf,

    /// Host music library (required)
    pub track_source: Arc<dyn TrackSource>,

    /// Capacity of the event bus ring buffer
    pub event_buffer_size: usize,

    /// Merge engine tuning
    pub merge: MergeSettings,

    /// Optional sink that receives forwarded log entries
    pub logger_sink: Option<Arc<dyn LoggerSink>>,

    /// Run a merge whenever the track source reports a change
    pub watch_source_changes: bool,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("database_path", &self.database_path)
            .field("track_source", &"TrackSource { ... }")
            .field("event_buffer_size", &self.event_buffer_size)
            .field("merge", &self.merge)
            .field(
                "logger_sink",
                &self.logger_sink.as_ref().map(|_| "LoggerSink { ... }"),
            )
            .field("watch_source_changes", &self.watch_source_changes)
            .finish()
    }
}

/// Tuning knobs for the merge engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeSettings {
    /// Additional commit attempts after the first one fails.
    ///
    /// Default: 1
    pub commit_retry_attempts: u32,

    /// Delay between commit attempts in milliseconds.
    ///
    /// Default: 250ms
    pub commit_retry_backoff_ms: u64,

    /// On first import, order albums newest release first.
    ///
    /// Default: true
    pub first_import_sort_by_release_date: bool,
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            commit_retry_attempts: 1,
            commit_retry_backoff_ms: 250,
            first_import_sort_by_release_date: true,
        }
    }
}

impl MergeSettings {
    pub fn with_commit_retry_attempts(mut self, attempts: u32) -> Self {
        self.commit_retry_attempts = attempts;
        self
    }

    pub fn with_commit_retry_backoff_ms(mut self, backoff_ms: u64) -> Self {
        self.commit_retry_backoff_ms = backoff_ms;
        self
    }

    pub fn with_first_import_sort_by_release_date(mut self, enabled: bool) -> Self {
        self.first_import_sort_by_release_date = enabled;
        self
    }

    /// Validates the settings
    pub fn validate(&self) -> Result<()> {
        if self.commit_retry_attempts > MAX_COMMIT_RETRY_ATTEMPTS {
            return Err(Error::Config(format!(
                "Commit retry attempts exceed maximum of {}",
                MAX_COMMIT_RETRY_ATTEMPTS
            )));
        }

        if self.commit_retry_backoff_ms > MAX_COMMIT_RETRY_BACKOFF_MS {
            return Err(Error::Config(
                "Commit retry backoff exceeds maximum of 60 seconds (60,000ms)".to_string(),
            ));
        }

        Ok(())
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    ///
    /// ```no_run
    /// use core_runtime::config::CoreConfig;
    ///
    /// let builder = CoreConfig::builder();
    /// ```
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// This checks:
    /// - Database path is not empty
    /// - Event buffer is not empty
    /// - Merge settings are within bounds
    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        self.merge.validate()
    }
}

fn track_source_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "TrackSource".to_string(),
        message: "TrackSource implementation is required to read the host music library. \
                 Desktop: inject bridge_desktop::JsonSnapshotTrackSource. \
                 Mobile: inject the platform media library adapter."
            .to_string(),
    }
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    database_path: Option<PathBuf>,
    track_source: Option<Arc<dyn TrackSource>>,
    event_buffer_size: Option<usize>,
    merge: Option<MergeSettings>,
    logger_sink: Option<Arc<dyn LoggerSink>>,
    watch_source_changes: Option<bool>,
}

impl CoreConfigBuilder {
    /// Sets the database file path (required).
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Sets the host music library (required).
    pub fn track_source(mut self, source: Arc<dyn TrackSource>) -> Self {
        self.track_source = Some(source);
        self
    }

    /// Sets the event bus capacity (default: 100).
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    pub fn merge_settings(mut self, settings: MergeSettings) -> Self {
        self.merge = Some(settings);
        self
    }

    pub fn logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    /// Enables or disables merging on source change notifications (default: enabled).
    pub fn watch_source_changes(mut self, enabled: bool) -> Self {
        self.watch_source_changes = Some(enabled);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] when the database path is missing or a setting is out of range
    /// - [`Error::CapabilityMissing`] when no `TrackSource` was injected
    pub fn build(self) -> Result<CoreConfig> {
        let database_path = self.database_path.ok_or_else(|| {
            Error::Config("Database path is required. Use .database_path() to set it.".to_string())
        })?;

        let track_source = self.track_source.ok_or_else(track_source_missing_error)?;

        let config = CoreConfig {
            database_path,
            track_source,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            merge: self.merge.unwrap_or_default(),
            logger_sink: self.logger_sink,
            watch_source_changes: self.watch_source_changes.unwrap_or(true),
        };

        config.validate()?;

        Ok(config)
    }
}
