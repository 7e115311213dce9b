//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! Desktop hosts have no system music library API the core can rely on, so
//! the library is exchanged as a JSON snapshot file:
//! - `TrackSource` using `tokio::fs` and `serde_json`
//! - Change notifications pushed by the host or detected by polling the
//!   file's modification time
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::JsonSnapshotTrackSource;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let source = Arc::new(JsonSnapshotTrackSource::new(
//!         JsonSnapshotTrackSource::default_path(),
//!     ));
//!     source.watch(Duration::from_secs(2));
//!
//!     // Use in core configuration
//! }
//! ```

mod track_source;

pub use track_source::JsonSnapshotTrackSource;
