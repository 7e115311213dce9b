//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the core library and the host. The
//! core never talks to the device music library directly; it asks a
//! [`TrackSource`](library::TrackSource) for a flat, unordered snapshot of
//! track records and listens for "library changed" notifications.
//!
//! ## Traits
//!
//! ### Library Access
//! - [`TrackSource`](library::TrackSource) - Snapshot fetch and change subscription
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | ✅ JSON snapshot source |
//! | iOS      | TBD                 | 📋 Planned |
//! | Android  | TBD                 | 📋 Planned |
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. A source
//! that cannot be queried (permission revoked, library not mounted) must
//! return [`BridgeError::NotAvailable`] so the core can treat the merge as a
//! no-op instead of a failure.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds so implementations can be
//! shared across async tasks behind an `Arc`.

pub mod error;
pub mod library;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use library::{LibraryChange, TrackRecord, TrackSource, UNKNOWN_NUMBER};
pub use time::{Clock, ConsoleLogger, FixedClock, LogEntry, LogLevel, LoggerSink, SystemClock};
