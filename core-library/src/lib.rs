//! # Library Management Module
//!
//! Owns the persisted, user-orderable view of the music library.
//!
//! ## Overview
//!
//! This crate manages:
//! - The three-level hierarchy `Collection → Album → Song` ([`models`])
//! - An id-indexed arena of that hierarchy with pending-change tracking ([`tree`])
//! - SQLite schema, migrations and connection pooling ([`db`])
//! - Storage backends behind the [`LibraryStore`] trait ([`repositories`])
//!
//! Parent links are plain ids; each parent's ordered list of child ids is the
//! source of truth for order indices.

pub mod db;
pub mod error;
pub mod models;
pub mod repositories;
pub mod tree;

pub use error::{LibraryError, Result};
pub use models::{Album, AlbumId, Collection, CollectionId, Song, SongId};
pub use repositories::{InMemoryLibraryStore, LibraryStore, SqliteLibraryStore};
pub use tree::{ChangeSet, LibraryTree};
