//! # Repository Pattern Implementation
//!
//! Storage backends for the library hierarchy.
//!
//! ## Architecture
//!
//! - [`LibraryStore`] defines the interface: whole-tree load, atomic commit of
//!   a [`ChangeSet`](crate::tree::ChangeSet), and index-ordered child queries
//! - [`SqliteLibraryStore`] uses sqlx against the pool from [`crate::db`]
//! - [`InMemoryLibraryStore`] keeps rows in memory for tests and ephemeral hosts

pub mod library;
pub mod memory;

pub use library::{LibraryStore, SqliteLibraryStore};
pub use memory::InMemoryLibraryStore;
