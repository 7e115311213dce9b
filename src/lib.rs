//! Workspace placeholder crate.
//!
//! This crate exposes shared feature flags that map to the individual
//! workspace crates. Host applications can depend on `shelf-workspace` and
//! enable `desktop-shims` to get the bootstrap façade from `core-service`
//! together with the desktop Track Source adapter.

#[cfg(feature = "desktop-shims")]
pub use core_service::*;
