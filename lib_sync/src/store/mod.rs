//! # Store Module
//!
//! Local persistence for small typed values that must survive a restart,
//! chiefly the pagination markers of the sync tasks.
//!
//! ## Contained Modules:
//! - **`cache_file`**: `FileStore`, a JSON-file key-value store with optional
//!   per-key expiry, guarded by an exclusive file lock.

/// File-backed key-value store with expiry and an explicit found/missing/unreadable lookup.
pub mod cache_file;

pub use cache_file::{FileStore, Lookup, StoreError};
