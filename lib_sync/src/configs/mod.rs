//! # Configuration Modules
//!
//! This module aggregates the configuration providers used by the sync
//! service. There is a single provider today: the YAML-backed `SyncConfig`.

/// Service configuration: endpoints, credentials, table identifiers and tuning knobs.
pub mod config_sync;
