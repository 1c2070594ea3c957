//! # lib_sync
//!
//! Shared library behind the `server_sync` binary. It keeps customer,
//! subscription and maintenance records held in the support portal in step
//! with the rows of a destination sheet, and announces newly onboarded
//! customers on a chat webhook.
//!
//! Every folder is gated behind a cargo feature so binaries only pull the
//! dependency stack they need:
//!
//! - **`configs`**: the service configuration value and its YAML loader.
//! - **`store`**: the file-backed key-value store holding pagination markers.
//! - **`retrieve`**: the retrying HTTP `ApiClient`.
//! - **`sync`**: the engine itself (source reader, destination sheet,
//!   reconciler, log merge, webhook notifier, task scheduler).

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

#[cfg(feature = "configs")]
pub mod configs;

#[cfg(feature = "store")]
pub mod store;

#[cfg(feature = "retrieve")]
pub mod retrieve;

#[cfg(feature = "sync")]
pub mod errors;
#[cfg(feature = "sync")]
pub mod sheet;
#[cfg(feature = "sync")]
pub mod support;
#[cfg(feature = "sync")]
pub mod workflow;

#[cfg(all(test, feature = "sync"))]
pub(crate) mod fakes;

// Re-export the types binaries touch most.
#[cfg(feature = "configs")]
pub use configs::config_sync::SyncConfig;
#[cfg(feature = "sync")]
pub use errors::SyncError;
#[cfg(feature = "store")]
pub use store::cache_file::{FileStore, Lookup};
