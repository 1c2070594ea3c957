//! # Support Portal Source
//!
//! Everything needed to read records out of the support portal: the record
//! models, the page-level API client and the paginating reader that turns a
//! marker-chained sequence of pages into one ordered list.
//!
//! ## Contained Modules:
//! - **`model`**: `Maintenance` (company/subscription record) and
//!   `MaintenanceRecord` (one maintenance history entry).
//! - **`client`**: the `SourceApi` trait and its HTTP implementation `SupportClient`.
//! - **`reader`**: `Marker`, adaptive `PageSizer` and `fetch_all`.

/// Record models as returned by the support portal.
pub mod model;
/// Page-level access to the support portal.
pub mod client;
/// Marker-driven pagination over a `SourceApi`.
pub mod reader;

pub use client::{PageRequest, RawPage, Resource, SourceApi, SupportClient};
pub use model::{Maintenance, MaintenanceRecord};
pub use reader::{fetch_all, FetchOutcome, Marker, PageSizer};
