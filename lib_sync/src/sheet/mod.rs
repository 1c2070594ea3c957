//! # Destination Sheet
//!
//! The customer table the engine writes to. Rows are addressed by an opaque
//! record id and matched to support records by the customer's full name.
//!
//! ## Contained Modules:
//! - **`columns`**: column names, `DestinationRow` and lenient decoding of
//!   the loosely typed cell values the sheet API returns.
//! - **`feishu`**: the `SheetApi` trait (search/create/update) and its HTTP
//!   implementation `FeishuSheet`.
//! - **`locator`**: `CustomerSheet`, the business-level view: find a row by
//!   company, read the highest serial, create rows under a single-writer gate.

/// Column names and row decoding.
pub mod columns;
/// Row-level sheet API.
pub mod feishu;
/// Company lookup and serial assignment.
pub mod locator;

pub use columns::DestinationRow;
pub use feishu::{Condition, FeishuSheet, Fields, SearchQuery, SheetApi, SheetRow};
pub use locator::{CreateOutcome, CreatedRow, CustomerSheet};
