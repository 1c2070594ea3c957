//! # Sync Workflow
//!
//! The engine proper, built on the support reader and the customer sheet.
//!
//! ## Contained Modules:
//! - **`reconcile`**: skip/create/update decision for one company record.
//! - **`logmerge`**: id-deduplicating merge of maintenance history entries.
//! - **`notify`**: chat webhook with bounded immediate retries.
//! - **`tasks`**: the `company-records` and `maintenance-log` cycles and
//!   their persisted markers.
//! - **`scheduler`**: the fixed-interval runner with shutdown handling.

pub mod logmerge;
pub mod notify;
pub mod reconcile;
pub mod scheduler;
pub mod tasks;

pub use notify::{Notifier, NotifyError, WebhookNotifier};
pub use reconcile::{Action, Outcome, Reconciler};
pub use scheduler::{run_task, spawn_task, CycleTask};
pub use tasks::{CompanySyncTask, CycleReport, MaintenanceLogTask, MarkerPolicy, SyncTask};
