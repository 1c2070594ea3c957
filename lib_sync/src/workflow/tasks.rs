//! # Sync Tasks
//!
//! The two recurring jobs of the service, each one full pass of
//! fetch-all-pages, reconcile every record, commit the marker:
//!
//! - **`company-records`** ([`CompanySyncTask`]): company/subscription records
//!   from `/maintenances` are created or updated in the customer table. Every
//!   newly created customer is announced on the chat webhook.
//! - **`maintenance-log`** ([`MaintenanceLogTask`]): maintenance history
//!   entries from `/maintenance-records` are merged into the log column of
//!   the customer's row.
//!
//! Only a failed page fetch fails a cycle. Record-level errors are logged
//! with the company name and counted in the [`CycleReport`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::SyncError;
use crate::sheet::columns;
use crate::sheet::feishu::Fields;
use crate::sheet::locator::CustomerSheet;
use crate::store::cache_file::{FileStore, Lookup};
use crate::support::client::{Resource, SourceApi};
use crate::support::model::{Maintenance, MaintenanceRecord};
use crate::support::reader::{fetch_all, Marker, PageSizer};
use crate::workflow::logmerge::{self, LogEntry};
use crate::workflow::notify::Notifier;
use crate::workflow::reconcile::{Outcome, Reconciler};
use crate::workflow::scheduler::CycleTask;

pub const COMPANY_TASK: &str = "company-records";
pub const MAINTENANCE_LOG_TASK: &str = "maintenance-log";

/// Whether a cycle starts from the stored marker or from the first page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerPolicy {
    Resume,
    /// Every cycle reads from the start. The marker is still recorded, and
    /// is only read back by a task switched to `Resume` with `with_policy`.
    Rescan,
}

/// What one cycle did.
///
/// Outcome counts are per record for the company task and per company for
/// the log task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub task: &'static str,
    pub fetched: usize,
    pub pages: u32,
    pub created: u32,
    pub updated: u32,
    pub unchanged: u32,
    pub skipped: u32,
    pub failed: u32,
    pub resume_from: Marker,
}

impl CycleReport {
    fn new(task: &'static str, fetched: usize, pages: u32, resume_from: Marker) -> Self {
        Self {
            task,
            fetched,
            pages,
            created: 0,
            updated: 0,
            unchanged: 0,
            skipped: 0,
            failed: 0,
            resume_from,
        }
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} records in {} pages, {} created, {} updated, {} unchanged, {} skipped, {} failed, resume at {}",
            self.task,
            self.fetched,
            self.pages,
            self.created,
            self.updated,
            self.unchanged,
            self.skipped,
            self.failed,
            self.resume_from.to_wire()
        )
    }
}

pub fn marker_key(task: &str) -> String {
    format!("last-marker/{}", task)
}

/// The stored marker of `task`. Missing or unreadable markers mean "start".
pub fn load_marker(store: &FileStore, task: &str) -> Marker {
    match store.get::<i64>(&marker_key(task)) {
        Lookup::Found(wire) => match Marker::from_wire(wire) {
            Marker::End => Marker::Start,
            marker => marker,
        },
        Lookup::NotFound => Marker::Start,
        Lookup::Unreadable(e) => {
            log::warn!("[{}] Stored marker is unreadable, starting over: {}", task, e);
            Marker::Start
        }
    }
}

/// Records the marker of a finished cycle. A failed write is logged only.
pub fn commit_marker(store: &FileStore, task: &str, marker: Marker) {
    if let Err(e) = store.set(&marker_key(task), &marker.to_wire(), 0) {
        log::error!("[{}] Failed to persist marker {:?}: {}", task, marker, e);
    }
}

fn start_marker(store: &FileStore, task: &str, policy: MarkerPolicy) -> Marker {
    let stored = load_marker(store, task);
    match policy {
        MarkerPolicy::Resume => stored,
        MarkerPolicy::Rescan => Marker::Start,
    }
}

/// Creates and updates customer rows from company records.
pub struct CompanySyncTask {
    source: Arc<dyn SourceApi>,
    reconciler: Reconciler,
    store: Arc<FileStore>,
    notifier: Arc<dyn Notifier>,
    sizer: PageSizer,
    resource: Resource,
    product: String,
    mentions: Vec<String>,
    policy: MarkerPolicy,
    cycle_summary: bool,
}

impl CompanySyncTask {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: Arc<dyn SourceApi>,
        sheet: Arc<CustomerSheet>,
        store: Arc<FileStore>,
        notifier: Arc<dyn Notifier>,
        sizer: PageSizer,
        product: &str,
        region: &str,
        mentions: Vec<String>,
    ) -> Self {
        Self {
            source,
            reconciler: Reconciler::new(sheet),
            store,
            notifier,
            sizer,
            resource: Resource::Maintenances {
                product: product.to_string(),
                region: region.to_string(),
            },
            product: product.to_string(),
            mentions,
            policy: MarkerPolicy::Rescan,
            cycle_summary: false,
        }
    }

    pub fn with_policy(mut self, policy: MarkerPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_cycle_summary(mut self, enabled: bool) -> Self {
        self.cycle_summary = enabled;
        self
    }

    async fn announce(&self, final_name: &str) {
        let content = format!("{}-{}-support", final_name, self.product);
        if let Err(e) = self.notifier.send_text(&content, &self.mentions).await {
            log::error!("[{}] Failed to announce '{}': {}", COMPANY_TASK, final_name, e);
        }
    }

    pub async fn run_cycle(&mut self) -> Result<CycleReport, SyncError> {
        let start = start_marker(&self.store, COMPANY_TASK, self.policy);
        let outcome =
            fetch_all::<Maintenance>(self.source.as_ref(), &self.resource, start, &mut self.sizer)
                .await?;
        let mut report = CycleReport::new(
            COMPANY_TASK,
            outcome.records.len(),
            outcome.pages,
            outcome.resume_from,
        );

        for remote in &outcome.records {
            match self.reconciler.reconcile(remote).await {
                Ok(Outcome::Created { serial, final_name }) => {
                    report.created += 1;
                    log::info!(
                        "[{}] Created '{}' with serial {}",
                        COMPANY_TASK,
                        remote.company_name(),
                        serial
                    );
                    self.announce(&final_name).await;
                }
                Ok(Outcome::Updated { record_id }) => {
                    report.updated += 1;
                    log::info!(
                        "[{}] Updated '{}' ({})",
                        COMPANY_TASK,
                        remote.company_name(),
                        record_id
                    );
                }
                Ok(Outcome::Unchanged) => report.unchanged += 1,
                Ok(Outcome::Skipped) => {
                    report.skipped += 1;
                    log::debug!("[{}] Skipped record {} without company", COMPANY_TASK, remote.id);
                }
                Err(e) => {
                    report.failed += 1;
                    log::error!("[{}] '{}': {}", COMPANY_TASK, remote.company_name(), e);
                }
            }
        }

        commit_marker(&self.store, COMPANY_TASK, outcome.resume_from);

        if self.cycle_summary {
            let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
            let content = format!("[{}] 完成 Support 门户客户记录同步", now);
            if let Err(e) = self.notifier.send_text(&content, &[]).await {
                log::error!("[{}] Failed to post cycle summary: {}", COMPANY_TASK, e);
            }
        }
        Ok(report)
    }
}

/// Merges maintenance history into the customer rows.
pub struct MaintenanceLogTask {
    source: Arc<dyn SourceApi>,
    sheet: Arc<CustomerSheet>,
    store: Arc<FileStore>,
    sizer: PageSizer,
    resource: Resource,
    policy: MarkerPolicy,
}

enum LogOutcome {
    Updated,
    Unchanged,
}

impl MaintenanceLogTask {
    pub fn new(
        source: Arc<dyn SourceApi>,
        sheet: Arc<CustomerSheet>,
        store: Arc<FileStore>,
        sizer: PageSizer,
        region: &str,
    ) -> Self {
        Self {
            source,
            sheet,
            store,
            sizer,
            resource: Resource::MaintenanceRecords {
                region: region.to_string(),
            },
            policy: MarkerPolicy::Resume,
        }
    }

    pub fn with_policy(mut self, policy: MarkerPolicy) -> Self {
        self.policy = policy;
        self
    }

    async fn merge_company(
        &self,
        company: &str,
        entries: &[LogEntry],
    ) -> Result<LogOutcome, SyncError> {
        let row = self.sheet.find_by_company(company).await?;
        let record_id = match &row.record_id {
            Some(id) if row.exists() => id.clone(),
            _ => return Err(SyncError::RowMissing(company.to_string())),
        };

        let merged = logmerge::merge_all(&row.maintenance_log, entries);
        if merged == row.maintenance_log {
            return Ok(LogOutcome::Unchanged);
        }

        let mut fields = Fields::new();
        fields.insert(columns::MAINTENANCE_LOG.to_string(), Value::from(merged));
        self.sheet.update(&record_id, &fields).await?;
        Ok(LogOutcome::Updated)
    }

    pub async fn run_cycle(&mut self) -> Result<CycleReport, SyncError> {
        let start = start_marker(&self.store, MAINTENANCE_LOG_TASK, self.policy);
        let outcome = fetch_all::<MaintenanceRecord>(
            self.source.as_ref(),
            &self.resource,
            start,
            &mut self.sizer,
        )
        .await?;
        let mut report = CycleReport::new(
            MAINTENANCE_LOG_TASK,
            outcome.records.len(),
            outcome.pages,
            outcome.resume_from,
        );

        // One read-merge-write per company, entries kept in arrival order.
        let mut order: Vec<String> = Vec::new();
        let mut grouped: HashMap<String, Vec<LogEntry>> = HashMap::new();
        for record in &outcome.records {
            if record.company_name.is_empty() {
                report.skipped += 1;
                continue;
            }
            let entries = grouped.entry(record.company_name.clone()).or_insert_with(|| {
                order.push(record.company_name.clone());
                Vec::new()
            });
            entries.push(LogEntry::from_record(record));
        }

        for company in &order {
            let entries = grouped.get(company).map(Vec::as_slice).unwrap_or_default();
            match self.merge_company(company, entries).await {
                Ok(LogOutcome::Updated) => {
                    report.updated += 1;
                    log::info!(
                        "[{}] Merged {} entries into '{}'",
                        MAINTENANCE_LOG_TASK,
                        entries.len(),
                        company
                    );
                }
                Ok(LogOutcome::Unchanged) => report.unchanged += 1,
                Err(e) => {
                    report.failed += 1;
                    log::error!("[{}] '{}': {}", MAINTENANCE_LOG_TASK, company, e);
                }
            }
        }

        commit_marker(&self.store, MAINTENANCE_LOG_TASK, outcome.resume_from);
        Ok(report)
    }
}

/// The closed set of recurring tasks.
pub enum SyncTask {
    CompanyRecords(CompanySyncTask),
    MaintenanceLog(MaintenanceLogTask),
}

#[async_trait]
impl CycleTask for SyncTask {
    fn name(&self) -> &'static str {
        match self {
            SyncTask::CompanyRecords(_) => COMPANY_TASK,
            SyncTask::MaintenanceLog(_) => MAINTENANCE_LOG_TASK,
        }
    }

    async fn run_cycle(&mut self) -> Result<CycleReport, SyncError> {
        match self {
            SyncTask::CompanyRecords(task) => task.run_cycle().await,
            SyncTask::MaintenanceLog(task) => task.run_cycle().await,
        }
    }
}
