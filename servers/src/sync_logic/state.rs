use anyhow::{Context, Result};
use lib_sync::sheet::{CustomerSheet, FeishuSheet, SheetApi};
use lib_sync::support::{PageSizer, SourceApi, SupportClient};
use lib_sync::workflow::{
    CompanySyncTask, MaintenanceLogTask, Notifier, SyncTask, WebhookNotifier,
};
use lib_sync::{FileStore, SyncConfig};
use std::sync::Arc;

// Shared handles, built once at startup and cloned into every component
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<SyncConfig>,
    pub store: Arc<FileStore>,
    pub source: Arc<dyn SourceApi>,
    // One gate for every row creation in this process
    pub customers: Arc<CustomerSheet>,
    // Front door onboarding, with mentions
    pub group_notifier: Arc<dyn Notifier>,
    // Sync task announcements and summaries
    pub message_notifier: Arc<dyn Notifier>,
}

impl AppState {
    pub fn build(config: SyncConfig) -> Result<Self> {
        let store = FileStore::open(&config.store_path, &config.store_bucket)
            .with_context(|| format!("opening store {}", config.store_path.display()))?;
        let source = SupportClient::new(&config).context("building support client")?;
        let sheet: Arc<dyn SheetApi> =
            Arc::new(FeishuSheet::new(&config).context("building sheet client")?);
        let group_notifier =
            WebhookNotifier::new(&config.wechat_group_robot_webhook, config.webhook_attempts)
                .context("building group webhook")?;
        let message_notifier =
            WebhookNotifier::new(&config.wechat_message_robot_webhook, config.webhook_attempts)
                .context("building message webhook")?;

        Ok(Self::from_parts(
            config,
            Arc::new(store),
            Arc::new(source),
            sheet,
            Arc::new(group_notifier),
            Arc::new(message_notifier),
        ))
    }

    pub fn from_parts(
        config: SyncConfig,
        store: Arc<FileStore>,
        source: Arc<dyn SourceApi>,
        sheet: Arc<dyn SheetApi>,
        group_notifier: Arc<dyn Notifier>,
        message_notifier: Arc<dyn Notifier>,
    ) -> Self {
        let customers = Arc::new(CustomerSheet::new(sheet, config.serial_search_page_size));
        Self {
            config: Arc::new(config),
            store,
            source,
            customers,
            group_notifier,
            message_notifier,
        }
    }

    fn page_sizer(&self) -> PageSizer {
        PageSizer::new(self.config.startup_page_size, self.config.steady_page_size)
    }

    /// The recurring tasks, each with its own page sizer.
    pub fn sync_tasks(&self) -> Vec<SyncTask> {
        let config = &self.config;
        let company = CompanySyncTask::new(
            self.source.clone(),
            self.customers.clone(),
            self.store.clone(),
            self.message_notifier.clone(),
            self.page_sizer(),
            &config.product_name,
            &config.region,
            config.reminder_mobiles(),
        )
        .with_cycle_summary(config.notify_cycle_summary);
        let maintenance_log = MaintenanceLogTask::new(
            self.source.clone(),
            self.customers.clone(),
            self.store.clone(),
            self.page_sizer(),
            &config.region,
        );
        vec![
            SyncTask::CompanyRecords(company),
            SyncTask::MaintenanceLog(maintenance_log),
        ]
    }
}
