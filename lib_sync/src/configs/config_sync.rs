//! # Sync Service Configuration
//!
//! `SyncConfig` is built once at startup (defaults, then a YAML file, then
//! whatever overrides the binary applies) and handed to every component
//! constructor behind an `Arc`. Nothing in the library reads configuration
//! from a global.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yml::Error,
    },

    #[error("Missing required configuration value(s): {0}")]
    Missing(String),
}

/// Service configuration. Keys in the YAML file use the upper snake case
/// names (`SUPPORT_ENDPOINT`, `FEISHU_TABLE_ID`, ...); absent keys keep the
/// defaults from [`SyncConfig::default`].
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", default)]
pub struct SyncConfig {
    /// Port of the HTTP front door.
    pub port: u16,

    /// Group robot webhook used when a company is registered through the front door.
    pub wechat_group_robot_webhook: String,
    /// Message robot webhook used by the scheduled company sync.
    pub wechat_message_robot_webhook: String,
    /// Comma separated mobile numbers mentioned in onboarding messages.
    pub robot_reminds_mobile_phones: String,

    /// Base URL of the support portal.
    pub support_endpoint: String,
    pub support_username: String,
    pub support_password: String,

    /// Base URL of the destination sheet API.
    pub feishu_endpoint: String,
    /// Bearer token presented to the destination API. Acquiring and rotating
    /// it happens outside this service.
    pub feishu_access_token: String,
    pub feishu_table_app_token: String,
    pub feishu_table_id: String,

    /// Product filter for the company record listing.
    pub product_name: String,
    /// Region filter for both support listings.
    pub region: String,

    /// Location of the key-value file holding pagination markers.
    pub store_path: PathBuf,
    pub store_bucket: String,

    /// Seconds between the end of one cycle and the start of the next.
    pub sync_interval_secs: u64,
    /// Page size of the first source call after process start.
    pub startup_page_size: u32,
    /// Page size of every later source call.
    pub steady_page_size: u32,
    /// Transport retries applied to source reads.
    pub source_retries: u32,
    /// Total POST attempts per webhook message.
    pub webhook_attempts: u32,
    /// Rows requested when looking up the current maximum serial.
    pub serial_search_page_size: u32,
    /// Post a "sync completed" message after every company sync cycle.
    pub notify_cycle_summary: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            wechat_group_robot_webhook: String::new(),
            wechat_message_robot_webhook: String::new(),
            robot_reminds_mobile_phones: String::new(),
            support_endpoint: String::new(),
            support_username: String::new(),
            support_password: String::new(),
            feishu_endpoint: "https://open.feishu.cn".to_string(),
            feishu_access_token: String::new(),
            feishu_table_app_token: String::new(),
            feishu_table_id: String::new(),
            product_name: "JumpServer".to_string(),
            region: "northern".to_string(),
            store_path: PathBuf::from("cache.db"),
            store_bucket: "support-workflow".to_string(),
            sync_interval_secs: 60,
            startup_page_size: 5,
            steady_page_size: 1000,
            source_retries: 3,
            webhook_attempts: 5,
            serial_search_page_size: 10,
            notify_cycle_summary: false,
        }
    }
}

impl SyncConfig {
    /// Loads a YAML file on top of the defaults.
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parses YAML text on top of the defaults. An empty document yields the defaults.
    pub fn from_yaml_str(raw: &str) -> Result<Self, serde_yml::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yml::from_str(raw)
    }

    /// Checks that every endpoint and identifier the sync tasks need is present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("SUPPORT_ENDPOINT", &self.support_endpoint),
            ("FEISHU_ENDPOINT", &self.feishu_endpoint),
            ("FEISHU_TABLE_APP_TOKEN", &self.feishu_table_app_token),
            ("FEISHU_TABLE_ID", &self.feishu_table_id),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Missing(missing.join(", ")))
        }
    }

    /// The reminder mobiles as a list, ignoring blanks.
    pub fn reminder_mobiles(&self) -> Vec<String> {
        self.robot_reminds_mobile_phones
            .split(',')
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs.max(1))
    }
}

impl fmt::Display for SyncConfig {
    // Credentials are masked so the value can be logged at startup.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SyncConfig
    Port: {},
    Support endpoint: {} (user: {}, password: {}),
    Sheet endpoint: {} (token: {}),
    Table: {}/{},
    Product/region: {}/{},
    Store: {} [{}],
    Interval: {}s, page sizes: {}/{}, webhook attempts: {}
",
            self.port,
            self.support_endpoint,
            self.support_username,
            mask(&self.support_password),
            self.feishu_endpoint,
            mask(&self.feishu_access_token),
            self.feishu_table_app_token,
            self.feishu_table_id,
            self.product_name,
            self.region,
            self.store_path.display(),
            self.store_bucket,
            self.sync_interval_secs,
            self.startup_page_size,
            self.steady_page_size,
            self.webhook_attempts,
        )
    }
}

fn mask(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<unset>"
    } else {
        "*****"
    }
}
