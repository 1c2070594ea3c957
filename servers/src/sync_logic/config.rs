use anyhow::{Context, Result};
use clap::Parser;
use lib_sync::SyncConfig;
use std::path::PathBuf;

const DEFAULT_CONFIG_FILE: &str = "config.yml";

#[derive(Parser, Debug, Clone, Default)]
#[clap(about = "Support portal to sheet synchronization service", version)]
pub struct Cli {
    #[clap(short = 'f', long = "config", env = "SYNC_CONFIG_PATH", help = "Path to the YAML configuration file (default: config.yml).")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "SYNC_PORT", help = "Port of the HTTP front door.")]
    pub port: Option<u16>,

    #[clap(long, env = "SYNC_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "SYNC_LOG_LEVEL", help = "Logging level (debug, info, warn, error).")]
    pub log_level: Option<String>,

    #[clap(long, env = "SYNC_STORE_PATH", help = "Path of the marker store file.")]
    pub store_path: Option<PathBuf>,

    #[clap(long, env = "SYNC_INTERVAL_SECS", help = "Seconds between two cycles of a sync task.")]
    pub sync_interval_secs: Option<u64>,
}

/// Everything the binary needs: the library configuration plus logging settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub sync: SyncConfig,
    pub log_dir: PathBuf,
    pub log_level: String,
}

impl Cli {
    // CLI and environment values override the file for Some values
    fn apply(self, mut sync: SyncConfig) -> ServerConfig {
        if let Some(port) = self.port {
            sync.port = port;
        }
        if let Some(store_path) = self.store_path {
            sync.store_path = store_path;
        }
        if let Some(secs) = self.sync_interval_secs {
            sync.sync_interval_secs = secs;
        }
        ServerConfig {
            sync,
            log_dir: self.log_dir.unwrap_or_else(|| PathBuf::from("./logs")),
            log_level: self.log_level.unwrap_or_else(|| "info".to_string()),
        }
    }
}

/// Resolves the configuration: defaults, then the YAML file, then CLI/env.
///
/// A missing default file is fine. A file that exists but cannot be read or
/// parsed, or an explicitly named file that does not exist, is an error.
pub fn resolve(cli: Cli) -> Result<ServerConfig> {
    // 1. Locate the config file
    let explicit = cli.config_path.is_some();
    let path = cli
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    // 2. Load it over the defaults
    let sync = if path.exists() || explicit {
        let loaded = SyncConfig::from_yaml_file(&path)
            .with_context(|| format!("loading configuration from {}", path.display()))?;
        log::info!("Loaded config from {}", path.display());
        loaded
    } else {
        log::info!(
            "Config file not found at {}. Using defaults and environment/CLI variables.",
            path.display()
        );
        SyncConfig::default()
    };

    // 3. Override with environment variables and CLI arguments
    Ok(cli.apply(sync))
}

pub fn load_config() -> Result<ServerConfig> {
    // .env is optional
    let _ = dotenvy::dotenv();
    resolve(Cli::parse())
}
