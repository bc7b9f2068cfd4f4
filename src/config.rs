use anyhow::Result;
use config::{Config, ConfigError, File};
use moka::future::Cache;
use sea_orm::Database;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::schemas::AppState;
use crate::templates::Templates;

/// Environment variable naming an optional configuration file that is
/// layered on top of everything else.
pub const CONFIG_ENV_VAR: &str = "APP_CONFIG";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Name used in page titles and log lines
    pub app_name: String,
    /// Development mode: no log files
    pub debug: bool,
    /// Test mode: no log files
    pub testing: bool,
    pub database_url: String,
    pub bind_address: String,
    /// Directory the log file names are resolved against
    pub root_path: PathBuf,
    pub debug_log: String,
    pub error_log: String,
    /// Size at which a log file is rotated (0 disables rotation)
    pub log_max_bytes: u64,
    /// Number of rotated files kept next to each log
    pub log_backup_count: usize,
    pub cache_max_capacity: u64,
    pub cache_ttl_secs: u64,
    /// Topics per page on listings
    pub per_page: u64,
    pub session_cookie_name: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_name: "bbs".to_string(),
            debug: false,
            testing: false,
            database_url: "sqlite://bbs.db?mode=rwc".to_string(),
            bind_address: "0.0.0.0:3000".to_string(),
            root_path: PathBuf::from("."),
            debug_log: "logs/debug.log".to_string(),
            error_log: "logs/error.log".to_string(),
            log_max_bytes: 100_000,
            log_backup_count: 10,
            cache_max_capacity: 1000,
            cache_ttl_secs: 300,
            per_page: 20,
            session_cookie_name: "bbs_session".to_string(),
        }
    }
}

impl AppConfig {
    pub fn debug_log_path(&self) -> PathBuf {
        self.root_path.join(&self.debug_log)
    }

    pub fn error_log_path(&self) -> PathBuf {
        self.root_path.join(&self.error_log)
    }

    /// Whether the rotating log files are attached.
    pub fn file_logging_enabled(&self) -> bool {
        !(self.debug || self.testing)
    }
}

/// Load configuration.
///
/// Layers, lowest priority first: built-in defaults, the `overlay` file
/// given by the caller, then the file named by `APP_CONFIG`. A missing
/// `APP_CONFIG` file is ignored.
pub fn load_config(overlay: Option<&Path>) -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    let env_file = std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from);
    build_config(overlay, env_file.as_deref())
}

fn build_config(overlay: Option<&Path>, env_file: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder().add_source(Config::try_from(&AppConfig::default())?);

    if let Some(path) = overlay {
        debug!("Loading configuration from {}", path.display());
        builder = builder.add_source(File::from(path));
    }

    if let Some(path) = env_file {
        debug!("Loading configuration from ${} = {}", CONFIG_ENV_VAR, path.display());
        builder = builder.add_source(File::from(path).required(false));
    }

    builder.build()?.try_deserialize()
}

/// Initialize application state from configuration
pub async fn initialize_app_state(config: &AppConfig) -> Result<AppState> {
    // Connect to database
    info!("Connecting to database: {}", config.database_url);
    let db = Database::connect(&config.database_url).await?;

    // Initialize cache
    let cache = Cache::builder()
        .max_capacity(config.cache_max_capacity)
        .time_to_live(Duration::from_secs(config.cache_ttl_secs))
        .build();

    let templates = Templates::new()?;

    Ok(AppState::new(db, cache, templates, config.clone()))
}
