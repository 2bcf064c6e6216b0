//! Configuration loading and root folder resolution
//!
//! Bootstrap configuration comes from a small TOML file (`medley.toml`).
//! Sources, highest priority first:
//! 1. Command-line argument
//! 2. Environment variable (`MEDLEY_ROOT_FOLDER`)
//! 3. TOML config file
//! 4. OS-dependent compiled default

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable consulted for the root folder
pub const ROOT_FOLDER_ENV: &str = "MEDLEY_ROOT_FOLDER";

/// File name of the cache database inside the root folder
pub const DATABASE_FILE_NAME: &str = "medley.db";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the cache database
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub sync: SyncSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Timing knobs for library synchronization and the write path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Backoff after a failed fetch that carried no retry-after hint
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Pause between two successful pages of one provider
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,

    /// Number of grace ticks the aggregate job waits after a provider failure
    #[serde(default = "default_failure_grace_ticks")]
    pub failure_grace_ticks: u32,

    /// Length of one grace tick
    #[serde(default = "default_failure_grace_tick_ms")]
    pub failure_grace_tick_ms: u64,

    /// Upper bound for retrying a busy COMMIT
    #[serde(default = "default_commit_busy_max_wait_ms")]
    pub commit_busy_max_wait_ms: u64,

    /// SQLite busy timeout applied to every pooled connection
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            retry_delay_ms: default_retry_delay_ms(),
            page_delay_ms: default_page_delay_ms(),
            failure_grace_ticks: default_failure_grace_ticks(),
            failure_grace_tick_ms: default_failure_grace_tick_ms(),
            commit_busy_max_wait_ms: default_commit_busy_max_wait_ms(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl SyncSettings {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn failure_grace_tick(&self) -> Duration {
        Duration::from_millis(self.failure_grace_tick_ms)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn commit_busy_max_wait(&self) -> Duration {
        Duration::from_millis(self.commit_busy_max_wait_ms)
    }
}

fn default_retry_delay_ms() -> u64 {
    2000
}

fn default_page_delay_ms() -> u64 {
    200
}

fn default_failure_grace_ticks() -> u32 {
    6
}

fn default_failure_grace_tick_ms() -> u64 {
    500
}

fn default_commit_busy_max_wait_ms() -> u64 {
    5000
}

fn default_busy_timeout_ms() -> u64 {
    250
}

/// Load a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Write a TOML config file, creating parent directories as needed
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Load the config from an explicit path, the platform location, or defaults
///
/// A missing file yields defaults; an unparsable file is an error.
pub fn load_config(explicit_path: Option<&Path>) -> Result<TomlConfig> {
    if let Some(path) = explicit_path {
        return load_toml_config(path);
    }
    match default_config_path() {
        Some(path) if path.exists() => load_toml_config(&path),
        _ => Ok(TomlConfig::default()),
    }
}

/// Resolve the root folder following the priority order above
pub fn resolve_root_folder(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(root_folder) = &config.root_folder {
        return root_folder.clone();
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Database path inside a root folder
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join(DATABASE_FILE_NAME)
}

/// Platform config file location (`<config dir>/medley/medley.toml`)
fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("medley").join("medley.toml"))
}

/// OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("medley"))
        .unwrap_or_else(|| PathBuf::from("./medley_data"))
}
