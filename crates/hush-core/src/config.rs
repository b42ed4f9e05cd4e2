//! Configuration resolution for hush.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (`<config_dir>/hush/settings.json`)
//! 3. Explicit config file (if given)
//! 4. Environment variables (highest priority)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Seven days, the lifetime of a cached message history.
pub const DEFAULT_HISTORY_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Minimum PBKDF2 iteration count, owned by the vault that enforces it.
pub use hush_crypto::MIN_PBKDF2_ITERATIONS;

/// Complete hush configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub vault: VaultConfig,
    #[serde(default)]
    pub attachments: AttachmentConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Local persistent store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// `None` resolves to [`database_path`].
    pub database_path: Option<PathBuf>,
    /// Cached message history older than this is evicted on read.
    pub history_ttl_secs: i64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            history_ttl_secs: DEFAULT_HISTORY_TTL_SECS,
        }
    }
}

impl StoreConfig {
    /// The configured path, or the platform default.
    pub fn resolved_database_path(&self) -> Option<PathBuf> {
        self.database_path.clone().or_else(database_path)
    }
}

/// Passphrase escrow configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    pub pbkdf2_iterations: u32,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            pbkdf2_iterations: MIN_PBKDF2_ITERATIONS,
        }
    }
}

/// Attachment policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttachmentConfig {
    /// Largest plaintext file body accepted for encryption.
    pub max_file_bytes: usize,
}

impl Default for AttachmentConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: 10 * 1024 * 1024, // 10 MB
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Emit JSON lines instead of the human-readable format.
    pub log_json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "hush=info".to_string(),
            log_json: false,
        }
    }
}

impl Config {
    /// Reject values that would weaken the security properties.
    pub fn validate(&self) -> Result<()> {
        if self.vault.pbkdf2_iterations < MIN_PBKDF2_ITERATIONS {
            return Err(Error::Config(format!(
                "vault.pbkdf2_iterations must be at least {MIN_PBKDF2_ITERATIONS}, got {}",
                self.vault.pbkdf2_iterations
            )));
        }
        if self.store.history_ttl_secs <= 0 {
            return Err(Error::Config(
                "store.history_ttl_secs must be positive".to_string(),
            ));
        }
        if self.attachments.max_file_bytes == 0 {
            return Err(Error::Config(
                "attachments.max_file_bytes must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load configuration with hierarchical resolution.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let mut config = Config::default();

    if let Some(global_path) = global_config_path()
        && global_path.exists()
    {
        config = load_config_file(&global_path)?;
    }

    if let Some(path) = explicit {
        config = load_config_file(path)?;
    }

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config.validate()?;

    Ok(config)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("hush").join("settings.json"))
}

/// Get the default local store path.
pub fn database_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|p| p.join("hush").join("store.db"))
}

fn load_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|source| Error::ReadConfig {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| Error::ParseConfig {
        path: path.to_path_buf(),
        source,
    })
}

fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(val) = var("HUSH_DATABASE_PATH") {
        config.store.database_path = Some(PathBuf::from(val));
    }
    if let Some(n) = var("HUSH_HISTORY_TTL_SECS").and_then(|v| v.parse().ok()) {
        config.store.history_ttl_secs = n;
    }
    if let Some(n) = var("HUSH_PBKDF2_ITERATIONS").and_then(|v| v.parse().ok()) {
        config.vault.pbkdf2_iterations = n;
    }
    if let Some(n) = var("HUSH_MAX_FILE_BYTES").and_then(|v| v.parse().ok()) {
        config.attachments.max_file_bytes = n;
    }
    if let Some(val) = var("HUSH_LOG_LEVEL") {
        config.logging.log_level = val;
    }
    if let Some(val) = var("HUSH_LOG_JSON") {
        config.logging.log_json = matches!(val.as_str(), "1" | "true" | "yes");
    }
}
