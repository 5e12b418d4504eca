//! Configuration loading and root folder resolution
//!
//! Bootstrap settings come from a TOML file that is allowed to be missing.
//! The root folder (which holds `ensayo.db`) is resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "ensayo.db";

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "ENSAYO_ROOT_FOLDER";

/// Bootstrap configuration loaded from TOML
///
/// Every field is optional so that an empty or missing file still yields a
/// usable configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TomlConfig {
    /// Folder holding the database (optional)
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// HTTP listen port (optional, CLI default applies otherwise)
    #[serde(default)]
    pub port: Option<u16>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Database tuning
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Asset storage for presigned uploads (optional)
    #[serde(default)]
    pub storage: Option<StorageConfig>,
}

/// Database tuning
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Total time a write transaction keeps retrying after losing a lock race
    #[serde(default = "default_max_lock_wait_ms")]
    pub max_lock_wait_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            max_lock_wait_ms: default_max_lock_wait_ms(),
        }
    }
}

fn default_max_lock_wait_ms() -> u64 {
    crate::db::DEFAULT_MAX_LOCK_WAIT_MS
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
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

/// S3-compatible bucket receiving images and 3D model uploads
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Endpoint base URL, e.g. `https://s3.eu-west-1.amazonaws.com`
    pub endpoint: String,
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Falls back to `ENSAYO_S3_ACCESS_KEY_ID` when absent
    #[serde(default)]
    pub access_key_id: Option<String>,
    /// Falls back to `ENSAYO_S3_SECRET_ACCESS_KEY` when absent
    #[serde(default)]
    pub secret_access_key: Option<String>,
    /// Lifetime of generated upload URLs
    #[serde(default = "default_presign_expiry")]
    pub presign_expiry_secs: u64,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_presign_expiry() -> u64 {
    60
}

impl StorageConfig {
    /// Resolve credentials from TOML first, then environment
    pub fn credentials(&self) -> Result<(String, String)> {
        let access = self
            .access_key_id
            .clone()
            .or_else(|| std::env::var("ENSAYO_S3_ACCESS_KEY_ID").ok())
            .filter(|k| !k.trim().is_empty());
        let secret = self
            .secret_access_key
            .clone()
            .or_else(|| std::env::var("ENSAYO_S3_SECRET_ACCESS_KEY").ok())
            .filter(|k| !k.trim().is_empty());

        match (access, secret) {
            (Some(a), Some(s)) => Ok((a, s)),
            _ => Err(Error::Config(
                "Storage credentials not configured (access_key_id / secret_access_key)"
                    .to_string(),
            )),
        }
    }
}

/// Load the TOML configuration
///
/// A missing file is not an error: a warning is logged and defaults are
/// returned. A file that exists but does not parse is a configuration error.
pub fn load_toml_config(path: Option<&Path>) -> Result<TomlConfig> {
    let path = match path.map(Path::to_path_buf).or_else(default_config_path) {
        Some(p) => p,
        None => {
            warn!("No config directory available, using defaults");
            return Ok(TomlConfig::default());
        }
    };

    if !path.exists() {
        warn!("Config file not found at {}, using defaults", path.display());
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(&path)?;
    let config = toml::from_str::<TomlConfig>(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Default configuration file path for the platform
///
/// `~/.config/ensayo/config.toml` on Linux, the platform config dir elsewhere.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("ensayo").join("config.toml"))
}

/// Resolve the root folder following the priority order above
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    toml: &TomlConfig,
) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = &toml.root_folder {
        return path.clone();
    }

    // Priority 4: OS-dependent compiled default
    get_default_root_folder()
}

/// Get OS-dependent default root folder path
pub fn get_default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/ensayo (or /var/lib/ensayo for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("ensayo"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/ensayo"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("ensayo"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/ensayo"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("ensayo"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\ensayo"))
    } else {
        PathBuf::from("./ensayo_data")
    }
}

/// Create the root folder if missing and return the database path inside it
pub fn prepare_root_folder(root_folder: &Path) -> Result<PathBuf> {
    if !root_folder.exists() {
        std::fs::create_dir_all(root_folder)?;
        info!("Created root folder: {}", root_folder.display());
    }
    Ok(root_folder.join(DATABASE_FILE_NAME))
}
