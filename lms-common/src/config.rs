//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the root folder
pub const ROOT_ENV_VAR: &str = "LMS_ROOT";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "lms.db";

/// Service configuration file name inside the root folder
pub const SERVICE_CONFIG_FILE: &str = "config.toml";

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file in the user/system config directory
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&str>, env_var_name: &str) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Ok(config_path) = locate_config_file() {
        if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(root_folder) = config.get("root_folder").and_then(|v| v.as_str()) {
                    return PathBuf::from(root_folder);
                }
            }
        }
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Locate the user or system level config file for the platform
fn locate_config_file() -> Result<PathBuf> {
    if cfg!(target_os = "linux") {
        // ~/.config/lms/config.toml first, then /etc/lms/config.toml
        let user_config = dirs::config_dir().map(|d| d.join("lms").join("config.toml"));
        if let Some(path) = user_config {
            if path.exists() {
                return Ok(path);
            }
        }
        let system_config = PathBuf::from("/etc/lms/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
        return Err(Error::Config("No config file found".to_string()));
    }

    let path = dirs::config_dir()
        .map(|d| d.join("lms").join("config.toml"))
        .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;

    if path.exists() {
        Ok(path)
    } else {
        Err(Error::Config(format!("Config file not found: {:?}", path)))
    }
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("lms"))
        .unwrap_or_else(|| PathBuf::from("./lms_data"))
}

/// Database path for a resolved root folder
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join(DATABASE_FILE)
}

/// Service settings read from `config.toml` in the root folder
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    /// Catalog response cache lifetime
    pub catalog_cache_ttl_secs: u64,
    pub catalog_cache_capacity: u64,
    /// Upper bound for page and cursor limits on list endpoints
    pub max_page_size: i64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5740,
            catalog_cache_ttl_secs: 300,
            catalog_cache_capacity: 1_000,
            max_page_size: 100,
        }
    }
}

impl ServiceConfig {
    /// Load `config.toml` from the root folder
    ///
    /// A missing file is not an error: defaults are used and a warning logged.
    pub fn load(root_folder: &Path) -> Result<Self> {
        let path = root_folder.join(SERVICE_CONFIG_FILE);
        if !path.exists() {
            warn!("No service config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded service config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid config.toml: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.max_page_size < 1 {
            return Err(Error::Config("max_page_size must be at least 1".to_string()));
        }
        if self.catalog_cache_capacity == 0 {
            return Err(Error::Config(
                "catalog_cache_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
