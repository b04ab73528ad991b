//! Runtime configuration.
//!
//! A small JSON config file controls the database location, the seed
//! admin account, and the bound on the GeoJSON source fetch. Parsed with
//! serde and validated with explicit checks; a missing file is not an
//! error at this layer (callers fall back to `Config::default()`).

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;

const DEFAULT_ADMIN_USERNAME: &str = "admin_user";
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Database file location; `None` selects [`crate::db::default_database_path`].
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Username granted the admin flag when seeding a fresh store.
    #[serde(default = "default_admin_username")]
    pub admin_username: String,

    /// Bound on the GeoJSON source fetch, in seconds. Never retried.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

fn default_admin_username() -> String {
    DEFAULT_ADMIN_USERNAME.to_string()
}

fn default_fetch_timeout_secs() -> u64 {
    DEFAULT_FETCH_TIMEOUT_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            admin_username: default_admin_username(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.admin_username.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "admin_username must not be empty".to_string(),
        });
    }

    if config.fetch_timeout_secs == 0 {
        return Err(ConfigError::Validation {
            message: "fetch_timeout_secs must be greater than zero".to_string(),
        });
    }

    Ok(())
}
