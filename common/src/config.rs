use crate::yaml_include::{emit_yaml, load_yaml_with_includes};
use serde::Deserialize;
use std::{error::Error, path::Path};

pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CommonConfig {
    pub project_name: String,
    #[serde(default)]
    pub database_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
        }
    }
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout_secs() -> u64 {
    5
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct BackendConfig {
    pub server_address: String,
    pub log_level: String,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    pub common: CommonConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub backend: BackendConfig,
}

impl Config {
    /// Loads the config file (resolving `!include` lines), then applies
    /// `DATABASE_URL` from the environment if it is set.
    pub fn load(config_path: &Path) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let doc = load_yaml_with_includes(config_path)?;
        let mut config = Self::from_yaml_str(&emit_yaml(&doc)?)?;

        if let Ok(url) = std::env::var(DATABASE_URL_ENV) {
            config.common.database_url = url;
        }
        if config.common.database_url.is_empty() {
            return Err(format!(
                "No database url configured: set common.database_url or {}",
                DATABASE_URL_ENV
            )
            .into());
        }

        Ok(config)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, Box<dyn Error + Send + Sync>> {
        Ok(serde_yml::from_str(contents)?)
    }
}
