use crate::error::{RentalError, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use fleetgo_common::logging::LogFormat;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_CONFIG_FILE: &str = "fleetgo.toml";
const ENV_PREFIX: &str = "FLEETGO_";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RentalConfig {
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    pub search: SearchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub environment: String,
    pub log_format: LogFormat,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "fleetgo-rental".to_string(),
            environment: "development".to_string(),
            log_format: LogFormat::Compact,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub busy_timeout_seconds: u64,
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:fleetgo.db?mode=rwc".to_string(),
            max_connections: 8,
            busy_timeout_seconds: 5,
            run_migrations: true,
        }
    }
}

impl DatabaseConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_secs(self.busy_timeout_seconds)
    }
}

/// Pagination bounds for registry listings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_page_size: 50,
            max_page_size: 500,
        }
    }
}

impl RentalConfig {
    /// Layer defaults, an optional TOML file and `FLEETGO_` environment
    /// variables (nested keys separated by `__`, e.g. `FLEETGO_DATABASE__URL`).
    pub fn load(path_override: Option<PathBuf>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(RentalConfig::default()));

        match path_override {
            Some(path) => {
                if !path.exists() {
                    return Err(RentalError::Configuration(format!(
                        "config file {} does not exist",
                        path.display()
                    )));
                }
                figment = figment.merge(Toml::file(path));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    figment = figment.merge(Toml::file(default_path));
                }
            }
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: RentalConfig = figment
            .extract()
            .map_err(|e| RentalError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.database.url.trim().is_empty() {
            return Err(RentalError::Configuration(
                "database.url must not be empty".to_string(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(RentalError::Configuration(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        if self.search.max_page_size == 0 {
            return Err(RentalError::Configuration(
                "search.max_page_size must be at least 1".to_string(),
            ));
        }
        if self.search.default_page_size > self.search.max_page_size {
            return Err(RentalError::Configuration(format!(
                "search.default_page_size ({}) exceeds search.max_page_size ({})",
                self.search.default_page_size, self.search.max_page_size
            )));
        }
        Ok(())
    }
}
