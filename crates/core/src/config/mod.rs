//! Application configuration with layered loading.
//!
//! Configuration is loaded with figment from, in order of precedence:
//!
//! 1. Environment variables (TILECACHE_*)
//! 2. TOML config file (if TILECACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use chrono::TimeDelta;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite tile cache.
    ///
    /// Set via TILECACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Create the cache file when it does not exist yet.
    ///
    /// Off by default so a mistyped path does not silently start an empty
    /// cache and hammer the tile servers.
    #[serde(default)]
    pub create: bool,

    /// Seconds after which a stored tile is fetched again.
    ///
    /// Unset means stored tiles never expire.
    #[serde(default)]
    pub expire_secs: Option<u64>,

    /// Number of decoded tiles kept in memory per tile source.
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: usize,

    /// User-Agent string for tile requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_db_path() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join("tilecache.sqlite"))
        .unwrap_or_else(|| PathBuf::from("./tilecache.sqlite"))
}

fn default_memory_capacity() -> usize {
    32
}

fn default_user_agent() -> String {
    concat!("tilecache/", env!("CARGO_PKG_VERSION")).into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            create: false,
            expire_secs: None,
            memory_capacity: default_memory_capacity(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Expiry of stored tiles, `None` when they never expire.
    ///
    /// A value too large for `TimeDelta` also yields `None`; [`validate`](Self::validate)
    /// rejects it so it never reaches a cache.
    pub fn expire_time(&self) -> Option<TimeDelta> {
        self.expire_secs
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(TimeDelta::try_seconds)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file or environment cannot be parsed,
    /// or if validation fails after loading.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("TILECACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(Env::prefixed("TILECACHE_").ignore(&["config_file"]));

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.db_path.ends_with("tilecache.sqlite"));
        assert!(!config.create);
        assert!(config.expire_secs.is_none());
        assert_eq!(config.memory_capacity, 32);
        assert!(config.user_agent.starts_with("tilecache/"));
        assert_eq!(config.timeout_ms, 20_000);
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
    }

    #[test]
    fn test_expire_time() {
        let config = AppConfig::default();
        assert!(config.expire_time().is_none());

        let config = AppConfig { expire_secs: Some(86_400), ..Default::default() };
        assert_eq!(config.expire_time(), Some(TimeDelta::days(1)));
    }

    #[test]
    fn test_load_from_env_and_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("tilecache.toml", "memory_capacity = 8\ntimeout_ms = 5000")?;
            jail.set_env("TILECACHE_CONFIG_FILE", "tilecache.toml");
            jail.set_env("TILECACHE_DB_PATH", "/tmp/tiles.sqlite");
            jail.set_env("TILECACHE_TIMEOUT_MS", "7000");

            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.db_path, PathBuf::from("/tmp/tiles.sqlite"));
            assert_eq!(config.memory_capacity, 8);
            assert_eq!(config.timeout_ms, 7000);
            Ok(())
        });
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("TILECACHE_MEMORY_CAPACITY", "0");
            let result = AppConfig::load();
            assert!(matches!(result, Err(ConfigError::Invalid { .. })));
            Ok(())
        });
    }
}
