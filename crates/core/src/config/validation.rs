//! Checks applied to a loaded [`AppConfig`].

use std::ops::RangeInclusive;

use thiserror::Error;

use crate::config::AppConfig;

/// Accepted HTTP timeouts: 100ms up to 5 minutes.
const TIMEOUT_RANGE_MS: RangeInclusive<u64> = 100..=300_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field, reason: reason.into() }
}

impl AppConfig {
    /// Reject settings the cache cannot run with.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.db_path.as_os_str().is_empty() {
            return Err(invalid("db_path", "must not be empty"));
        }
        if self.db_path.is_dir() {
            return Err(invalid("db_path", format!("{} is a directory", self.db_path.display())));
        }

        if self.memory_capacity == 0 {
            return Err(invalid("memory_capacity", "at least one tile must fit in memory"));
        }

        if !TIMEOUT_RANGE_MS.contains(&self.timeout_ms) {
            return Err(invalid(
                "timeout_ms",
                format!(
                    "{} is outside {}..={}",
                    self.timeout_ms,
                    TIMEOUT_RANGE_MS.start(),
                    TIMEOUT_RANGE_MS.end()
                ),
            ));
        }

        // Tile servers refuse anonymous clients.
        if self.user_agent.trim().is_empty() {
            return Err(invalid("user_agent", "must not be blank"));
        }

        if self.expire_secs == Some(0) {
            return Err(invalid("expire_secs", "0 would refetch every tile; leave unset to never expire"));
        }
        if let Some(secs) = self.expire_secs
            && self.expire_time().is_none()
        {
            return Err(invalid("expire_secs", format!("{secs} is too large; leave unset to never expire")));
        }

        Ok(())
    }
}
