//! Sync client configuration.
//!
//! Values come from the environment (or any lookup closure, for tests).
//! Secrets such as the session token and vault key are not part of this
//! struct; callers supply them directly to the remote and cipher.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::util::{is_http_url, normalize_text_option};

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const MAX_ATTEMPTS_LIMIT: u32 = 10;
const MIN_SYNC_INTERVAL_SECS: u64 = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Settings that shape sync attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Base URL of the vault server (e.g., `https://vault.example.com`)
    pub api_base_url: Option<String>,
    /// Attempts per sync before a moving server revision is reported as an error
    pub max_attempts: u32,
    /// Automatic sync interval; `None` means explicit syncs only
    pub sync_interval: Option<Duration>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            sync_interval: None,
        }
    }
}

impl SyncConfig {
    /// Set the server base URL
    #[must_use]
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into().trim_end_matches('/').to_string());
        self
    }

    /// Set the attempt budget for one sync
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.clamp(1, MAX_ATTEMPTS_LIMIT);
        self
    }

    /// Set the automatic sync interval
    #[must_use]
    pub const fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = Some(interval);
        self
    }

    /// Check if a server is configured
    pub const fn is_configured(&self) -> bool {
        self.api_base_url.is_some()
    }

    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    /// Read configuration through a variable lookup.
    ///
    /// - `VAULTSYNC_API_URL`: server base URL (http/https)
    /// - `VAULTSYNC_MAX_SYNC_ATTEMPTS`: integer in [1, 10], default 3
    /// - `VAULTSYNC_SYNC_INTERVAL_SECS`: integer >= 5, unset for manual sync
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(url) = normalize_text_option(lookup("VAULTSYNC_API_URL")) {
            if !is_http_url(&url) {
                return Err(ConfigError::Invalid(
                    "VAULTSYNC_API_URL must start with http:// or https://".to_string(),
                ));
            }
            config = config.with_api_base_url(url);
        }

        if let Some(raw) = normalize_text_option(lookup("VAULTSYNC_MAX_SYNC_ATTEMPTS")) {
            let attempts = raw.parse::<u32>().map_err(|_| {
                ConfigError::Invalid(
                    "VAULTSYNC_MAX_SYNC_ATTEMPTS must be an integer in [1, 10]".to_string(),
                )
            })?;
            if !(1..=MAX_ATTEMPTS_LIMIT).contains(&attempts) {
                return Err(ConfigError::Invalid(
                    "VAULTSYNC_MAX_SYNC_ATTEMPTS must be in [1, 10]".to_string(),
                ));
            }
            config.max_attempts = attempts;
        }

        if let Some(raw) = normalize_text_option(lookup("VAULTSYNC_SYNC_INTERVAL_SECS")) {
            let secs = raw.parse::<u64>().map_err(|_| {
                ConfigError::Invalid(
                    "VAULTSYNC_SYNC_INTERVAL_SECS must be an integer number of seconds".to_string(),
                )
            })?;
            if secs < MIN_SYNC_INTERVAL_SECS {
                return Err(ConfigError::Invalid(format!(
                    "VAULTSYNC_SYNC_INTERVAL_SECS must be at least {MIN_SYNC_INTERVAL_SECS}"
                )));
            }
            config.sync_interval = Some(Duration::from_secs(secs));
        }

        Ok(config)
    }
}
