use std::collections::HashMap;
use std::env;
use std::fmt;

use thiserror::Error;

const DEFAULT_MAX_BLOB_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    /// Bearer token to account id
    pub account_tokens: HashMap<String, String>,
    /// Upper bound on a decoded vault blob
    pub max_blob_bytes: usize,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut accounts: Vec<&str> = self.account_tokens.values().map(String::as_str).collect();
        accounts.sort_unstable();
        accounts.dedup();
        formatter
            .debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("account_tokens", &"[REDACTED]")
            .field("accounts", &accounts)
            .field("max_blob_bytes", &self.max_blob_bytes)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = value_or_default(&lookup, "VAULTSYNC_API_BIND_ADDR", "127.0.0.1:8080");

        let raw_tokens = required_trimmed(&lookup, "VAULTSYNC_API_TOKENS")?;
        let account_tokens = parse_account_tokens(&raw_tokens)?;

        let max_blob_bytes = match optional_trimmed(&lookup, "VAULTSYNC_API_MAX_BLOB_BYTES") {
            Some(raw) => raw.parse::<usize>().map_err(|_| {
                ConfigError::Invalid("VAULTSYNC_API_MAX_BLOB_BYTES must be an integer".to_string())
            })?,
            None => DEFAULT_MAX_BLOB_BYTES,
        };
        if !(1_024..=512 * 1024 * 1024).contains(&max_blob_bytes) {
            return Err(ConfigError::Invalid(
                "VAULTSYNC_API_MAX_BLOB_BYTES must be between 1024 and 536870912".to_string(),
            ));
        }

        Ok(Self {
            bind_addr,
            account_tokens,
            max_blob_bytes,
        })
    }

    pub fn account_for_token(&self, token: &str) -> Option<&str> {
        self.account_tokens.get(token).map(String::as_str)
    }
}

/// Parse `token:account` pairs separated by commas.
fn parse_account_tokens(raw: &str) -> Result<HashMap<String, String>, ConfigError> {
    let mut tokens = HashMap::new();
    for entry in raw.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
        let (token, account) = entry
            .split_once(':')
            .map(|(token, account)| (token.trim(), account.trim()))
            .filter(|(token, account)| !token.is_empty() && !account.is_empty())
            .ok_or_else(|| {
                ConfigError::Invalid(
                    "VAULTSYNC_API_TOKENS entries must look like `token:account`".to_string(),
                )
            })?;
        if tokens
            .insert(token.to_string(), account.to_string())
            .is_some()
        {
            return Err(ConfigError::Invalid(
                "VAULTSYNC_API_TOKENS lists the same token twice".to_string(),
            ));
        }
    }
    if tokens.is_empty() {
        return Err(ConfigError::MissingVar("VAULTSYNC_API_TOKENS"));
    }
    Ok(tokens)
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

fn required_trimmed(
    lookup: impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<String, ConfigError> {
    optional_trimmed(lookup, name).ok_or(ConfigError::MissingVar(name))
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
