//! Session token persistence in the OS keychain.
//!
//! `VAULTSYNC_TOKEN` wins over the stored token. Each state directory gets
//! its own keychain entry, so two vaults on one machine keep separate sessions.

#[cfg(test)]
use std::collections::HashMap;
use std::path::Path;
#[cfg(test)]
use std::sync::{Mutex, OnceLock};

#[cfg(not(test))]
use keyring::Entry;
use vaultsync_core::util::normalize_text_option;

use crate::error::CliError;

#[cfg(not(test))]
const KEYRING_SERVICE_NAME: &str = "vaultsync-cli";

#[derive(Debug, Clone)]
struct SessionStore {
    username: String,
}

impl SessionStore {
    fn for_state_dir(state_dir: &Path) -> Self {
        Self {
            username: format!("session_token:{}", state_dir.display()),
        }
    }

    #[cfg(test)]
    fn test_store() -> &'static Mutex<HashMap<String, String>> {
        static STORE: OnceLock<Mutex<HashMap<String, String>>> = OnceLock::new();
        STORE.get_or_init(|| Mutex::new(HashMap::new()))
    }

    #[cfg(not(test))]
    fn entry(&self) -> Result<Entry, CliError> {
        Entry::new(KEYRING_SERVICE_NAME, &self.username)
            .map_err(|error| CliError::SecureStorage(error.to_string()))
    }

    #[cfg(not(test))]
    fn load(&self) -> Result<Option<String>, CliError> {
        match self.entry()?.get_password() {
            Ok(raw) => Ok(normalize_text_option(Some(raw))),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(CliError::SecureStorage(error.to_string())),
        }
    }

    #[cfg(test)]
    fn load(&self) -> Result<Option<String>, CliError> {
        let guard = Self::test_store()
            .lock()
            .map_err(|error| CliError::SecureStorage(error.to_string()))?;
        Ok(guard.get(&self.username).cloned())
    }

    #[cfg(not(test))]
    fn save(&self, token: &str) -> Result<(), CliError> {
        self.entry()?
            .set_password(token)
            .map_err(|error| CliError::SecureStorage(error.to_string()))
    }

    #[cfg(test)]
    fn save(&self, token: &str) -> Result<(), CliError> {
        let mut guard = Self::test_store()
            .lock()
            .map_err(|error| CliError::SecureStorage(error.to_string()))?;
        guard.insert(self.username.clone(), token.to_string());
        Ok(())
    }

    #[cfg(not(test))]
    fn clear(&self) -> Result<bool, CliError> {
        match self.entry()?.delete_credential() {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(error) => Err(CliError::SecureStorage(error.to_string())),
        }
    }

    #[cfg(test)]
    fn clear(&self) -> Result<bool, CliError> {
        let mut guard = Self::test_store()
            .lock()
            .map_err(|error| CliError::SecureStorage(error.to_string()))?;
        Ok(guard.remove(&self.username).is_some())
    }
}

/// Resolve the session token from the environment value or the keychain.
pub fn load_token(env_token: Option<String>, state_dir: &Path) -> Result<Option<String>, CliError> {
    if let Some(token) = normalize_text_option(env_token) {
        return Ok(Some(token));
    }
    SessionStore::for_state_dir(state_dir).load()
}

pub fn save_token(state_dir: &Path, token: &str) -> Result<(), CliError> {
    let token = normalize_text_option(Some(token.to_string())).ok_or(CliError::MissingToken)?;
    SessionStore::for_state_dir(state_dir).save(&token)
}

/// Remove the stored token. Returns whether one existed.
pub fn clear_token(state_dir: &Path) -> Result<bool, CliError> {
    SessionStore::for_state_dir(state_dir).clear()
}
