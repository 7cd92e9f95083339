//! In-memory vault storage with per-account revision counters.
//!
//! The server never opens a blob. A push is a compare-and-swap on the
//! account's revision: it lands only when the client saw the latest one.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredVault {
    pub revision: i64,
    pub schema_version: String,
    pub blob: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct VaultStore {
    vaults: Arc<RwLock<HashMap<String, StoredVault>>>,
}

impl VaultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current revision and schema marker, `(0, None)` for an account with no vault.
    pub async fn revision(&self, account_id: &str) -> (i64, Option<String>) {
        let vaults = self.vaults.read().await;
        vaults.get(account_id).map_or((0, None), |vault| {
            (vault.revision, Some(vault.schema_version.clone()))
        })
    }

    pub async fn get(&self, account_id: &str) -> Result<StoredVault, AppError> {
        let vaults = self.vaults.read().await;
        vaults.get(account_id).cloned().ok_or(AppError::NotFound)
    }

    /// Store `blob` if `expected_revision` matches, returning the new revision.
    pub async fn put(
        &self,
        account_id: &str,
        expected_revision: i64,
        schema_version: String,
        blob: Vec<u8>,
    ) -> Result<i64, AppError> {
        let mut vaults = self.vaults.write().await;
        let current_revision = vaults.get(account_id).map_or(0, |vault| vault.revision);
        if expected_revision != current_revision {
            return Err(AppError::Conflict { current_revision });
        }

        let revision = current_revision + 1;
        vaults.insert(
            account_id.to_string(),
            StoredVault {
                revision,
                schema_version,
                blob,
            },
        );
        Ok(revision)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[tokio::test]
    async fn empty_account_reports_revision_zero() {
        let store = VaultStore::new();
        assert_eq!(store.revision("alice").await, (0, None));
        assert!(matches!(store.get("alice").await, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn put_advances_revision_per_account() {
        let store = VaultStore::new();
        assert_eq!(
            store.put("alice", 0, "1.2.0".to_string(), vec![1]).await.unwrap(),
            1
        );
        assert_eq!(
            store.put("alice", 1, "1.2.0".to_string(), vec![2]).await.unwrap(),
            2
        );
        assert_eq!(
            store.put("bob", 0, "1.0.0".to_string(), vec![9]).await.unwrap(),
            1
        );

        let alice = store.get("alice").await.unwrap();
        assert_eq!(alice.blob, vec![2]);
        assert_eq!(store.revision("bob").await, (1, Some("1.0.0".to_string())));
    }

    #[tokio::test]
    async fn stale_push_is_rejected_without_writing() {
        let store = VaultStore::new();
        store.put("alice", 0, "1.2.0".to_string(), vec![1]).await.unwrap();

        let error = store
            .put("alice", 0, "1.2.0".to_string(), vec![7])
            .await
            .unwrap_err();
        assert!(matches!(error, AppError::Conflict { current_revision: 1 }));
        assert_eq!(store.get("alice").await.unwrap().blob, vec![1]);
    }
}
