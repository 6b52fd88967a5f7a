//! Account registry - which accounts hold an authenticated login
//!
//! Backs the `needs-login` and `reload` endpoints. Optionally persisted as a
//! single JSON file inside the auth-state directory.

use crate::SessionResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const REGISTRY_FILE: &str = "accounts.json";

/// A completed login for one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub account: String,
    pub username: String,
    pub authenticated_at: DateTime<Utc>,
}

pub struct AccountRegistry {
    accounts: RwLock<HashMap<String, AccountRecord>>,
    storage_path: Option<PathBuf>,
}

impl AccountRegistry {
    /// Registry that forgets everything on restart
    pub fn in_memory() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            storage_path: None,
        }
    }

    /// Registry persisted under `dir`, loading any existing records
    pub fn open<P: AsRef<Path>>(dir: P) -> SessionResult<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let storage_path = dir.join(REGISTRY_FILE);
        let accounts = if storage_path.exists() {
            let json_data = std::fs::read_to_string(&storage_path)?;
            serde_json::from_str::<HashMap<String, AccountRecord>>(&json_data)?
        } else {
            HashMap::new()
        };

        info!(
            "Account registry loaded {} accounts from {}",
            accounts.len(),
            storage_path.display()
        );

        Ok(Self {
            accounts: RwLock::new(accounts),
            storage_path: Some(storage_path),
        })
    }

    /// Remember a successful login, replacing any earlier one
    pub async fn record(&self, account: &str, username: &str) -> SessionResult<AccountRecord> {
        let record = AccountRecord {
            account: account.to_string(),
            username: username.to_string(),
            authenticated_at: Utc::now(),
        };

        let mut accounts = self.accounts.write().await;
        accounts.insert(account.to_string(), record.clone());

        if let Some(path) = &self.storage_path {
            let json_data = serde_json::to_string_pretty(&*accounts)?;
            if let Err(e) = std::fs::write(path, json_data) {
                // The in-memory record stays valid for this process
                warn!("Failed to persist account registry to {}: {}", path.display(), e);
                return Err(e.into());
            }
            debug!("Persisted account registry to {}", path.display());
        }

        Ok(record)
    }

    pub async fn get(&self, account: &str) -> Option<AccountRecord> {
        self.accounts.read().await.get(account).cloned()
    }

    pub async fn needs_login(&self, account: &str) -> bool {
        !self.accounts.read().await.contains_key(account)
    }

    /// Re-read the backing file so records written by another process show up
    pub async fn reload(&self) -> SessionResult<usize> {
        let Some(path) = &self.storage_path else {
            return Ok(self.accounts.read().await.len());
        };

        let loaded = if path.exists() {
            let json_data = std::fs::read_to_string(path)?;
            serde_json::from_str::<HashMap<String, AccountRecord>>(&json_data)?
        } else {
            HashMap::new()
        };

        let count = loaded.len();
        *self.accounts.write().await = loaded;
        debug!("Reloaded {} accounts from {}", count, path.display());
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_registry() {
        let registry = AccountRegistry::in_memory();
        assert!(registry.needs_login("default").await);

        registry.record("default", "octocat").await.unwrap();
        assert!(!registry.needs_login("default").await);
        assert!(registry.needs_login("work").await);
        assert_eq!(registry.get("default").await.unwrap().username, "octocat");
        assert_eq!(registry.reload().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_registry_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();

        let registry = AccountRegistry::open(dir.path()).unwrap();
        registry.record("work", "mona").await.unwrap();

        let reopened = AccountRegistry::open(dir.path()).unwrap();
        let record = reopened.get("work").await.unwrap();
        assert_eq!(record.username, "mona");
        assert!(reopened.needs_login("default").await);
    }

    #[tokio::test]
    async fn test_reload_picks_up_external_writes() {
        let dir = tempfile::tempdir().unwrap();
        let reader = AccountRegistry::open(dir.path()).unwrap();
        let writer = AccountRegistry::open(dir.path()).unwrap();

        writer.record("default", "octocat").await.unwrap();
        assert!(reader.needs_login("default").await);

        assert_eq!(reader.reload().await.unwrap(), 1);
        assert!(!reader.needs_login("default").await);
    }
}
