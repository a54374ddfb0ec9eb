use crate::storage::{ClientStorage, StorageError, StorageEvent};
use secrecy::SecretString;
use std::sync::Arc;
use tokio::sync::broadcast;

pub const ACCESS_TOKEN_KEY: &str = "token";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
pub const VERIFY_TOKEN_KEY: &str = "HUMAN_VERIFY_TOKEN";
pub const SELECTED_BRANCH_KEY: &str = "selectedBranch";
/// Cached profile written by older client builds; only ever cleared.
pub const LEGACY_USER_KEY: &str = "user";

/// Keys removed on logout.
pub const SESSION_KEYS: [&str; 5] = [
    ACCESS_TOKEN_KEY,
    REFRESH_TOKEN_KEY,
    VERIFY_TOKEN_KEY,
    SELECTED_BRANCH_KEY,
    LEGACY_USER_KEY,
];

/// Fixed-key persistence for credentials. No validation happens here.
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn ClientStorage>,
}

impl TokenStore {
    #[must_use]
    pub fn new(storage: Arc<dyn ClientStorage>) -> Self {
        Self { storage }
    }

    #[must_use]
    pub fn storage(&self) -> &Arc<dyn ClientStorage> {
        &self.storage
    }

    #[must_use]
    pub fn origin(&self) -> u64 {
        self.storage.origin()
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.storage.subscribe()
    }

    #[must_use]
    pub fn access_token(&self) -> Option<SecretString> {
        self.secret(ACCESS_TOKEN_KEY)
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the backing store cannot be written.
    pub fn set_access_token(&self, token: &str) -> Result<(), StorageError> {
        self.storage.set(ACCESS_TOKEN_KEY, token)
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the backing store cannot be written.
    pub fn remove_access_token(&self) -> Result<(), StorageError> {
        self.storage.remove(ACCESS_TOKEN_KEY)
    }

    #[must_use]
    pub fn refresh_token(&self) -> Option<SecretString> {
        self.secret(REFRESH_TOKEN_KEY)
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the backing store cannot be written.
    pub fn set_refresh_token(&self, token: &str) -> Result<(), StorageError> {
        self.storage.set(REFRESH_TOKEN_KEY, token)
    }

    /// Persists a credential and its refresh token in one write.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backing store cannot be written.
    pub fn set_pair(&self, access: &str, refresh: &str) -> Result<(), StorageError> {
        self.storage
            .set_many(&[(ACCESS_TOKEN_KEY, access), (REFRESH_TOKEN_KEY, refresh)])
    }

    #[must_use]
    pub fn verification_token(&self) -> Option<SecretString> {
        self.secret(VERIFY_TOKEN_KEY)
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the backing store cannot be written.
    pub fn set_verification_token(&self, token: &str) -> Result<(), StorageError> {
        self.storage.set(VERIFY_TOKEN_KEY, token)
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the backing store cannot be written.
    pub fn remove_verification_token(&self) -> Result<(), StorageError> {
        self.storage.remove(VERIFY_TOKEN_KEY)
    }

    #[must_use]
    pub fn selected_branch(&self) -> Option<String> {
        self.storage.get(SELECTED_BRANCH_KEY)
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the backing store cannot be written.
    pub fn set_selected_branch(&self, branch_code: &str) -> Result<(), StorageError> {
        self.storage.set(SELECTED_BRANCH_KEY, branch_code)
    }

    /// Removes every session-scoped entry.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backing store cannot be written.
    pub fn clear_session(&self) -> Result<(), StorageError> {
        self.storage.remove_many(&SESSION_KEYS)
    }

    fn secret(&self, key: &str) -> Option<SecretString> {
        self.storage
            .get(key)
            .filter(|value| !value.is_empty())
            .map(SecretString::from)
    }
}

#[cfg(test)]
mod tests {
    use super::{TokenStore, ACCESS_TOKEN_KEY, LEGACY_USER_KEY, SESSION_KEYS};
    use crate::storage::{ClientStorage, MemoryStore};
    use anyhow::Result;
    use secrecy::ExposeSecret;
    use std::sync::Arc;

    #[test]
    fn pair_roundtrip_and_clear() -> Result<()> {
        let memory = MemoryStore::new();
        let store = TokenStore::new(Arc::new(memory.clone()));

        store.set_pair("access", "refresh")?;
        store.set_verification_token("verify")?;
        store.set_selected_branch("HN01")?;
        memory.set(LEGACY_USER_KEY, "{}")?;

        assert_eq!(
            store.access_token().map(|t| t.expose_secret().to_string()),
            Some("access".to_string())
        );
        assert_eq!(
            store.refresh_token().map(|t| t.expose_secret().to_string()),
            Some("refresh".to_string())
        );
        assert_eq!(store.selected_branch().as_deref(), Some("HN01"));

        store.clear_session()?;
        for key in SESSION_KEYS {
            assert_eq!(memory.get(key), None, "{key} survived clear_session");
        }
        Ok(())
    }

    #[test]
    fn empty_values_read_as_absent() -> Result<()> {
        let memory = MemoryStore::new();
        let store = TokenStore::new(Arc::new(memory.clone()));
        memory.set(ACCESS_TOKEN_KEY, "")?;
        assert!(store.access_token().is_none());
        Ok(())
    }
}
