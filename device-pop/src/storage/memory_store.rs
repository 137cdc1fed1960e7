//! In-process key storage

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::storage::{
    KeyEntry, KeyGenSpec, SecureKeyStore, SoftwarePrivateKey, StoreBacking, StoreCapabilities,
    StoreError,
};

/// Key store living for the lifetime of the process
///
/// Keys are lost on exit. Useful for tests and hosts without persistent storage.
#[derive(Default)]
pub struct MemoryKeyStore {
    entries: RwLock<HashMap<String, KeyEntry>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place an existing entry under `alias`
    pub fn insert(&self, alias: &str, entry: KeyEntry) -> Result<(), StoreError> {
        self.write()?.insert(alias.to_string(), entry);
        Ok(())
    }

    fn read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, KeyEntry>>, StoreError> {
        self.entries
            .read()
            .map_err(|_| StoreError::Backend("key map lock poisoned".to_string()))
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, KeyEntry>>, StoreError> {
        self.entries
            .write()
            .map_err(|_| StoreError::Backend("key map lock poisoned".to_string()))
    }
}

impl SecureKeyStore for MemoryKeyStore {
    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities {
            backing: StoreBacking::Software,
            isolation_available: false,
        }
    }

    fn contains(&self, alias: &str) -> Result<bool, StoreError> {
        Ok(self.read()?.contains_key(alias))
    }

    fn generate(&self, alias: &str, spec: &KeyGenSpec) -> Result<KeyEntry, StoreError> {
        if spec.isolated {
            return Err(StoreError::IsolationUnavailable);
        }

        let entry = SoftwarePrivateKey::generate(spec.key_size_bits)?.into_entry(
            alias,
            Utc::now(),
            StoreBacking::Software,
        );
        self.insert(alias, entry.clone())?;

        Ok(entry)
    }

    fn entry(&self, alias: &str) -> Result<KeyEntry, StoreError> {
        self.read()?
            .get(alias)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(alias.to_string()))
    }

    fn delete(&self, alias: &str) -> Result<(), StoreError> {
        self.write()?.remove(alias);
        Ok(())
    }

    fn creation_date(&self, alias: &str) -> Result<DateTime<Utc>, StoreError> {
        self.entry(alias).map(|entry| entry.created_at())
    }
}
