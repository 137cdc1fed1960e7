//! OS keychain storage backend

use chrono::{DateTime, Utc};
use keyring::Entry;

use crate::storage::{
    KeyEntry, KeyGenSpec, SecureKeyStore, SoftwarePrivateKey, StoreBacking, StoreCapabilities,
    StoreError, StoredKeyRecord,
};

const SERVICE_NAME: &str = "device-pop";

/// Key storage in the OS keychain (Keychain on macOS, Secret Service on Linux,
/// Credential Manager on Windows)
///
/// The vault encrypts the record at rest; signing still happens in process.
pub struct KeyringKeyStore {
    service: String,
}

impl KeyringKeyStore {
    pub fn new() -> Self {
        Self {
            service: SERVICE_NAME.to_string(),
        }
    }

    fn get_entry(&self, alias: &str) -> Result<Entry, StoreError> {
        Entry::new(&self.service, alias).map_err(|e| StoreError::NotInitialized(e.to_string()))
    }

    fn read_record(&self, alias: &str) -> Result<StoredKeyRecord, StoreError> {
        let json = self.get_entry(alias)?.get_password().map_err(|e| match e {
            keyring::Error::NoEntry => StoreError::NotFound(alias.to_string()),
            keyring::Error::BadEncoding(_) => {
                StoreError::Unrecoverable("keychain entry is not UTF-8".to_string())
            }
            _ => StoreError::Backend(e.to_string()),
        })?;

        StoredKeyRecord::from_json(json.as_bytes())
    }
}

impl Default for KeyringKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SecureKeyStore for KeyringKeyStore {
    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities {
            backing: StoreBacking::Software,
            isolation_available: false,
        }
    }

    fn contains(&self, alias: &str) -> Result<bool, StoreError> {
        match self.get_entry(alias)?.get_password() {
            Ok(_) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(e) => Err(StoreError::Backend(e.to_string())),
        }
    }

    fn generate(&self, alias: &str, spec: &KeyGenSpec) -> Result<KeyEntry, StoreError> {
        if spec.isolated {
            return Err(StoreError::IsolationUnavailable);
        }

        let key = SoftwarePrivateKey::generate(spec.key_size_bits)?;
        let created_at = Utc::now();
        let json = StoredKeyRecord::seal(key.as_ref(), created_at)?.to_json()?;
        // Records are JSON, always valid UTF-8
        let json = String::from_utf8(json).map_err(|e| StoreError::Backend(e.to_string()))?;

        self.get_entry(alias)?
            .set_password(&json)
            .map_err(|e| match e {
                keyring::Error::Ambiguous(_) => {
                    StoreError::Backend("Ambiguous keychain entry".to_string())
                }
                _ => StoreError::Backend(e.to_string()),
            })?;

        Ok(key.into_entry(alias, created_at, StoreBacking::Software))
    }

    fn entry(&self, alias: &str) -> Result<KeyEntry, StoreError> {
        self.read_record(alias)?
            .into_entry(alias, StoreBacking::Software)
    }

    fn delete(&self, alias: &str) -> Result<(), StoreError> {
        match self.get_entry(alias)?.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(StoreError::Backend(e.to_string())),
        }
    }

    fn creation_date(&self, alias: &str) -> Result<DateTime<Utc>, StoreError> {
        self.read_record(alias).map(|record| record.created_at)
    }
}
