//! Device key lifecycle: generate, inspect, clear

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::PopError;
use crate::keys::policy::GenerationPolicy;
use crate::storage::{
    KeyEntry, KeyGenSpec, SecureKeyStore, StoreCapabilities, StoreError, KEY_ENTRY_ALIAS,
};

/// Identity of the current device key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyIdentity {
    pub alias: String,
    pub created_at: DateTime<Utc>,
    pub thumbprint: String,
    pub hardware_backed: bool,
}

impl From<&KeyEntry> for KeyIdentity {
    fn from(entry: &KeyEntry) -> Self {
        Self {
            alias: entry.alias().to_string(),
            created_at: entry.created_at(),
            thumbprint: entry.thumbprint(),
            hardware_backed: entry.is_hardware_backed(),
        }
    }
}

/// Manages the single device key held under [`KEY_ENTRY_ALIAS`]
///
/// `generate` and `clear` are serialized so a clear can never interleave with
/// the rollback of a rejected key.
pub struct KeyPairManager {
    store: Arc<dyn SecureKeyStore>,
    policy: GenerationPolicy,
    lifecycle: Mutex<()>,
}

impl KeyPairManager {
    pub fn new(store: Arc<dyn SecureKeyStore>, policy: GenerationPolicy) -> Self {
        Self {
            store,
            policy,
            lifecycle: Mutex::new(()),
        }
    }

    pub fn policy(&self) -> &GenerationPolicy {
        &self.policy
    }

    /// What the underlying store can offer
    pub fn capabilities(&self) -> StoreCapabilities {
        self.store.capabilities()
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        // The guard protects no data, so a poisoned lock is still usable
        self.lifecycle.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Generate the device key with the configured policy
    pub fn generate(&self) -> Result<KeyIdentity, PopError> {
        self.generate_with(&self.policy)
    }

    /// Generate the device key, replacing any existing one
    ///
    /// Keys reporting fewer bits than `policy.min_key_size_bits` are deleted and
    /// regenerated, up to `policy.max_attempts` times in total.
    pub fn generate_with(&self, policy: &GenerationPolicy) -> Result<KeyIdentity, PopError> {
        // Before the lock and any delete, so a bad policy leaves the current key alone
        policy.validate()?;
        let _guard = self.lock();

        let capabilities = self.store.capabilities();
        debug!(
            backing = ?capabilities.backing,
            isolation_available = capabilities.isolation_available,
            "Generating device key"
        );

        for attempt in 1..=policy.max_attempts {
            let entry = self.generate_once(policy)?;
            let bits = entry.bit_length();

            if policy.accepts(bits) {
                let identity = KeyIdentity::from(&entry);
                info!(
                    thumbprint = %identity.thumbprint,
                    bits,
                    attempt,
                    hardware_backed = identity.hardware_backed,
                    "Generated device key"
                );
                return Ok(identity);
            }

            warn!(
                bits,
                min_bits = policy.min_key_size_bits,
                attempt,
                "Generated key below minimum size, discarding"
            );
            self.discard();
        }

        self.discard();
        let err = PopError::BadKeySize {
            min_bits: policy.min_key_size_bits,
            attempts: policy.max_attempts,
        };
        error!(code = err.code(), "{}", err);
        Err(err)
    }

    fn generate_once(&self, policy: &GenerationPolicy) -> Result<KeyEntry, PopError> {
        let spec = KeyGenSpec {
            key_size_bits: policy.key_size_bits,
            isolated: policy.prefer_hardware_isolation,
        };

        match self.store.generate(KEY_ENTRY_ALIAS, &spec) {
            Err(StoreError::IsolationUnavailable) if spec.isolated => {
                warn!("Isolated key storage unavailable, generating without it");
                let fallback = KeyGenSpec {
                    isolated: false,
                    ..spec
                };
                Ok(self.store.generate(KEY_ENTRY_ALIAS, &fallback)?)
            }
            result => Ok(result?),
        }
    }

    /// Delete the entry without taking the lifecycle lock
    fn discard(&self) {
        if let Err(e) = self.store.delete(KEY_ENTRY_ALIAS) {
            warn!(error = %e, "Failed to delete rejected key");
        }
    }

    /// Whether a device key exists; lookup failures count as absent
    pub fn exists(&self) -> bool {
        match self.store.contains(KEY_ENTRY_ALIAS) {
            Ok(present) => present,
            Err(e) => {
                warn!(error = %e, "Key store lookup failed");
                false
            }
        }
    }

    /// Whether the current device key has exactly this thumbprint
    pub fn exists_with_thumbprint(&self, thumbprint: &str) -> bool {
        if thumbprint.is_empty() {
            return false;
        }
        match self.thumbprint() {
            Ok(current) => current == thumbprint,
            Err(PopError::KeyMissing) => false,
            Err(e) => {
                warn!(code = e.code(), error = %e, "Could not read current thumbprint");
                false
            }
        }
    }

    /// Delete the device key; returns false only when the store refused
    pub fn clear(&self) -> bool {
        let _guard = self.lock();

        match self.store.delete(KEY_ENTRY_ALIAS) {
            Ok(()) => {
                info!("Cleared device key");
                true
            }
            Err(e) => {
                error!(error = %e, "Failed to clear device key");
                false
            }
        }
    }

    /// When the device key was generated, `None` when there is no key
    pub fn creation_date(&self) -> Result<Option<DateTime<Utc>>, PopError> {
        match self.store.creation_date(KEY_ENTRY_ALIAS) {
            Ok(date) => Ok(Some(date)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(PopError::KeyStoreUnavailable(e)),
        }
    }

    /// Fetch the current device key
    pub fn entry(&self) -> Result<KeyEntry, PopError> {
        let entry = self.store.entry(KEY_ENTRY_ALIAS)?;
        debug!(backing = ?entry.backing(), "Loaded device key");
        Ok(entry)
    }

    /// RFC 7638 thumbprint of the current device key
    pub fn thumbprint(&self) -> Result<String, PopError> {
        Ok(self.entry()?.thumbprint())
    }

    pub fn identity(&self) -> Result<KeyIdentity, PopError> {
        Ok(KeyIdentity::from(&self.entry()?))
    }
}
