//! Secure storage for the device key
//!
//! A store holds at most one RSA key pair per alias. The private half never
//! leaves the store: callers get a [`KeyEntry`] handle that exposes the public
//! key and a signing operation.
//!
//! Backends:
//! - [`MemoryKeyStore`]: process-lifetime store for tests and ephemeral hosts
//! - [`FileKeyStore`]: PKCS#8 records in a private directory
//! - [`KeyringKeyStore`]: OS credential vault (Keychain, Secret Service, Credential Manager)

pub mod file_store;
pub mod keyring_store;
pub mod memory_store;

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use oauth_shr::{compute_thumbprint, RsaPublicJwk, SigningAlgorithm};
use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use file_store::FileKeyStore;
pub use keyring_store::KeyringKeyStore;
pub use memory_store::MemoryKeyStore;

/// Alias of the one device key
pub const KEY_ENTRY_ALIAS: &str = "device-pop";

/// Where a store keeps its private keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StoreBacking {
    Software,
    HardwareBacked,
    /// Tamper-resistant module stronger than generic hardware backing
    IsolatedModule,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreCapabilities {
    pub backing: StoreBacking,
    pub isolation_available: bool,
}

/// Parameters for a new key pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyGenSpec {
    pub key_size_bits: usize,
    /// Request an isolated module
    pub isolated: bool,
}

/// Trait for device key storage
pub trait SecureKeyStore: Send + Sync {
    fn capabilities(&self) -> StoreCapabilities;

    /// Check whether an entry exists under `alias`
    fn contains(&self, alias: &str) -> Result<bool, StoreError>;

    /// Generate a key pair under `alias`, replacing any existing entry
    ///
    /// Fails with [`StoreError::IsolationUnavailable`] when `spec.isolated` is
    /// set and the store has no isolated module.
    fn generate(&self, alias: &str, spec: &KeyGenSpec) -> Result<KeyEntry, StoreError>;

    /// Fetch the entry under `alias`
    fn entry(&self, alias: &str) -> Result<KeyEntry, StoreError>;

    /// Delete the entry under `alias`; deleting an absent entry succeeds
    fn delete(&self, alias: &str) -> Result<(), StoreError>;

    /// When the entry under `alias` was generated
    fn creation_date(&self, alias: &str) -> Result<DateTime<Utc>, StoreError>;
}

/// Operations on a private key held inside a store
pub trait PrivateKeyOps: Send + Sync {
    fn sign(&self, algorithm: SigningAlgorithm, message: &[u8]) -> Result<Vec<u8>, StoreError>;

    /// Modulus size as reported by the store; negative when the store cannot tell
    fn bit_length(&self) -> i32;
}

/// Handle to a stored key pair
#[derive(Clone)]
pub struct KeyEntry {
    alias: String,
    public_key: RsaPublicKey,
    created_at: DateTime<Utc>,
    backing: StoreBacking,
    private_key: Arc<dyn PrivateKeyOps>,
}

impl KeyEntry {
    pub fn new(
        alias: impl Into<String>,
        public_key: RsaPublicKey,
        created_at: DateTime<Utc>,
        backing: StoreBacking,
        private_key: Arc<dyn PrivateKeyOps>,
    ) -> Self {
        Self {
            alias: alias.into(),
            public_key,
            created_at,
            backing,
            private_key,
        }
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    pub fn public_jwk(&self) -> RsaPublicJwk {
        RsaPublicJwk::from_public_key(&self.public_key)
    }

    /// RFC 7638 thumbprint of the public key
    pub fn thumbprint(&self) -> String {
        compute_thumbprint(&self.public_key)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn backing(&self) -> StoreBacking {
        self.backing
    }

    pub fn is_hardware_backed(&self) -> bool {
        self.backing != StoreBacking::Software
    }

    pub fn bit_length(&self) -> i32 {
        self.private_key.bit_length()
    }

    pub fn sign(&self, algorithm: SigningAlgorithm, message: &[u8]) -> Result<Vec<u8>, StoreError> {
        self.private_key.sign(algorithm, message)
    }

    /// Check `signature` over `message` with the public key
    pub fn verify(&self, algorithm: SigningAlgorithm, message: &[u8], signature: &[u8]) -> bool {
        algorithm
            .verify(&self.public_key, message, signature)
            .is_ok()
    }
}

impl fmt::Debug for KeyEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyEntry")
            .field("alias", &self.alias)
            .field("thumbprint", &self.thumbprint())
            .field("created_at", &self.created_at)
            .field("backing", &self.backing)
            .finish_non_exhaustive()
    }
}

/// Private key held in process memory
pub struct SoftwarePrivateKey(RsaPrivateKey);

impl SoftwarePrivateKey {
    pub fn generate(bits: usize) -> Result<Self, StoreError> {
        RsaPrivateKey::new(&mut OsRng, bits)
            .map(Self)
            .map_err(|e| StoreError::UnsupportedParameters(format!("{bits}-bit RSA: {e}")))
    }

    /// Wrap into an entry handle
    pub fn into_entry(
        self,
        alias: &str,
        created_at: DateTime<Utc>,
        backing: StoreBacking,
    ) -> KeyEntry {
        let public_key = self.0.to_public_key();
        KeyEntry::new(alias, public_key, created_at, backing, Arc::new(self))
    }
}

impl From<RsaPrivateKey> for SoftwarePrivateKey {
    fn from(key: RsaPrivateKey) -> Self {
        Self(key)
    }
}

impl AsRef<RsaPrivateKey> for SoftwarePrivateKey {
    fn as_ref(&self) -> &RsaPrivateKey {
        &self.0
    }
}

impl PrivateKeyOps for SoftwarePrivateKey {
    fn sign(&self, algorithm: SigningAlgorithm, message: &[u8]) -> Result<Vec<u8>, StoreError> {
        algorithm
            .sign(&self.0, message)
            .map_err(|e| StoreError::Signing(e.to_string()))
    }

    fn bit_length(&self) -> i32 {
        i32::try_from(self.0.n().bits()).unwrap_or(i32::MAX)
    }
}

/// Persisted form of a software key, shared by the file and keyring stores
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct StoredKeyRecord {
    pub created_at: DateTime<Utc>,
    /// Base64 PKCS#8 DER
    pub private_key: String,
}

impl StoredKeyRecord {
    pub fn seal(key: &RsaPrivateKey, created_at: DateTime<Utc>) -> Result<Self, StoreError> {
        let der = key
            .to_pkcs8_der()
            .map_err(|e| StoreError::Backend(format!("PKCS#8 encoding failed: {e}")))?;
        Ok(Self {
            created_at,
            private_key: STANDARD.encode(der.as_bytes()),
        })
    }

    pub fn open(&self) -> Result<RsaPrivateKey, StoreError> {
        let der = STANDARD
            .decode(&self.private_key)
            .map_err(|e| StoreError::Unrecoverable(format!("Base64 decode error: {e}")))?;
        RsaPrivateKey::from_pkcs8_der(&der)
            .map_err(|e| StoreError::Unrecoverable(format!("PKCS#8 decode error: {e}")))
    }

    pub fn from_json(json: &[u8]) -> Result<Self, StoreError> {
        serde_json::from_slice(json)
            .map_err(|e| StoreError::Unrecoverable(format!("Malformed key record: {e}")))
    }

    pub fn to_json(&self) -> Result<Vec<u8>, StoreError> {
        serde_json::to_vec(self).map_err(|e| StoreError::Backend(e.to_string()))
    }

    pub fn into_entry(self, alias: &str, backing: StoreBacking) -> Result<KeyEntry, StoreError> {
        let key = self.open()?;
        Ok(SoftwarePrivateKey::from(key).into_entry(alias, self.created_at, backing))
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Key store not initialized: {0}")]
    NotInitialized(String),
    #[error("Key not found: {0}")]
    NotFound(String),
    #[error("Key entry unrecoverable: {0}")]
    Unrecoverable(String),
    #[error("Isolated key storage unavailable")]
    IsolationUnavailable,
    #[error("Unsupported key parameters: {0}")]
    UnsupportedParameters(String),
    #[error("Signing error: {0}")]
    Signing(String),
    #[error("Storage backend error: {0}")]
    Backend(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Which backend holds the device key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Memory,
    #[default]
    File,
    Keyring,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Memory => "memory",
            Self::File => "file",
            Self::Keyring => "keyring",
        })
    }
}

impl FromStr for StoreKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "file" => Ok(Self::File),
            "keyring" => Ok(Self::Keyring),
            other => Err(StoreError::NotInitialized(format!("unknown store kind {other:?}"))),
        }
    }
}

/// Open the configured store; `key_dir` only applies to the file store
pub fn open_store(
    kind: StoreKind,
    key_dir: Option<&Path>,
) -> Result<Arc<dyn SecureKeyStore>, StoreError> {
    let store: Arc<dyn SecureKeyStore> = match kind {
        StoreKind::Memory => Arc::new(MemoryKeyStore::new()),
        StoreKind::File => match key_dir {
            Some(dir) => Arc::new(FileKeyStore::open(dir)?),
            None => Arc::new(FileKeyStore::new()?),
        },
        StoreKind::Keyring => Arc::new(KeyringKeyStore::new()),
    };
    tracing::debug!(store = %kind, "Opened key store");
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_key;

    #[test]
    fn test_record_roundtrip() {
        let created_at = Utc::now();
        let record = StoredKeyRecord::seal(test_key(), created_at).unwrap();
        let json = record.to_json().unwrap();

        let entry = StoredKeyRecord::from_json(&json)
            .unwrap()
            .into_entry(KEY_ENTRY_ALIAS, StoreBacking::Software)
            .unwrap();

        assert_eq!(entry.public_key(), &test_key().to_public_key());
        assert_eq!(entry.created_at(), created_at);
        assert_eq!(entry.bit_length(), 2048);
        assert!(!entry.is_hardware_backed());
    }

    #[test]
    fn test_corrupt_record_is_unrecoverable() {
        assert!(matches!(
            StoredKeyRecord::from_json(b"not json"),
            Err(StoreError::Unrecoverable(_))
        ));

        let record = StoredKeyRecord {
            created_at: Utc::now(),
            private_key: STANDARD.encode(b"not a key"),
        };
        assert!(matches!(record.open(), Err(StoreError::Unrecoverable(_))));
    }

    #[test]
    fn test_entry_sign_verify() {
        let entry = SoftwarePrivateKey::from(test_key().clone()).into_entry(
            KEY_ENTRY_ALIAS,
            Utc::now(),
            StoreBacking::Software,
        );

        let signature = entry.sign(SigningAlgorithm::Rs256, b"message").unwrap();
        assert!(entry.verify(SigningAlgorithm::Rs256, b"message", &signature));
        assert!(!entry.verify(SigningAlgorithm::Rs256, b"other", &signature));
        assert!(!entry.verify(SigningAlgorithm::Ps256, b"message", &signature));
    }

    #[test]
    fn test_entry_debug_hides_private_key() {
        let entry = SoftwarePrivateKey::from(test_key().clone()).into_entry(
            KEY_ENTRY_ALIAS,
            Utc::now(),
            StoreBacking::HardwareBacked,
        );
        let debug = format!("{entry:?}");
        assert!(debug.contains("thumbprint"));
        assert!(!debug.contains("private_key"));
        assert!(entry.is_hardware_backed());
    }

    #[test]
    fn test_store_kind_parse() {
        assert_eq!("memory".parse::<StoreKind>().unwrap(), StoreKind::Memory);
        assert_eq!("File".parse::<StoreKind>().unwrap(), StoreKind::File);
        assert_eq!("keyring".parse::<StoreKind>().unwrap(), StoreKind::Keyring);
        assert!("tpm".parse::<StoreKind>().is_err());
    }

    #[test]
    fn test_store_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn SecureKeyStore>();
        assert_send_sync::<KeyEntry>();
    }
}
