//! Shared fixtures for unit tests

use std::collections::VecDeque;
use std::sync::{mpsc, Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use oauth_shr::SigningAlgorithm;
use rand::rngs::OsRng;
use rsa::RsaPrivateKey;

use crate::storage::{
    KeyEntry, KeyGenSpec, MemoryKeyStore, PrivateKeyOps, SecureKeyStore, SoftwarePrivateKey,
    StoreBacking, StoreCapabilities, StoreError, KEY_ENTRY_ALIAS,
};

static KEY: Lazy<RsaPrivateKey> =
    Lazy::new(|| RsaPrivateKey::new(&mut OsRng, 2048).expect("generate test key"));

pub(crate) fn test_key() -> &'static RsaPrivateKey {
    &KEY
}

pub(crate) fn created_at() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

pub(crate) fn test_entry() -> KeyEntry {
    SoftwarePrivateKey::from(test_key().clone()).into_entry(
        KEY_ENTRY_ALIAS,
        created_at(),
        StoreBacking::Software,
    )
}

/// Memory store already holding the test key
pub(crate) fn store_with_key() -> Arc<MemoryKeyStore> {
    let store = MemoryKeyStore::new();
    store.insert(KEY_ENTRY_ALIAS, test_entry()).unwrap();
    Arc::new(store)
}

/// Real key reporting whatever size the test wants
struct ReportedSize {
    key: SoftwarePrivateKey,
    bits: i32,
}

impl PrivateKeyOps for ReportedSize {
    fn sign(&self, algorithm: SigningAlgorithm, message: &[u8]) -> Result<Vec<u8>, StoreError> {
        self.key.sign(algorithm, message)
    }

    fn bit_length(&self) -> i32 {
        self.bits
    }
}

/// One scripted response to `generate`
pub(crate) enum Step {
    /// Produce an entry reporting this bit length
    Key { bits: i32, backing: StoreBacking },
    Fail(StoreError),
}

/// Store whose `generate` replays a script and records each request
#[derive(Default)]
pub(crate) struct ScriptedStore {
    script: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<KeyGenSpec>>,
    deletes: Mutex<usize>,
    inner: MemoryKeyStore,
    isolation_available: bool,
}

impl ScriptedStore {
    /// Isolated requests are rejected, like a device without an isolated module
    pub fn new(script: Vec<Step>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        }
    }

    /// Honour isolated requests
    pub fn with_isolation(script: Vec<Step>) -> Self {
        Self {
            isolation_available: true,
            ..Self::new(script)
        }
    }

    pub fn requests(&self) -> Vec<KeyGenSpec> {
        self.requests.lock().unwrap().clone()
    }

    pub fn delete_count(&self) -> usize {
        *self.deletes.lock().unwrap()
    }
}

impl SecureKeyStore for ScriptedStore {
    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities {
            backing: StoreBacking::HardwareBacked,
            isolation_available: self.isolation_available,
        }
    }

    fn contains(&self, alias: &str) -> Result<bool, StoreError> {
        self.inner.contains(alias)
    }

    fn generate(&self, alias: &str, spec: &KeyGenSpec) -> Result<KeyEntry, StoreError> {
        self.requests.lock().unwrap().push(*spec);
        if spec.isolated && !self.isolation_available {
            return Err(StoreError::IsolationUnavailable);
        }

        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .expect("generate called more often than scripted");
        match step {
            Step::Key { bits, backing } => {
                let ops = ReportedSize {
                    key: SoftwarePrivateKey::from(test_key().clone()),
                    bits,
                };
                let entry = KeyEntry::new(
                    alias,
                    test_key().to_public_key(),
                    created_at(),
                    backing,
                    Arc::new(ops),
                );
                self.inner.insert(alias, entry.clone())?;
                Ok(entry)
            }
            Step::Fail(err) => Err(err),
        }
    }

    fn entry(&self, alias: &str) -> Result<KeyEntry, StoreError> {
        self.inner.entry(alias)
    }

    fn delete(&self, alias: &str) -> Result<(), StoreError> {
        *self.deletes.lock().unwrap() += 1;
        self.inner.delete(alias)
    }

    fn creation_date(&self, alias: &str) -> Result<DateTime<Utc>, StoreError> {
        self.inner.creation_date(alias)
    }
}

/// Store failing every call, for error-path tests
pub(crate) struct BrokenStore;

impl SecureKeyStore for BrokenStore {
    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities {
            backing: StoreBacking::Software,
            isolation_available: false,
        }
    }

    fn contains(&self, _alias: &str) -> Result<bool, StoreError> {
        Err(StoreError::NotInitialized("broken".to_string()))
    }

    fn generate(&self, _alias: &str, _spec: &KeyGenSpec) -> Result<KeyEntry, StoreError> {
        Err(StoreError::NotInitialized("broken".to_string()))
    }

    fn entry(&self, _alias: &str) -> Result<KeyEntry, StoreError> {
        Err(StoreError::NotInitialized("broken".to_string()))
    }

    fn delete(&self, _alias: &str) -> Result<(), StoreError> {
        Err(StoreError::NotInitialized("broken".to_string()))
    }

    fn creation_date(&self, _alias: &str) -> Result<DateTime<Utc>, StoreError> {
        Err(StoreError::NotInitialized("broken".to_string()))
    }
}

/// Store whose `generate` parks until the test releases it
///
/// Isolated requests are rejected immediately; only the fallback is gated.
pub(crate) struct GatedStore {
    inner: MemoryKeyStore,
    entered: Mutex<mpsc::Sender<()>>,
    release: Mutex<mpsc::Receiver<()>>,
}

impl GatedStore {
    /// Returns the store, a receiver signalled when `generate` is parked, and
    /// the sender that lets it finish
    pub fn new() -> (Self, mpsc::Receiver<()>, mpsc::Sender<()>) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let store = Self {
            inner: MemoryKeyStore::new(),
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        };
        (store, entered_rx, release_tx)
    }
}

impl SecureKeyStore for GatedStore {
    fn capabilities(&self) -> StoreCapabilities {
        self.inner.capabilities()
    }

    fn contains(&self, alias: &str) -> Result<bool, StoreError> {
        self.inner.contains(alias)
    }

    fn generate(&self, alias: &str, spec: &KeyGenSpec) -> Result<KeyEntry, StoreError> {
        if spec.isolated {
            return Err(StoreError::IsolationUnavailable);
        }

        let _ = self.entered.lock().unwrap().send(());
        self.release
            .lock()
            .unwrap()
            .recv()
            .map_err(|_| StoreError::Backend("gate dropped".to_string()))?;

        let entry = test_entry();
        self.inner.insert(alias, entry.clone())?;
        Ok(entry)
    }

    fn entry(&self, alias: &str) -> Result<KeyEntry, StoreError> {
        self.inner.entry(alias)
    }

    fn delete(&self, alias: &str) -> Result<(), StoreError> {
        self.inner.delete(alias)
    }

    fn creation_date(&self, alias: &str) -> Result<DateTime<Utc>, StoreError> {
        self.inner.creation_date(alias)
    }
}
