//! Entry point bundling the device key services

use std::sync::Arc;

use oauth_shr::SigningAlgorithm;

use crate::config::PopConfig;
use crate::crypto::{SignatureService, SignedRequestMinter};
use crate::error::PopError;
use crate::keys::{GenerationPolicy, KeyPairManager};
use crate::storage::{open_store, SecureKeyStore};

/// Key lifecycle, signatures and signed requests over one key store
pub struct DevicePop {
    keys: Arc<KeyPairManager>,
    signatures: SignatureService,
    minter: SignedRequestMinter,
}

impl DevicePop {
    pub fn new(
        store: Arc<dyn SecureKeyStore>,
        policy: GenerationPolicy,
        algorithm: SigningAlgorithm,
    ) -> Self {
        let keys = Arc::new(KeyPairManager::new(store, policy));
        Self {
            signatures: SignatureService::new(Arc::clone(&keys)),
            minter: SignedRequestMinter::new(Arc::clone(&keys), algorithm),
            keys,
        }
    }

    /// Open the configured store and wire the services to it
    pub fn from_config(config: &PopConfig) -> Result<Self, PopError> {
        let store = open_store(config.store, config.key_dir.as_deref())?;
        Ok(Self::new(
            store,
            config.key.clone(),
            config.signing.algorithm,
        ))
    }

    pub fn keys(&self) -> &KeyPairManager {
        &self.keys
    }

    pub fn signatures(&self) -> &SignatureService {
        &self.signatures
    }

    pub fn minter(&self) -> &SignedRequestMinter {
        &self.minter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{StoreKind, KEY_ENTRY_ALIAS};
    use tempfile::TempDir;

    #[test]
    fn test_from_config_file_store() {
        let temp = TempDir::new().unwrap();
        let config = PopConfig {
            store: StoreKind::File,
            key_dir: Some(temp.path().to_path_buf()),
            key: GenerationPolicy {
                prefer_hardware_isolation: false,
                ..GenerationPolicy::default()
            },
            ..PopConfig::default()
        };

        let pop = DevicePop::from_config(&config).unwrap();
        let identity = pop.keys().generate().unwrap();

        assert_eq!(identity.alias, KEY_ENTRY_ALIAS);
        assert!(pop.keys().exists_with_thumbprint(&identity.thumbprint));

        // A second instance over the same directory sees the same key
        let reopened = DevicePop::from_config(&config).unwrap();
        assert_eq!(reopened.keys().thumbprint().unwrap(), identity.thumbprint);

        let signature = pop.signatures().sign("RS256", "payload").unwrap();
        assert!(reopened.signatures().verify("RS256", "payload", &signature));
    }
}
