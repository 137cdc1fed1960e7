//! Sign and verify arbitrary payloads with the device key

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};
use oauth_shr::SigningAlgorithm;
use tracing::{debug, warn};

use crate::error::PopError;
use crate::keys::KeyPairManager;

/// Outcome of a signature check
#[derive(Debug)]
pub enum Verification {
    Valid,
    Invalid,
    /// The check could not be carried out
    Error(PopError),
}

impl Verification {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// Sign/verify over text payloads using the stored device key
pub struct SignatureService {
    keys: Arc<KeyPairManager>,
}

impl SignatureService {
    pub fn new(keys: Arc<KeyPairManager>) -> Self {
        Self { keys }
    }

    /// Sign `input` and return the signature as padded standard base64
    ///
    /// `algorithm` accepts JWS (`RS256`) and keystore (`SHA256withRSA`) names.
    pub fn sign(&self, algorithm: &str, input: &str) -> Result<String, PopError> {
        let algorithm: SigningAlgorithm = algorithm.parse()?;
        let entry = self.keys.entry()?;
        let signature = entry.sign(algorithm, input.as_bytes())?;

        debug!(%algorithm, len = signature.len(), "Signed payload");
        Ok(STANDARD.encode(signature))
    }

    /// Check a base64 signature over `plaintext`, reporting why a check failed
    pub fn verify_detailed(
        &self,
        algorithm: &str,
        plaintext: &str,
        signature_b64: &str,
    ) -> Verification {
        match self.try_verify(algorithm, plaintext, signature_b64) {
            Ok(true) => Verification::Valid,
            Ok(false) => Verification::Invalid,
            Err(e) => Verification::Error(e),
        }
    }

    /// Check a base64 signature over `plaintext`
    ///
    /// Never fails: anything that prevents the check is logged and reported as
    /// an invalid signature.
    pub fn verify(&self, algorithm: &str, plaintext: &str, signature_b64: &str) -> bool {
        match self.verify_detailed(algorithm, plaintext, signature_b64) {
            Verification::Valid => true,
            Verification::Invalid => false,
            Verification::Error(e) => {
                warn!(code = e.code(), error = %e, "Signature verification failed");
                false
            }
        }
    }

    fn try_verify(
        &self,
        algorithm: &str,
        plaintext: &str,
        signature_b64: &str,
    ) -> Result<bool, PopError> {
        let algorithm: SigningAlgorithm = algorithm.parse()?;

        // Tolerate line-wrapped base64
        let compact: String = signature_b64
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        let signature = STANDARD
            .decode(compact)
            .map_err(|e| PopError::EncodingFailure(format!("signature is not base64: {e}")))?;

        let entry = self.keys.entry()?;
        Ok(entry.verify(algorithm, plaintext.as_bytes(), &signature))
    }
}
