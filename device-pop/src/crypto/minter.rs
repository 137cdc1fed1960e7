//! Signed HTTP request minting with the device key

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};
use oauth_shr::{
    mint_shr, request_confirmation, RsaPublicJwk, ShrRequest, ShrSigner, SigningAlgorithm,
};
use rsa::pkcs8::EncodePublicKey;
use tracing::debug;

use crate::error::PopError;
use crate::keys::KeyPairManager;
use crate::storage::KeyEntry;

/// Export encoding for the device public key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicKeyFormat {
    /// Padded standard base64 of the DER SubjectPublicKeyInfo
    DerSubjectPublicKeyInfo,
    /// JWK JSON
    Jwk,
}

impl FromStr for PublicKeyFormat {
    type Err = PopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "der" | "spki" | "x_509_subjectpublickeyinfo_asn_1" => {
                Ok(Self::DerSubjectPublicKeyInfo)
            }
            "jwk" => Ok(Self::Jwk),
            _ => Err(PopError::UnknownExportFormat(s.to_string())),
        }
    }
}

impl fmt::Display for PublicKeyFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::DerSubjectPublicKeyInfo => "der",
            Self::Jwk => "jwk",
        })
    }
}

/// Signs with one fetched entry so `kid` and `cnf` always describe the same key
struct EntrySigner<'a> {
    entry: &'a KeyEntry,
    algorithm: SigningAlgorithm,
}

impl ShrSigner for EntrySigner<'_> {
    type Error = PopError;

    fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }

    fn public_jwk(&self) -> Result<RsaPublicJwk, PopError> {
        Ok(self.entry.public_jwk())
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, PopError> {
        Ok(self.entry.sign(self.algorithm, message)?)
    }
}

/// Mints signed requests bound to the device key
pub struct SignedRequestMinter {
    keys: Arc<KeyPairManager>,
    algorithm: SigningAlgorithm,
}

impl SignedRequestMinter {
    pub fn new(keys: Arc<KeyPairManager>, algorithm: SigningAlgorithm) -> Self {
        Self { keys, algorithm }
    }

    pub fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }

    /// Mint a compact signed request for `request`
    pub fn mint(&self, request: &ShrRequest<'_>) -> Result<String, PopError> {
        let entry = self.keys.entry()?;
        let signer = EntrySigner {
            entry: &entry,
            algorithm: self.algorithm,
        };

        let shr = mint_shr(&signer, request)?;
        debug!(algorithm = %self.algorithm, ts = request.timestamp, "Minted signed request");
        Ok(shr)
    }

    /// Request confirmation (`reqCnf`) of the device key
    pub fn request_confirmation(&self) -> Result<String, PopError> {
        let thumbprint = self.keys.thumbprint()?;
        Ok(request_confirmation(&thumbprint)?)
    }

    /// Export the device public key
    pub fn public_key(&self, format: PublicKeyFormat) -> Result<String, PopError> {
        let entry = self.keys.entry()?;
        match format {
            PublicKeyFormat::DerSubjectPublicKeyInfo => {
                let der = entry
                    .public_key()
                    .to_public_key_der()
                    .map_err(|e| PopError::EncodingFailure(e.to_string()))?;
                Ok(STANDARD.encode(der.as_bytes()))
            }
            PublicKeyFormat::Jwk => Ok(entry.public_jwk().to_json()?),
        }
    }
}
