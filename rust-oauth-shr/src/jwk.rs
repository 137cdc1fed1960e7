//! JSON Web Key (JWK) types for signed requests

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPublicKey};
use serde::{Deserialize, Serialize};

use crate::error::ShrError;

/// RSA public key in JWK format
///
/// Member order matches what is written into the `cnf` claim: `kty`, `n`, `e`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RsaPublicJwk {
    /// Key type (always "RSA")
    pub kty: String,
    /// Modulus (base64url-encoded, big-endian, no leading zeros)
    pub n: String,
    /// Public exponent (base64url-encoded)
    pub e: String,
}

impl RsaPublicJwk {
    /// Create a new RSA public JWK from encoded components
    pub fn new(n: String, e: String) -> Self {
        Self {
            kty: "RSA".to_string(),
            n,
            e,
        }
    }

    /// Build the JWK for an RSA public key
    pub fn from_public_key(key: &RsaPublicKey) -> Self {
        Self::new(
            URL_SAFE_NO_PAD.encode(key.n().to_bytes_be()),
            URL_SAFE_NO_PAD.encode(key.e().to_bytes_be()),
        )
    }

    /// Decode back into an RSA public key, rejecting anything that is not one
    pub fn to_public_key(&self) -> Result<RsaPublicKey, ShrError> {
        if self.kty != "RSA" {
            return Err(ShrError::InvalidJwk(format!("kty={}", self.kty)));
        }
        let n = decode_member("n", &self.n)?;
        let e = decode_member("e", &self.e)?;

        RsaPublicKey::new(BigUint::from_bytes_be(&n), BigUint::from_bytes_be(&e))
            .map_err(|err| ShrError::InvalidJwk(err.to_string()))
    }

    /// Serialize as a JSON string (`{"kty":"RSA","n":"...","e":"..."}`)
    pub fn to_json(&self) -> Result<String, ShrError> {
        Ok(serde_json::to_string(self)?)
    }
}

pub(crate) fn decode_member(name: &str, value: &str) -> Result<Vec<u8>, ShrError> {
    if value.is_empty() {
        return Err(ShrError::InvalidJwk(format!("empty member {name}")));
    }
    URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|_| ShrError::InvalidJwk(format!("member {name} is not base64url")))
}

/// Confirmation claim (`cnf`) wrapping the public key of the proof-of-possession key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    /// The confirmation key
    pub jwk: RsaPublicJwk,
}

impl From<RsaPublicJwk> for Confirmation {
    fn from(jwk: RsaPublicJwk) -> Self {
        Self { jwk }
    }
}

/// Build the request confirmation (`reqCnf`) for a key thumbprint
///
/// The value is the base64url (unpadded) encoding of `{"kid":"<thumbprint>"}`.
pub fn request_confirmation(thumbprint: &str) -> Result<String, ShrError> {
    let json = serde_json::to_string(&serde_json::json!({ "kid": thumbprint }))?;
    Ok(URL_SAFE_NO_PAD.encode(json.as_bytes()))
}
