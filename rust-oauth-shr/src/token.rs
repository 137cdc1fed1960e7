//! Compact serialization of signed requests

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};

use crate::error::ShrError;
use crate::jwk::Confirmation;

/// Protected header of a signed request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShrHeader {
    /// JWS algorithm name
    pub alg: String,
    /// Thumbprint of the signing key
    pub kid: String,
}

/// Signed request claims
///
/// Optional members are omitted entirely when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShrClaims {
    /// Access token, embedded verbatim
    pub at: String,
    /// Request timestamp (seconds since Unix epoch)
    pub ts: i64,
    /// Host and explicit port of the request URL
    pub u: String,
    /// Request path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p: Option<String>,
    /// HTTP method
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub m: Option<String>,
    /// Server-provided nonce
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// Confirmation key
    pub cnf: Confirmation,
}

/// A signed request split into its parts
#[derive(Debug, Clone)]
pub struct DecodedShr {
    /// Decoded protected header
    pub header: ShrHeader,
    /// Decoded claim set
    pub claims: ShrClaims,
    /// `header.payload` as it was signed
    pub signing_input: String,
    /// Raw signature bytes from the third segment
    pub signature: Vec<u8>,
}

/// Split and decode a compact signed request without checking its signature
pub fn decode_shr(token: &str) -> Result<DecodedShr, ShrError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
        return Err(ShrError::InvalidTokenFormat);
    }

    let header_bytes = URL_SAFE_NO_PAD
        .decode(parts[0])
        .map_err(|_| ShrError::InvalidBase64)?;
    let claims_bytes = URL_SAFE_NO_PAD
        .decode(parts[1])
        .map_err(|_| ShrError::InvalidBase64)?;
    let signature = URL_SAFE_NO_PAD
        .decode(parts[2])
        .map_err(|_| ShrError::InvalidBase64)?;

    Ok(DecodedShr {
        header: serde_json::from_slice(&header_bytes)?,
        claims: serde_json::from_slice(&claims_bytes)?,
        signing_input: format!("{}.{}", parts[0], parts[1]),
        signature,
    })
}

pub(crate) fn encode_segment<T: Serialize>(value: &T) -> Result<String, ShrError> {
    Ok(URL_SAFE_NO_PAD.encode(serde_json::to_vec(value)?))
}
