//! JWK Thumbprint computation (RFC 7638)

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rsa::traits::PublicKeyParts;
use rsa::RsaPublicKey;
use sha2::{Digest, Sha256};

use crate::error::ShrError;
use crate::jwk::{decode_member, RsaPublicJwk};

/// Compute the JWK thumbprint of an RSA public key per RFC 7638
///
/// The thumbprint is SHA-256 of the canonical JSON representation:
/// `{"e":"...","kty":"RSA","n":"..."}`
///
/// Note: Members MUST be in lexicographic order per RFC 7638.
pub fn compute_thumbprint(key: &RsaPublicKey) -> String {
    let n = URL_SAFE_NO_PAD.encode(key.n().to_bytes_be());
    let e = URL_SAFE_NO_PAD.encode(key.e().to_bytes_be());

    compute_thumbprint_from_components(&n, &e)
}

/// Compute the JWK thumbprint from base64url-encoded modulus and exponent
pub fn compute_thumbprint_from_components(n: &str, e: &str) -> String {
    // RFC 7638: e < kty < n
    let canonical = format!(r#"{{"e":"{}","kty":"RSA","n":"{}"}}"#, e, n);

    let hash = Sha256::digest(canonical.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Compute the JWK thumbprint from a parsed JWK
///
/// Fails when the JWK is not an RSA key or a member is empty or not base64url.
pub fn compute_thumbprint_from_jwk(jwk: &RsaPublicJwk) -> Result<String, ShrError> {
    if jwk.kty != "RSA" {
        return Err(ShrError::InvalidJwk(format!("kty={}", jwk.kty)));
    }
    decode_member("n", &jwk.n)?;
    decode_member("e", &jwk.e)?;

    Ok(compute_thumbprint_from_components(&jwk.n, &jwk.e))
}
