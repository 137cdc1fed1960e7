//! Resource-server validation of signed requests
//!
//! Security hardening:
//! - Constant-time comparison for key ids, nonces and access tokens
//! - `kid` must be the thumbprint of the embedded confirmation key
//! - Timestamps from the future are rejected beyond a small clock skew

use std::time::{SystemTime, UNIX_EPOCH};

use subtle::ConstantTimeEq;

use crate::algorithm::SigningAlgorithm;
pub use crate::error::ShrValidationError;
use crate::thumbprint::compute_thumbprint_from_jwk;
use crate::token::{decode_shr, ShrClaims};

/// Allowed clock skew for timestamps ahead of the server clock
const FUTURE_SKEW_SECS: i64 = 5;

/// Constant-time string comparison for cryptographic values
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Signed request validation configuration
///
/// Unset expectations are not checked.
#[derive(Debug, Clone)]
pub struct ShrValidation {
    /// Maximum age of the request in seconds (default: 60)
    pub max_age_secs: u64,
    /// Expected HTTP method (e.g., "GET", "POST")
    pub expected_method: Option<String>,
    /// Expected `host[:port]`
    pub expected_authority: Option<String>,
    /// Expected request path
    pub expected_path: Option<String>,
    /// Whether nonce is required
    pub require_nonce: bool,
    /// Expected nonce value (if require_nonce is true)
    pub expected_nonce: Option<String>,
    /// Access token the request must embed
    pub expected_access_token: Option<String>,
}

impl Default for ShrValidation {
    fn default() -> Self {
        Self {
            max_age_secs: 60,
            expected_method: None,
            expected_authority: None,
            expected_path: None,
            require_nonce: false,
            expected_nonce: None,
            expected_access_token: None,
        }
    }
}

/// A signed request that passed validation
#[derive(Debug, Clone)]
pub struct ValidatedShr {
    pub algorithm: SigningAlgorithm,
    /// Thumbprint of the confirmation key
    pub thumbprint: String,
    pub claims: ShrClaims,
}

/// Validate a signed request against the current time
///
/// The returned thumbprint should be compared against the key the access
/// token is bound to with [`verify_binding`].
pub fn validate_shr(
    token: &str,
    config: &ShrValidation,
) -> Result<ValidatedShr, ShrValidationError> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default();
    validate_shr_at(token, config, now)
}

/// Validate a signed request as of `now` (seconds since Unix epoch)
pub fn validate_shr_at(
    token: &str,
    config: &ShrValidation,
    now: i64,
) -> Result<ValidatedShr, ShrValidationError> {
    let decoded = decode_shr(token)?;

    // Only JWS names are accepted in the header
    let algorithm = decoded
        .header
        .alg
        .parse::<SigningAlgorithm>()
        .ok()
        .filter(|alg| alg.jws_name() == decoded.header.alg)
        .ok_or_else(|| ShrValidationError::UnsupportedAlgorithm(decoded.header.alg.clone()))?;

    let jwk = &decoded.claims.cnf.jwk;
    let public_key = jwk.to_public_key()?;

    algorithm
        .verify(&public_key, decoded.signing_input.as_bytes(), &decoded.signature)
        .map_err(|_| ShrValidationError::InvalidSignature)?;

    let thumbprint = compute_thumbprint_from_jwk(jwk)?;
    if !constant_time_eq(&decoded.header.kid, &thumbprint) {
        return Err(ShrValidationError::KidMismatch {
            kid: decoded.header.kid,
            thumbprint,
        });
    }

    let claims = decoded.claims;

    let max_age = i64::try_from(config.max_age_secs).unwrap_or(i64::MAX);
    if now.saturating_sub(claims.ts) > max_age || claims.ts > now.saturating_add(FUTURE_SKEW_SECS)
    {
        return Err(ShrValidationError::Expired { ts: claims.ts, now });
    }

    if let Some(expected) = &config.expected_method {
        if claims.m.as_deref() != Some(expected.as_str()) {
            return Err(ShrValidationError::MethodMismatch {
                expected: expected.clone(),
                actual: claims.m,
            });
        }
    }

    if let Some(expected) = &config.expected_authority {
        // Host names are case-insensitive
        if !claims.u.eq_ignore_ascii_case(expected) {
            return Err(ShrValidationError::AuthorityMismatch {
                expected: expected.clone(),
                actual: claims.u,
            });
        }
    }

    if let Some(expected) = &config.expected_path {
        if claims.p.as_deref() != Some(expected.as_str()) {
            return Err(ShrValidationError::PathMismatch {
                expected: expected.clone(),
                actual: claims.p,
            });
        }
    }

    if config.require_nonce {
        match (&claims.nonce, &config.expected_nonce) {
            (Some(nonce), Some(expected)) => {
                if !constant_time_eq(nonce, expected) {
                    return Err(ShrValidationError::NonceMismatch);
                }
            }
            (None, _) => return Err(ShrValidationError::MissingNonce),
            _ => {}
        }
    }

    if let Some(expected) = &config.expected_access_token {
        if !constant_time_eq(&claims.at, expected) {
            return Err(ShrValidationError::AccessTokenMismatch);
        }
    }

    Ok(ValidatedShr {
        algorithm,
        thumbprint,
        claims,
    })
}

/// Verify that the request's key is the one the access token is bound to
///
/// Uses constant-time comparison to prevent timing attacks.
pub fn verify_binding(
    request_thumbprint: &str,
    bound_thumbprint: &str,
) -> Result<(), ShrValidationError> {
    if !constant_time_eq(request_thumbprint, bound_thumbprint) {
        return Err(ShrValidationError::ThumbprintMismatch {
            expected: bound_thumbprint.to_string(),
            actual: request_thumbprint.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ShrClient, ShrRequest};
    use crate::test_keys::{other_test_key, test_key};
    use crate::token::{encode_segment, ShrHeader};
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

    const NOW: i64 = 1_700_000_000;
    const URL: &str = "https://api.example.com:8443/resource";

    fn client() -> ShrClient {
        ShrClient::from_private_key(test_key().clone())
    }

    fn mint(method: &str, nonce: Option<&str>, ts: i64) -> String {
        let mut request = ShrRequest::new(URL, "AT1", ts).method(method);
        request.nonce = nonce;
        client().mint(&request).unwrap()
    }

    fn config() -> ShrValidation {
        ShrValidation {
            expected_method: Some("POST".to_string()),
            expected_authority: Some("api.example.com:8443".to_string()),
            expected_path: Some("/resource".to_string()),
            expected_access_token: Some("AT1".to_string()),
            ..ShrValidation::default()
        }
    }

    #[test]
    fn test_validate_valid_request() {
        let validated = validate_shr_at(&mint("POST", None, NOW), &config(), NOW).unwrap();

        assert_eq!(validated.thumbprint, client().thumbprint());
        assert_eq!(validated.algorithm, SigningAlgorithm::Rs256);
        assert_eq!(validated.claims.at, "AT1");
    }

    #[test]
    fn test_validate_with_nonce() {
        let config = ShrValidation {
            require_nonce: true,
            expected_nonce: Some("abc123".to_string()),
            ..config()
        };

        assert!(validate_shr_at(&mint("POST", Some("abc123"), NOW), &config, NOW).is_ok());
        assert!(matches!(
            validate_shr_at(&mint("POST", Some("wrong"), NOW), &config, NOW),
            Err(ShrValidationError::NonceMismatch)
        ));
        assert!(matches!(
            validate_shr_at(&mint("POST", None, NOW), &config, NOW),
            Err(ShrValidationError::MissingNonce)
        ));
    }

    #[test]
    fn test_reject_wrong_method() {
        let result = validate_shr_at(&mint("GET", None, NOW), &config(), NOW);
        assert!(matches!(
            result,
            Err(ShrValidationError::MethodMismatch { .. })
        ));
    }

    #[test]
    fn test_reject_wrong_authority_and_path() {
        let other_host = ShrValidation {
            expected_authority: Some("api.example.com".to_string()),
            ..config()
        };
        assert!(matches!(
            validate_shr_at(&mint("POST", None, NOW), &other_host, NOW),
            Err(ShrValidationError::AuthorityMismatch { .. })
        ));

        let other_path = ShrValidation {
            expected_path: Some("/other".to_string()),
            ..config()
        };
        assert!(matches!(
            validate_shr_at(&mint("POST", None, NOW), &other_path, NOW),
            Err(ShrValidationError::PathMismatch { .. })
        ));
    }

    #[test]
    fn test_reject_stale_and_future_timestamps() {
        assert!(matches!(
            validate_shr_at(&mint("POST", None, NOW - 61), &config(), NOW),
            Err(ShrValidationError::Expired { .. })
        ));
        assert!(matches!(
            validate_shr_at(&mint("POST", None, NOW + 6), &config(), NOW),
            Err(ShrValidationError::Expired { .. })
        ));
        assert!(validate_shr_at(&mint("POST", None, NOW + 5), &config(), NOW).is_ok());
    }

    #[test]
    fn test_reject_other_access_token() {
        let config = ShrValidation {
            expected_access_token: Some("AT2".to_string()),
            ..config()
        };
        assert!(matches!(
            validate_shr_at(&mint("POST", None, NOW), &config, NOW),
            Err(ShrValidationError::AccessTokenMismatch)
        ));
    }

    #[test]
    fn test_reject_tampered_claims() {
        let shr = mint("POST", None, NOW);
        let parts: Vec<&str> = shr.split('.').collect();

        let mut claims: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1]).unwrap()).unwrap();
        claims["at"] = "AT-stolen".into();
        let tampered = format!("{}.{}.{}", parts[0], encode_segment(&claims).unwrap(), parts[2]);

        assert!(matches!(
            validate_shr_at(&tampered, &ShrValidation::default(), NOW),
            Err(ShrValidationError::InvalidSignature)
        ));
    }

    #[test]
    fn test_reject_kid_of_other_key() {
        let shr = mint("POST", None, NOW);
        let mut decoded = decode_shr(&shr).unwrap();

        let other = ShrClient::from_private_key(other_test_key().clone());
        decoded.header.kid = other.thumbprint().to_string();

        let message = format!(
            "{}.{}",
            encode_segment(&decoded.header).unwrap(),
            encode_segment(&decoded.claims).unwrap()
        );
        let signature = SigningAlgorithm::Rs256
            .sign(test_key(), message.as_bytes())
            .unwrap();
        let forged = format!("{}.{}", message, URL_SAFE_NO_PAD.encode(signature));

        assert!(matches!(
            validate_shr_at(&forged, &ShrValidation::default(), NOW),
            Err(ShrValidationError::KidMismatch { .. })
        ));
    }

    #[test]
    fn test_reject_unsupported_header_algorithm() {
        let shr = mint("POST", None, NOW);
        let parts: Vec<&str> = shr.split('.').collect();

        for alg in ["HS256", "none", "SHA256withRSA"] {
            let header = ShrHeader {
                alg: alg.to_string(),
                kid: client().thumbprint().to_string(),
            };
            let token = format!("{}.{}.{}", encode_segment(&header).unwrap(), parts[1], parts[2]);
            assert!(
                matches!(
                    validate_shr_at(&token, &ShrValidation::default(), NOW),
                    Err(ShrValidationError::UnsupportedAlgorithm(_))
                ),
                "{alg}"
            );
        }
    }

    #[test]
    fn test_reject_malformed() {
        assert!(matches!(
            validate_shr_at("only.two", &ShrValidation::default(), NOW),
            Err(ShrValidationError::InvalidFormat)
        ));
        assert!(matches!(
            validate_shr_at("***.***.***", &ShrValidation::default(), NOW),
            Err(ShrValidationError::Base64Error)
        ));
    }

    #[test]
    fn test_verify_binding() {
        let validated = validate_shr_at(&mint("POST", None, NOW), &config(), NOW).unwrap();

        assert!(verify_binding(&validated.thumbprint, client().thumbprint()).is_ok());
        assert!(verify_binding(&validated.thumbprint, "wrong-thumbprint").is_err());
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("hello", "hello"));
        assert!(!constant_time_eq("hello", "world"));
        assert!(!constant_time_eq("hello", "hell"));
        assert!(!constant_time_eq("", "x"));
        assert!(constant_time_eq("", ""));
    }
}
