//! Error types for SHR operations

use thiserror::Error;

/// Errors that can occur while building or decoding a signed request (client-side)
#[derive(Debug, Error)]
pub enum ShrError {
    /// Algorithm name is not an asymmetric RSA signature scheme
    #[error("Unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// JWK is not a usable RSA public key
    #[error("Invalid JWK: {0}")]
    InvalidJwk(String),

    /// Request URL is not absolute or has no host
    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),

    /// The RSA primitive refused to sign
    #[error("Signing error: {0}")]
    Signing(#[source] rsa::Error),

    /// The RSA primitive could not produce a key of the requested size
    #[error("Key generation error: {0}")]
    KeyGeneration(#[source] rsa::Error),

    /// Signature does not match the message and key
    #[error("Invalid signature")]
    InvalidSignature,

    /// Public key could not be DER encoded
    #[error("Key encoding error: {0}")]
    KeyEncoding(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Token is not three dot-separated segments
    #[error("Invalid token format")]
    InvalidTokenFormat,

    /// Invalid base64 encoding
    #[error("Invalid base64")]
    InvalidBase64,
}

/// Errors that can occur during SHR validation (server-side)
#[cfg(feature = "server")]
#[derive(Debug, Error)]
pub enum ShrValidationError {
    /// Token is not a valid three-segment compact token
    #[error("Invalid token format")]
    InvalidFormat,

    /// Base64 decoding error
    #[error("Base64 decode error")]
    Base64Error,

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonError(String),

    /// Header names an algorithm this crate does not verify
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The `cnf.jwk` claim is not a valid RSA public key
    #[error("Invalid confirmation key: {0}")]
    InvalidKey(String),

    /// Invalid cryptographic signature
    #[error("Invalid signature")]
    InvalidSignature,

    /// Header `kid` is not the thumbprint of the embedded key
    #[error("Key id does not match confirmation key (kid={kid}, thumbprint={thumbprint})")]
    KidMismatch {
        /// `kid` from the header
        kid: String,
        /// Thumbprint of `cnf.jwk`
        thumbprint: String,
    },

    /// Request is too old or from the future
    #[error("Signed request expired (ts={ts}, now={now})")]
    Expired {
        /// Timestamp claim from the request
        ts: i64,
        /// Current server time
        now: i64,
    },

    /// HTTP method doesn't match expected value
    #[error("Method mismatch (expected={expected}, actual={actual:?})")]
    MethodMismatch {
        /// Expected HTTP method
        expected: String,
        /// Method claimed by the request, if any
        actual: Option<String>,
    },

    /// Host and port don't match expected value
    #[error("Host mismatch (expected={expected}, actual={actual})")]
    AuthorityMismatch {
        /// Expected host[:port]
        expected: String,
        /// Host claimed by the request
        actual: String,
    },

    /// Path doesn't match expected value
    #[error("Path mismatch (expected={expected}, actual={actual:?})")]
    PathMismatch {
        /// Expected path
        expected: String,
        /// Path claimed by the request, if any
        actual: Option<String>,
    },

    /// Nonce required but not provided
    #[error("Missing nonce")]
    MissingNonce,

    /// Nonce doesn't match expected value
    #[error("Nonce mismatch")]
    NonceMismatch,

    /// Embedded access token is not the one presented to the server
    #[error("Access token mismatch")]
    AccessTokenMismatch,

    /// Thumbprint doesn't match the key the access token is bound to
    #[error("Thumbprint mismatch (expected={expected}, actual={actual})")]
    ThumbprintMismatch {
        /// Thumbprint the access token is bound to
        expected: String,
        /// Thumbprint of the request's key
        actual: String,
    },
}

#[cfg(feature = "server")]
impl From<ShrError> for ShrValidationError {
    fn from(err: ShrError) -> Self {
        match err {
            ShrError::InvalidTokenFormat => Self::InvalidFormat,
            ShrError::InvalidBase64 => Self::Base64Error,
            ShrError::Json(e) => Self::JsonError(e.to_string()),
            ShrError::UnsupportedAlgorithm(alg) => Self::UnsupportedAlgorithm(alg),
            ShrError::InvalidJwk(msg) => Self::InvalidKey(msg),
            ShrError::InvalidSignature | ShrError::Signing(_) => Self::InvalidSignature,
            ShrError::InvalidUrl(msg) | ShrError::KeyEncoding(msg) => Self::JsonError(msg),
            ShrError::KeyGeneration(e) => Self::InvalidKey(e.to_string()),
        }
    }
}
