//! Failure taxonomy for device key operations

use oauth_shr::ShrError;
use thiserror::Error;

use crate::storage::StoreError;

/// Errors surfaced by key lifecycle, signing and minting operations
#[derive(Debug, Error)]
pub enum PopError {
    /// The key store could not be reached or initialized
    #[error("Key store unavailable: {0}")]
    KeyStoreUnavailable(#[source] StoreError),

    /// No device key has been generated
    #[error("No device key present")]
    KeyMissing,

    /// Every generation attempt produced a key below the minimum size
    #[error("Generated key below {min_bits} bits after {attempts} attempts")]
    BadKeySize { min_bits: usize, attempts: u32 },

    #[error("Unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Signing failed: {0}")]
    SigningFailure(String),

    #[error("Thumbprint computation failed: {0}")]
    ThumbprintComputationFailure(#[source] ShrError),

    /// The stored entry cannot be opened, or the generation policy is unusable
    #[error("Key protection parameters invalid: {0}")]
    ProtectionParamsInvalid(String),

    #[error("Encoding failed: {0}")]
    EncodingFailure(String),

    /// An asynchronous operation never delivered its result
    #[error("Interrupted while waiting for result: {0}")]
    InterruptedWait(String),

    #[error("Unknown public key export format: {0}")]
    UnknownExportFormat(String),
}

impl PopError {
    /// Stable identifier for logs and callers matching on strings
    pub fn code(&self) -> &'static str {
        match self {
            Self::KeyStoreUnavailable(_) => "KEYSTORE_UNAVAILABLE",
            Self::KeyMissing => "KEY_MISSING",
            Self::BadKeySize { .. } => "BAD_KEY_SIZE",
            Self::UnsupportedAlgorithm(_) => "UNSUPPORTED_ALGORITHM",
            Self::SigningFailure(_) => "SIGNING_FAILURE",
            Self::ThumbprintComputationFailure(_) => "THUMBPRINT_COMPUTATION_FAILURE",
            Self::ProtectionParamsInvalid(_) => "PROTECTION_PARAMS_INVALID",
            Self::EncodingFailure(_) => "ENCODING_FAILURE",
            Self::InterruptedWait(_) => "INTERRUPTED_WAIT",
            Self::UnknownExportFormat(_) => "UNKNOWN_EXPORT_FORMAT",
        }
    }
}

impl From<StoreError> for PopError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => Self::KeyMissing,
            StoreError::Unrecoverable(msg) => Self::ProtectionParamsInvalid(msg),
            StoreError::Signing(msg) => Self::SigningFailure(msg),
            other => Self::KeyStoreUnavailable(other),
        }
    }
}

impl From<ShrError> for PopError {
    fn from(err: ShrError) -> Self {
        match err {
            ShrError::InvalidJwk(_) => Self::ThumbprintComputationFailure(err),
            ShrError::UnsupportedAlgorithm(alg) => Self::UnsupportedAlgorithm(alg),
            ShrError::Signing(e) => Self::SigningFailure(e.to_string()),
            ShrError::InvalidSignature => Self::SigningFailure(err.to_string()),
            other => Self::EncodingFailure(other.to_string()),
        }
    }
}
