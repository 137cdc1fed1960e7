//! RSA signature schemes usable with a proof-of-possession key

use std::fmt;
use std::str::FromStr;

use rand::rngs::OsRng;
use rsa::{Pkcs1v15Sign, Pss, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::error::ShrError;

/// Asymmetric signature scheme applied with the device key
///
/// Parsed from either the JWS name (`RS256`) or the platform keystore name
/// (`SHA256withRSA`). Symmetric schemes and `none` are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SigningAlgorithm {
    /// RSASSA-PKCS1-v1_5 with SHA-256
    Rs256,
    /// RSASSA-PKCS1-v1_5 with SHA-384
    Rs384,
    /// RSASSA-PKCS1-v1_5 with SHA-512
    Rs512,
    /// RSASSA-PSS with SHA-256
    Ps256,
    /// RSASSA-PSS with SHA-384
    Ps384,
    /// RSASSA-PSS with SHA-512
    Ps512,
}

impl SigningAlgorithm {
    /// Every supported scheme, PKCS#1 v1.5 first
    pub const ALL: [SigningAlgorithm; 6] = [
        Self::Rs256,
        Self::Rs384,
        Self::Rs512,
        Self::Ps256,
        Self::Ps384,
        Self::Ps512,
    ];

    /// Name used in the JWS `alg` header
    pub fn jws_name(&self) -> &'static str {
        match self {
            Self::Rs256 => "RS256",
            Self::Rs384 => "RS384",
            Self::Rs512 => "RS512",
            Self::Ps256 => "PS256",
            Self::Ps384 => "PS384",
            Self::Ps512 => "PS512",
        }
    }

    /// Name used by platform keystores (`SHA256withRSA`, `SHA256withRSA/PSS`, ...)
    pub fn keystore_name(&self) -> &'static str {
        match self {
            Self::Rs256 => "SHA256withRSA",
            Self::Rs384 => "SHA384withRSA",
            Self::Rs512 => "SHA512withRSA",
            Self::Ps256 => "SHA256withRSA/PSS",
            Self::Ps384 => "SHA384withRSA/PSS",
            Self::Ps512 => "SHA512withRSA/PSS",
        }
    }

    fn is_pss(&self) -> bool {
        matches!(self, Self::Ps256 | Self::Ps384 | Self::Ps512)
    }

    fn digest(&self, message: &[u8]) -> Vec<u8> {
        match self {
            Self::Rs256 | Self::Ps256 => Sha256::digest(message).to_vec(),
            Self::Rs384 | Self::Ps384 => Sha384::digest(message).to_vec(),
            Self::Rs512 | Self::Ps512 => Sha512::digest(message).to_vec(),
        }
    }

    fn pkcs1v15(&self) -> Pkcs1v15Sign {
        match self {
            Self::Rs256 | Self::Ps256 => Pkcs1v15Sign::new::<Sha256>(),
            Self::Rs384 | Self::Ps384 => Pkcs1v15Sign::new::<Sha384>(),
            Self::Rs512 | Self::Ps512 => Pkcs1v15Sign::new::<Sha512>(),
        }
    }

    fn pss(&self) -> Pss {
        match self {
            Self::Rs256 | Self::Ps256 => Pss::new::<Sha256>(),
            Self::Rs384 | Self::Ps384 => Pss::new::<Sha384>(),
            Self::Rs512 | Self::Ps512 => Pss::new::<Sha512>(),
        }
    }

    /// Sign `message` with `key`
    pub fn sign(&self, key: &RsaPrivateKey, message: &[u8]) -> Result<Vec<u8>, ShrError> {
        let hashed = self.digest(message);
        let signature = if self.is_pss() {
            key.sign_with_rng(&mut OsRng, self.pss(), &hashed)
        } else {
            key.sign(self.pkcs1v15(), &hashed)
        };
        signature.map_err(ShrError::Signing)
    }

    /// Verify `signature` over `message`
    ///
    /// Every mismatch, including a signature of the wrong length, is reported
    /// as [`ShrError::InvalidSignature`].
    pub fn verify(
        &self,
        key: &RsaPublicKey,
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), ShrError> {
        let hashed = self.digest(message);
        let verified = if self.is_pss() {
            key.verify(self.pss(), &hashed, signature)
        } else {
            key.verify(self.pkcs1v15(), &hashed, signature)
        };
        verified.map_err(|_| ShrError::InvalidSignature)
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.jws_name())
    }
}

impl FromStr for SigningAlgorithm {
    type Err = ShrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let algorithm = match s.trim().to_ascii_uppercase().as_str() {
            "RS256" | "SHA256WITHRSA" => Self::Rs256,
            "RS384" | "SHA384WITHRSA" => Self::Rs384,
            "RS512" | "SHA512WITHRSA" => Self::Rs512,
            "PS256" | "SHA256WITHRSA/PSS" => Self::Ps256,
            "PS384" | "SHA384WITHRSA/PSS" => Self::Ps384,
            "PS512" | "SHA512WITHRSA/PSS" => Self::Ps512,
            _ => return Err(ShrError::UnsupportedAlgorithm(s.to_string())),
        };
        Ok(algorithm)
    }
}

impl TryFrom<String> for SigningAlgorithm {
    type Error = ShrError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SigningAlgorithm> for String {
    fn from(alg: SigningAlgorithm) -> Self {
        alg.jws_name().to_string()
    }
}
