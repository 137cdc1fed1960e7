//! Signed request minting

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::rngs::OsRng;
use rsa::RsaPrivateKey;

use crate::algorithm::SigningAlgorithm;
use crate::error::ShrError;
use crate::jwk::{request_confirmation, RsaPublicJwk};
use crate::target::RequestTarget;
use crate::thumbprint::{compute_thumbprint, compute_thumbprint_from_jwk};
use crate::token::{encode_segment, ShrClaims, ShrHeader};

/// A key able to sign requests
///
/// Implemented by [`ShrClient`] for in-memory keys and by key stores whose
/// private key never leaves the store.
pub trait ShrSigner {
    /// Error type of the signing backend
    type Error: From<ShrError>;

    /// Scheme used for the signature and advertised in the header
    fn algorithm(&self) -> SigningAlgorithm;

    /// Public half of the signing key
    fn public_jwk(&self) -> Result<RsaPublicJwk, Self::Error>;

    /// Sign the compact signing input
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, Self::Error>;
}

/// Properties of the outgoing HTTP request to bind
#[derive(Debug, Clone, Copy)]
pub struct ShrRequest<'a> {
    /// Absolute target URL; host[:port] and path become `u` and `p`
    pub url: &'a str,
    /// Access token embedded verbatim as `at`
    pub access_token: &'a str,
    /// Seconds since Unix epoch
    pub timestamp: i64,
    /// HTTP method (`m`), omitted when absent or empty
    pub method: Option<&'a str>,
    /// Server-provided nonce, omitted when absent or empty
    pub nonce: Option<&'a str>,
}

impl<'a> ShrRequest<'a> {
    pub fn new(url: &'a str, access_token: &'a str, timestamp: i64) -> Self {
        Self {
            url,
            access_token,
            timestamp,
            method: None,
            nonce: None,
        }
    }

    pub fn method(mut self, method: &'a str) -> Self {
        self.method = Some(method);
        self
    }

    pub fn nonce(mut self, nonce: &'a str) -> Self {
        self.nonce = Some(nonce);
        self
    }
}

/// Mint a compact signed request (`header.claims.signature`)
///
/// The header `kid` and the `cnf` claim come from the same [`ShrSigner::public_jwk`]
/// call. Empty method and nonce values are treated as absent.
pub fn mint_shr<S: ShrSigner + ?Sized>(
    signer: &S,
    request: &ShrRequest<'_>,
) -> Result<String, S::Error> {
    let target = RequestTarget::parse(request.url)?;

    let jwk = signer.public_jwk()?;
    let thumbprint = compute_thumbprint_from_jwk(&jwk)?;

    let claims = ShrClaims {
        at: request.access_token.to_string(),
        ts: request.timestamp,
        u: target.authority().to_string(),
        p: target.path().map(String::from),
        m: non_empty(request.method),
        nonce: non_empty(request.nonce),
        cnf: jwk.into(),
    };
    let header = ShrHeader {
        alg: signer.algorithm().jws_name().to_string(),
        kid: thumbprint,
    };

    let message = format!("{}.{}", encode_segment(&header)?, encode_segment(&claims)?);
    let signature = signer.sign(message.as_bytes())?;
    let sig_b64 = URL_SAFE_NO_PAD.encode(signature);

    Ok(format!("{}.{}", message, sig_b64))
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(String::from)
}

/// Signed request client holding an in-memory RSA key
///
/// # Example
///
/// ```rust
/// use oauth_shr::{ShrClient, ShrRequest};
///
/// let client = ShrClient::generate(2048)?;
/// println!("Thumbprint: {}", client.thumbprint());
///
/// let request = ShrRequest::new("https://api.example.com/resource", "access-token", 1_700_000_000)
///     .method("GET");
/// let shr = client.mint(&request)?;
/// assert_eq!(shr.split('.').count(), 3);
/// # Ok::<(), oauth_shr::ShrError>(())
/// ```
pub struct ShrClient {
    private_key: RsaPrivateKey,
    algorithm: SigningAlgorithm,
    thumbprint: String,
}

impl ShrClient {
    /// Generate a new client with a random RSA key of `bits` size
    pub fn generate(bits: usize) -> Result<Self, ShrError> {
        let private_key = RsaPrivateKey::new(&mut OsRng, bits).map_err(ShrError::KeyGeneration)?;
        Ok(Self::from_private_key(private_key))
    }

    /// Create a client from an existing private key, signing with RS256
    pub fn from_private_key(private_key: RsaPrivateKey) -> Self {
        let thumbprint = compute_thumbprint(&private_key.to_public_key());
        Self {
            private_key,
            algorithm: SigningAlgorithm::Rs256,
            thumbprint,
        }
    }

    /// Switch the signing scheme
    pub fn with_algorithm(mut self, algorithm: SigningAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// JWK thumbprint of this client's public key
    pub fn thumbprint(&self) -> &str {
        &self.thumbprint
    }

    /// Request confirmation (`reqCnf`) for this client's key
    pub fn request_confirmation(&self) -> Result<String, ShrError> {
        request_confirmation(&self.thumbprint)
    }

    /// Mint a signed request for `request`
    pub fn mint(&self, request: &ShrRequest<'_>) -> Result<String, ShrError> {
        mint_shr(self, request)
    }
}

impl ShrSigner for ShrClient {
    type Error = ShrError;

    fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }

    fn public_jwk(&self) -> Result<RsaPublicJwk, ShrError> {
        Ok(RsaPublicJwk::from_public_key(&self.private_key.to_public_key()))
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, ShrError> {
        self.algorithm.sign(&self.private_key, message)
    }
}
