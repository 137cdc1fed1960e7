//! # SHR - Signed HTTP Requests bound to a proof-of-possession key
//!
//! A signed HTTP request (SHR) is a compact token asserting properties of an
//! outgoing HTTP request (access token, timestamp, host, path, method, nonce)
//! and embedding the public key that signed it. Resource servers accept the
//! access token only from the holder of that key, so a captured token cannot be
//! replayed from another device.
//!
//! ## Features
//!
//! - **`server`** (default): Resource-server side validation of signed requests
//!
//! ## Quick Start
//!
//! ### Client-side: Mint a signed request
//!
//! ```rust
//! use oauth_shr::{ShrClient, ShrError, ShrRequest};
//!
//! // Create a client with a fresh RSA key
//! let client = ShrClient::generate(2048)?;
//!
//! // The thumbprint identifies the key in the `kid` header
//! println!("Thumbprint: {}", client.thumbprint());
//!
//! // Sign a request with a server-provided nonce
//! let request = ShrRequest::new("https://api.example.com/resource", "access-token", 1_700_000_000)
//!     .method("GET")
//!     .nonce("server-nonce-123");
//! let shr = client.mint(&request)?;
//! # Ok::<(), ShrError>(())
//! ```
//!
//! Keys that live in a key store implement [`ShrSigner`] and use [`mint_shr`].
//!
//! ### Server-side: Validate a signed request
//!
//! ```rust,ignore
//! use oauth_shr::{validate_shr, verify_binding, ShrValidation};
//!
//! let config = ShrValidation {
//!     expected_method: Some("GET".to_string()),
//!     expected_authority: Some("api.example.com".to_string()),
//!     expected_path: Some("/resource".to_string()),
//!     expected_access_token: Some(access_token.to_string()),
//!     ..ShrValidation::default()
//! };
//!
//! let validated = validate_shr(&shr, &config)?;
//! verify_binding(&validated.thumbprint, &bound_thumbprint)?;
//! ```
//!
//! ## Algorithm Support
//!
//! RSA only: RS256/RS384/RS512 (PKCS#1 v1.5) and PS256/PS384/PS512 (PSS).
//! Symmetric algorithms and `none` are rejected.

mod algorithm;
mod client;
mod error;
mod jwk;
#[cfg(feature = "server")]
mod server;
mod target;
#[cfg(test)]
mod test_keys;
mod thumbprint;
mod token;

pub use algorithm::SigningAlgorithm;
pub use client::{mint_shr, ShrClient, ShrRequest, ShrSigner};
pub use error::ShrError;
#[cfg(feature = "server")]
pub use error::ShrValidationError;
pub use jwk::{request_confirmation, Confirmation, RsaPublicJwk};
#[cfg(feature = "server")]
pub use server::{validate_shr, validate_shr_at, verify_binding, ShrValidation, ValidatedShr};
pub use target::RequestTarget;
pub use thumbprint::{
    compute_thumbprint, compute_thumbprint_from_components, compute_thumbprint_from_jwk,
};
pub use token::{decode_shr, DecodedShr, ShrClaims, ShrHeader};
