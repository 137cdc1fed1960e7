//! Cryptographic operations with the device key
//!
//! This module provides:
//! - Payload signing and verification
//! - Signed HTTP request minting, request confirmation and public key export

pub mod minter;
pub mod signature;

pub use minter::{PublicKeyFormat, SignedRequestMinter};
pub use signature::{SignatureService, Verification};
