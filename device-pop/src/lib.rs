//! device-pop library
//!
//! Manages a device-bound RSA key used to prove possession when presenting
//! OAuth2 access tokens, and mints signed HTTP requests with it.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use device_pop::{AsyncTaskGateway, DevicePop, MintRequest, PopConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PopConfig::load()?;
//! let pop = Arc::new(DevicePop::from_config(&config)?);
//!
//! if !pop.keys().exists() {
//!     pop.keys().generate()?;
//! }
//!
//! let gateway = AsyncTaskGateway::new(pop)?.with_timeout(config.signing.blocking_timeout());
//! let shr = gateway.mint_blocking(MintRequest::new(
//!     "https://graph.example.com/v1.0/me",
//!     "access-token",
//! ))?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod crypto;
pub mod error;
pub mod gateway;
pub mod keys;
pub mod pop;
pub mod storage;

#[cfg(test)]
mod testing;

pub use config::{ConfigError, PopConfig};
pub use crypto::{PublicKeyFormat, SignatureService, SignedRequestMinter, Verification};
pub use error::PopError;
pub use gateway::{AsyncTaskGateway, MintRequest};
pub use keys::{GenerationPolicy, KeyIdentity, KeyPairManager};
pub use pop::DevicePop;
pub use storage::{SecureKeyStore, StoreKind, KEY_ENTRY_ALIAS};
