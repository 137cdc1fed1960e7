//! Device key lifecycle and generation policy

pub mod lifecycle;
pub mod policy;

pub use lifecycle::{KeyIdentity, KeyPairManager};
pub use policy::GenerationPolicy;
