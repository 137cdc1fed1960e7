//! Key generation policy

use serde::{Deserialize, Serialize};

use crate::error::PopError;

/// How the device key is generated and which keys are acceptable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationPolicy {
    /// Requested modulus size
    pub key_size_bits: usize,
    /// Smallest modulus size accepted from the store
    pub min_key_size_bits: usize,
    /// Total generation attempts before giving up
    pub max_attempts: u32,
    /// Ask for an isolated module first, falling back when there is none
    pub prefer_hardware_isolation: bool,
}

impl Default for GenerationPolicy {
    fn default() -> Self {
        Self {
            key_size_bits: 2048,
            min_key_size_bits: 2048,
            max_attempts: 4,
            prefer_hardware_isolation: true,
        }
    }
}

impl GenerationPolicy {
    /// Whether a key reporting `bits` satisfies the policy
    ///
    /// Negative sizes come from opaque hardware keys and are accepted.
    pub fn accepts(&self, bits: i32) -> bool {
        match usize::try_from(bits) {
            Ok(bits) => bits >= self.min_key_size_bits,
            Err(_) => true,
        }
    }

    /// Reject a policy that can never produce a usable key
    pub fn validate(&self) -> Result<(), PopError> {
        match self.problem() {
            Some(problem) => Err(PopError::ProtectionParamsInvalid(problem)),
            None => Ok(()),
        }
    }

    pub(crate) fn problem(&self) -> Option<String> {
        if self.max_attempts == 0 {
            return Some("max_attempts must be at least 1".to_string());
        }
        if self.min_key_size_bits > self.key_size_bits {
            return Some(format!(
                "min_key_size_bits ({}) exceeds key_size_bits ({})",
                self.min_key_size_bits, self.key_size_bits
            ));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = GenerationPolicy::default();
        assert_eq!(policy.key_size_bits, 2048);
        assert_eq!(policy.min_key_size_bits, 2048);
        assert_eq!(policy.max_attempts, 4);
        assert!(policy.prefer_hardware_isolation);
    }

    #[test]
    fn test_accepts() {
        let policy = GenerationPolicy::default();
        assert!(policy.accepts(2048));
        assert!(policy.accepts(4096));
        assert!(policy.accepts(-1));
        assert!(!policy.accepts(2047));
        assert!(!policy.accepts(0));
    }

    #[test]
    fn test_validate() {
        assert!(GenerationPolicy::default().validate().is_ok());

        let no_attempts = GenerationPolicy {
            max_attempts: 0,
            ..GenerationPolicy::default()
        };
        assert!(matches!(
            no_attempts.validate(),
            Err(PopError::ProtectionParamsInvalid(_))
        ));

        let unreachable_minimum = GenerationPolicy {
            min_key_size_bits: 4096,
            ..GenerationPolicy::default()
        };
        assert!(unreachable_minimum.validate().is_err());
    }
}
