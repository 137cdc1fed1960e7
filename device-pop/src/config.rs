//! Configuration management for the device key

use oauth_shr::SigningAlgorithm;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::keys::GenerationPolicy;
use crate::storage::StoreKind;

/// Device key configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PopConfig {
    /// Backend holding the key
    #[serde(default)]
    pub store: StoreKind,

    /// Directory for the file store (defaults to the per-user data directory)
    #[serde(default)]
    pub key_dir: Option<PathBuf>,

    /// Key generation policy
    #[serde(default)]
    pub key: GenerationPolicy,

    /// Signing settings
    #[serde(default)]
    pub signing: SigningConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningConfig {
    /// Scheme for signed requests
    #[serde(default = "default_algorithm")]
    pub algorithm: SigningAlgorithm,

    /// How long blocking callers wait for a result
    #[serde(default = "default_blocking_timeout_secs")]
    pub blocking_timeout_secs: u64,
}

fn default_algorithm() -> SigningAlgorithm {
    SigningAlgorithm::Rs256
}

fn default_blocking_timeout_secs() -> u64 {
    30
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            algorithm: default_algorithm(),
            blocking_timeout_secs: default_blocking_timeout_secs(),
        }
    }
}

impl SigningConfig {
    pub fn blocking_timeout(&self) -> Duration {
        Duration::from_secs(self.blocking_timeout_secs)
    }
}

impl PopConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build configuration from a variable lookup, defaulting anything unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(store) = lookup("DEVICE_POP_STORE") {
            config.store = parse_var("DEVICE_POP_STORE", &store)?;
        }
        if let Some(dir) = lookup("DEVICE_POP_KEY_DIR") {
            config.key_dir = Some(PathBuf::from(dir));
        }
        if let Some(alg) = lookup("DEVICE_POP_SIGNING_ALG") {
            config.signing.algorithm = parse_var("DEVICE_POP_SIGNING_ALG", &alg)?;
        }
        if let Some(prefer) = lookup("DEVICE_POP_PREFER_ISOLATION") {
            config.key.prefer_hardware_isolation =
                parse_var("DEVICE_POP_PREFER_ISOLATION", &prefer)?;
        }
        if let Some(timeout) = lookup("DEVICE_POP_TIMEOUT_SECS") {
            config.signing.blocking_timeout_secs =
                parse_var("DEVICE_POP_TIMEOUT_SECS", &timeout)?;
        }

        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("~/.config"));
        config_dir.join("device-pop").join("config.yaml")
    }

    /// Load from default locations (file first, then env) and validate
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path();

        let config = if config_path.exists() {
            Self::from_file(&config_path)?
        } else {
            Self::from_env()?
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that can never produce a usable key
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(problem) = self.key.problem() {
            return Err(ConfigError::Invalid(problem));
        }
        if self.signing.blocking_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "blocking_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        var: var.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?}")]
    InvalidValue { var: String, value: String },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_config_from_yaml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        std::fs::write(
            &config_path,
            r#"
store: keyring
key:
  key_size_bits: 4096
  max_attempts: 2
  prefer_hardware_isolation: false
signing:
  algorithm: SHA384withRSA/PSS
  blocking_timeout_secs: 5
"#,
        )
        .unwrap();

        let config = PopConfig::from_file(&config_path).unwrap();

        assert_eq!(config.store, StoreKind::Keyring);
        assert_eq!(config.key.key_size_bits, 4096);
        assert_eq!(config.key.min_key_size_bits, 2048);
        assert_eq!(config.key.max_attempts, 2);
        assert!(!config.key.prefer_hardware_isolation);
        assert_eq!(config.signing.algorithm, SigningAlgorithm::Ps384);
        assert_eq!(config.signing.blocking_timeout(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        std::fs::write(&config_path, "key_dir: /var/lib/device-pop\n").unwrap();

        let config = PopConfig::from_file(&config_path).unwrap();

        assert_eq!(config.store, StoreKind::File);
        assert_eq!(config.key_dir, Some(PathBuf::from("/var/lib/device-pop")));
        assert_eq!(config.key, GenerationPolicy::default());
        assert_eq!(config.signing.algorithm, SigningAlgorithm::Rs256);
        assert_eq!(config.signing.blocking_timeout_secs, 30);
    }

    #[test]
    fn test_config_rejects_symmetric_algorithm() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        std::fs::write(&config_path, "signing:\n  algorithm: HS256\n").unwrap();

        assert!(matches!(
            PopConfig::from_file(&config_path),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn test_config_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("DEVICE_POP_STORE", "memory"),
            ("DEVICE_POP_KEY_DIR", "/tmp/keys"),
            ("DEVICE_POP_SIGNING_ALG", "PS256"),
            ("DEVICE_POP_PREFER_ISOLATION", "false"),
            ("DEVICE_POP_TIMEOUT_SECS", "7"),
        ]
        .into_iter()
        .collect();

        let config = PopConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(config.store, StoreKind::Memory);
        assert_eq!(config.key_dir, Some(PathBuf::from("/tmp/keys")));
        assert_eq!(config.signing.algorithm, SigningAlgorithm::Ps256);
        assert!(!config.key.prefer_hardware_isolation);
        assert_eq!(config.signing.blocking_timeout_secs, 7);
    }

    #[test]
    fn test_config_from_lookup_invalid_value() {
        let result = PopConfig::from_lookup(|k| {
            (k == "DEVICE_POP_TIMEOUT_SECS").then(|| "soon".to_string())
        });
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref var, .. }) if var == "DEVICE_POP_TIMEOUT_SECS"
        ));
    }

    #[test]
    fn test_validate() {
        assert!(PopConfig::default().validate().is_ok());

        let mut config = PopConfig::default();
        config.key.min_key_size_bits = 4096;
        assert!(config.validate().is_err());

        let mut config = PopConfig::default();
        config.key.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = PopConfig::default();
        config.signing.blocking_timeout_secs = 0;
        assert!(config.validate().is_err());
    }
}
