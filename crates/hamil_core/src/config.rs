//! # Storage Configuration
//!
//! Sizing and reclamation knobs for the storage core, loaded once at startup.
//!
//! ```toml
//! initial_hash_size = 2048
//! initial_components = 512
//! compaction_threshold = 0.25
//! ```
//!
//! Omitted keys keep their defaults.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::util::hash_index::{INITIAL_HASH_GRANULARITY, INITIAL_HASH_SIZE};

/// Dead fraction above which a column is compacted.
pub const DEFAULT_COMPACTION_THRESHOLD: f32 = 0.3;

/// Sizing configuration for component and entity storage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Hash buckets per component column (power of two).
    pub initial_hash_size: usize,
    /// Rows reserved per component column.
    pub initial_components: usize,
    /// Entities reserved in the liveness index (power of two).
    pub initial_entities: usize,
    /// Chain growth granularity for every hash index.
    pub hash_granularity: usize,
    /// Dead fraction in `(0, 1)` that triggers compaction.
    pub compaction_threshold: f32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            initial_hash_size: INITIAL_HASH_SIZE,
            initial_components: 512,
            initial_entities: 1024,
            hash_granularity: INITIAL_HASH_GRANULARITY,
            compaction_threshold: DEFAULT_COMPACTION_THRESHOLD,
        }
    }
}

impl StorageConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed TOML and
    /// [`ConfigError::Invalid`] when a value is out of range.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every value is within range.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> ConfigResult<()> {
        if !self.initial_hash_size.is_power_of_two() {
            return Err(ConfigError::Invalid(format!(
                "initial_hash_size must be a power of 2, got {}",
                self.initial_hash_size
            )));
        }
        if !self.initial_entities.is_power_of_two() {
            return Err(ConfigError::Invalid(format!(
                "initial_entities must be a power of 2, got {}",
                self.initial_entities
            )));
        }
        if self.hash_granularity == 0 {
            return Err(ConfigError::Invalid("hash_granularity must be non-zero".into()));
        }
        if !(self.compaction_threshold > 0.0 && self.compaction_threshold < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "compaction_threshold must be in (0, 1), got {}",
                self.compaction_threshold
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = StorageConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.initial_hash_size, 1024);
        assert!((config.compaction_threshold - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn test_partial_toml() {
        let config = StorageConfig::from_toml_str(
            "initial_hash_size = 2048\ncompaction_threshold = 0.25\n",
        )
        .unwrap();
        assert_eq!(config.initial_hash_size, 2048);
        assert_eq!(config.initial_components, 512);
        assert!((config.compaction_threshold - 0.25).abs() < f32::EPSILON);
    }

    #[test]
    fn test_rejects_bad_values() {
        let err = StorageConfig::from_toml_str("initial_hash_size = 1000").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = StorageConfig::from_toml_str("compaction_threshold = 1.5").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = StorageConfig::from_toml_str("initial_hash_size = \"big\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
