//! Configuration loading and validation.

use crate::config::VaultConfig;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

impl VaultConfig {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: VaultConfig = toml::from_str(&content)?;
        config.validate()?;
        debug!(path = %path.display(), "loaded vault configuration");
        Ok(config)
    }

    /// Check invariants the engine relies on.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.root.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("vault root is not set".into()));
        }
        if !(0.0..=1.0).contains(&self.promotion.threshold) {
            return Err(ConfigError::Invalid(format!(
                "promotion threshold {} outside [0, 1]",
                self.promotion.threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.guard.error_rate_threshold) {
            return Err(ConfigError::Invalid(format!(
                "guard error rate threshold {} outside [0, 1]",
                self.guard.error_rate_threshold
            )));
        }
        if self.pipeline.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "pipeline max_attempts must be at least 1".into(),
            ));
        }

        let dirs = &self.directories;
        let names = [
            &dirs.inbox,
            &dirs.fleeting,
            &dirs.literature,
            &dirs.permanent,
            &dirs.archive,
        ];
        for (i, a) in names.iter().enumerate() {
            if a.is_empty() {
                return Err(ConfigError::Invalid("empty directory name".into()));
            }
            if names[i + 1..].contains(a) {
                return Err(ConfigError::Invalid(format!(
                    "directory name '{a}' is used for more than one role"
                )));
            }
        }
        Ok(())
    }
}
