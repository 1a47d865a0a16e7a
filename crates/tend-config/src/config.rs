//! Vault configuration types.
//!
//! Every knob the engine and the concurrency guard honor lives here, with
//! defaults matching a fresh vault. All sections are optional in the TOML
//! file; `VaultConfig::default()` plus a root is a working setup.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration for one vault.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct VaultConfig {
    /// Root directory of the vault. Everything tracked lives underneath.
    pub root: PathBuf,

    #[serde(default)]
    pub directories: DirectoryConfig,

    #[serde(default)]
    pub promotion: PromotionConfig,

    #[serde(default)]
    pub guard: GuardConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub scan: ScanConfig,
}

impl VaultConfig {
    /// Default configuration rooted at `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }
}

/// Directory names under the vault root, one per role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryConfig {
    pub inbox: String,
    pub fleeting: String,
    pub literature: String,
    pub permanent: String,
    pub archive: String,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            inbox: "inbox".to_string(),
            fleeting: "fleeting".to_string(),
            literature: "literature".to_string(),
            permanent: "permanent".to_string(),
            archive: "archive".to_string(),
        }
    }
}

/// Promotion thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionConfig {
    /// Minimum quality score for auto-promotion. Inclusive.
    pub threshold: f64,
}

impl Default for PromotionConfig {
    fn default() -> Self {
        Self { threshold: 0.7 }
    }
}

/// Concurrency guard settings: cooldown, result cache, circuit breaker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Minimum seconds between accepted triggers for the same note.
    pub cooldown_secs: u64,
    /// How long cached enrichment results stay valid.
    pub cache_retention_secs: u64,
    /// Trigger-rate ceiling per resource; exceeding it opens the breaker.
    pub max_triggers_per_hour: u32,
    /// Error-rate ceiling in `[0, 1]` over the observation window.
    pub error_rate_threshold: f64,
    /// Minimum observed calls before the error rate is considered meaningful.
    pub min_calls_for_error_rate: u32,
    /// Seconds an open breaker waits before probing again.
    pub recovery_timeout_secs: u64,
    /// Consecutive half-open successes required to close the breaker.
    pub success_threshold: u32,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: 30,
            cache_retention_secs: 24 * 60 * 60,
            max_triggers_per_hour: 60,
            error_rate_threshold: 0.5,
            min_calls_for_error_rate: 5,
            recovery_timeout_secs: 30,
            success_threshold: 2,
        }
    }
}

impl GuardConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn cache_retention(&self) -> Duration {
        Duration::from_secs(self.cache_retention_secs)
    }

    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_secs(self.recovery_timeout_secs)
    }
}

/// Ingestion pipeline retry and retention settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum enrichment attempts per job, including the first.
    pub max_attempts: u32,
    /// Base delay for exponential backoff between attempts.
    pub initial_backoff_ms: u64,
    /// How long finished jobs are retained before garbage collection.
    pub job_retention_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 500,
            job_retention_secs: 24 * 60 * 60,
        }
    }
}

impl PipelineConfig {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn job_retention(&self) -> Duration {
        Duration::from_secs(self.job_retention_secs)
    }
}

/// Vault scanning filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// File extensions treated as notes.
    pub extensions: Vec<String>,
    /// Whether hidden files are tracked.
    pub include_hidden: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["md".to_string(), "markdown".to_string()],
            include_hidden: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_a_fresh_vault() {
        let config = VaultConfig::with_root("/vault");

        assert_eq!(config.directories.inbox, "inbox");
        assert_eq!(config.promotion.threshold, 0.7);
        assert_eq!(config.guard.cooldown_secs, 30);
        assert_eq!(config.pipeline.max_attempts, 3);
        assert_eq!(config.scan.extensions, vec!["md", "markdown"]);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: VaultConfig = toml::from_str(
            r#"
            root = "/vault"

            [promotion]
            threshold = 0.9
            "#,
        )
        .unwrap();

        assert_eq!(config.promotion.threshold, 0.9);
        assert_eq!(config.guard.cache_retention_secs, 24 * 60 * 60);
        assert_eq!(config.directories.literature, "literature");
    }
}
