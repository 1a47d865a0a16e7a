//! # Tend Configuration
//!
//! Loading and validation for the vault configuration. The configuration is
//! constructed once at startup and handed to every component explicitly;
//! there is no ambient or global lookup.

#![warn(clippy::all)]

mod config;
mod loader;

pub use config::{
    DirectoryConfig, GuardConfig, PipelineConfig, PromotionConfig, ScanConfig, VaultConfig,
};
pub use loader::{ConfigError, ConfigResult};
