//! Shared wiring: configuration, layout, store, engine.

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tend_config::VaultConfig;
use tend_core::VaultLayout;
use tend_engine::{OrphanDetector, PromotionEngine};
use tend_store::{AtomicFileStore, VaultScanner};
use tracing::debug;

/// Everything a command needs, built once from the CLI arguments.
pub struct AppContext {
    pub config: VaultConfig,
    pub layout: Arc<VaultLayout>,
    pub store: Arc<AtomicFileStore>,
    pub engine: Arc<PromotionEngine>,
    pub detector: OrphanDetector,
}

impl AppContext {
    pub async fn build(config_path: Option<PathBuf>, vault: Option<PathBuf>) -> Result<Self> {
        let mut config = match &config_path {
            Some(path) => VaultConfig::load(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => VaultConfig::default(),
        };
        if let Some(root) = vault {
            config.root = root;
        }
        if config.root.as_os_str().is_empty() {
            bail!("no vault root configured; pass --vault or a config file");
        }
        config.validate()?;

        let layout = Arc::new(VaultLayout::from_config(&config));
        for (role, dir) in layout.tracked_dirs() {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("failed to create {role:?} directory"))?;
        }
        debug!(root = %config.root.display(), "vault opened");

        let store = Arc::new(AtomicFileStore::new(Arc::clone(&layout)));
        let scanner = VaultScanner::new((*layout).clone(), config.scan.clone());
        let engine = Arc::new(PromotionEngine::new(
            Arc::clone(&store),
            Arc::clone(&layout),
            scanner.clone(),
            config.promotion.threshold,
        ));
        let detector = OrphanDetector::new(Arc::clone(&engine), scanner);

        Ok(Self {
            config,
            layout,
            store,
            engine,
            detector,
        })
    }
}
