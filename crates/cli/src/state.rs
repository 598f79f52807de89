use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use propalert_core::{
    connect, create_notifier, validate_config, Config, HttpRenderer, ListingExtractor, Notifier,
    Registry, SanitizedConfig, ScanRunner, SearchStore, Tracker,
};

/// Long-lived handles built from configuration.
pub struct AppState {
    config: Config,
    store: SearchStore,
    registry: Registry,
}

impl AppState {
    /// Validate `config` and open the configured store.
    pub fn new(config: Config) -> Result<Self> {
        validate_config(&config).context("Configuration validation failed")?;

        let store = connect(&config.store).context("Failed to open store")?;
        info!(backend = store.backend().name(), "Store initialized");

        let registry = Registry::new(
            store.backend().clone(),
            config.store.outstanding_key.clone(),
        );

        Ok(Self {
            config,
            store,
            registry,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn store(&self) -> &SearchStore {
        &self.store
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Wire renderer, extractor and notifier into a runner.
    pub fn runner(&self) -> Result<ScanRunner> {
        let renderer =
            HttpRenderer::new(&self.config.renderer).context("Failed to create page renderer")?;

        let notifier: Option<Arc<dyn Notifier>> = match &self.config.notifier {
            Some(notifier_config) => {
                let notifier =
                    create_notifier(notifier_config).context("Failed to create notifier")?;
                info!("Using notifier: {}", notifier.name());
                Some(notifier)
            }
            None => {
                info!("No notifier configured");
                None
            }
        };

        Ok(ScanRunner::new(
            self.registry.clone(),
            Tracker::new(self.store.clone()),
            Arc::new(renderer),
            ListingExtractor::new(self.config.renderer.listing_base_url.clone()),
            notifier,
        ))
    }

    pub async fn close(&self) -> Result<()> {
        self.store.close().await.context("Failed to close store")
    }
}
