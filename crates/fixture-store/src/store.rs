use crate::{AssetCatalog, CatalogServer, LoadStats, RefreshLoop, Result, StoreConfig, StoreError};
use std::sync::Arc;

/// A loaded catalog plus its optional refresh loop.
pub struct FixtureStore {
    catalog: Arc<AssetCatalog>,
    refresh: Option<RefreshLoop>,
    initial_load: LoadStats,
}

impl FixtureStore {
    /// Load the configured directory and start refreshing it if configured.
    ///
    /// Fails without starting anything when the initial load fails. Must be
    /// called from within a tokio runtime when refresh is enabled.
    pub async fn start(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        let catalog = Arc::new(AssetCatalog::open_dir(&config.dir));

        let loader = catalog.clone();
        let initial_load = tokio::task::spawn_blocking(move || loader.load())
            .await
            .map_err(|e| StoreError::Other(format!("join initial load: {e}")))??;

        let refresh = match config.refresh_config() {
            Some(refresh) => Some(RefreshLoop::start(catalog.clone(), refresh)?),
            None => None,
        };

        Ok(Self {
            catalog,
            refresh,
            initial_load,
        })
    }

    #[must_use]
    pub fn catalog(&self) -> &Arc<AssetCatalog> {
        &self.catalog
    }

    #[must_use]
    pub fn server(&self) -> CatalogServer {
        CatalogServer::new(self.catalog.clone())
    }

    #[must_use]
    pub fn refresh(&self) -> Option<&RefreshLoop> {
        self.refresh.as_ref()
    }

    #[must_use]
    pub fn initial_load(&self) -> &LoadStats {
        &self.initial_load
    }

    /// Stop the refresh loop, if any, and wait for it to exit.
    pub async fn shutdown(&self) -> Result<()> {
        let Some(refresh) = &self.refresh else {
            return Ok(());
        };
        refresh.shutdown().await;
        refresh.join().await
    }
}
