pub mod commands;
pub mod config;
pub mod errors;
pub mod logging;
pub mod models;
pub mod services;
pub mod utils;

#[cfg(test)]
mod test_support;

use std::sync::{Arc, RwLock};
use std::time::Duration;

use reqwest::Client;
use tokio::sync::mpsc;

use crate::config::LauncherConfig;
use crate::errors::Result;
use crate::models::InstallEvent;
use crate::services::platform;
use crate::services::{
    AppRuntimeService, ArchiveInstaller, Catalog, CatalogService, DownloadPipeline, IconCache,
    InstallManager, InstallStateTracker, PlatformAdapter,
};

/// Where the current catalog came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CatalogOrigin {
    Remote,
    /// Every source failed; the catalog was rebuilt from installed metadata.
    Offline,
}

#[derive(Clone)]
pub struct AppState {
    pub platform: Arc<dyn PlatformAdapter>,
    pub catalog_service: CatalogService,
    pub tracker: InstallStateTracker,
    pub installs: InstallManager,
    pub runtime: AppRuntimeService,
    pub icons: IconCache,
    catalog: Arc<RwLock<Catalog>>,
}

impl AppState {
    pub fn new(config: LauncherConfig) -> Result<(Self, mpsc::UnboundedReceiver<InstallEvent>)> {
        let catalog_client = config.http_client(Duration::from_secs(config.catalog_timeout_seconds))?;
        let download_client =
            config.http_client(Duration::from_secs(config.request_timeout_seconds))?;
        Ok(Self::assemble(
            config,
            platform::current(),
            catalog_client,
            download_client,
        ))
    }

    pub fn assemble(
        config: LauncherConfig,
        platform: Arc<dyn PlatformAdapter>,
        catalog_client: Client,
        download_client: Client,
    ) -> (Self, mpsc::UnboundedReceiver<InstallEvent>) {
        let tracker = InstallStateTracker::new(config.install_root());
        let pipeline = DownloadPipeline::with_client(download_client, config.progress_interval());
        let installer = ArchiveInstaller::new(tracker.clone(), pipeline, platform.clone());
        let (installs, events) = InstallManager::channel(installer);

        let state = Self {
            catalog_service: CatalogService::with_client(
                catalog_client.clone(),
                config.library_urls.clone(),
            ),
            icons: IconCache::with_client(catalog_client, config.cache_dir()),
            runtime: AppRuntimeService::new(tracker.clone(), platform.clone()),
            tracker,
            installs,
            platform,
            catalog: Arc::new(RwLock::new(Catalog::default())),
        };
        (state, events)
    }

    /// Removes installs interrupted by a crash or kill. Run once before anything else
    /// touches the install root.
    pub fn recover_interrupted(&self) -> Vec<String> {
        let swept = self.tracker.sweep_incomplete();
        for name in &swept {
            tracing::warn!("removed interrupted install app={}", name);
        }
        swept
    }

    /// Loads the remote catalog. When no source answers, installed apps are listed
    /// from their persisted metadata instead.
    pub async fn refresh_catalog(&self) -> CatalogOrigin {
        match self.catalog_service.load().await {
            Ok(catalog) => {
                let healed = self.tracker.heal_metadata(&catalog);
                if healed > 0 {
                    tracing::info!("rewrote metadata for {} installed apps", healed);
                }
                self.store_catalog(catalog);
                CatalogOrigin::Remote
            }
            Err(err) => {
                tracing::warn!("catalog unavailable, using local metadata: {}", err);
                self.store_catalog(Catalog::new(self.tracker.scan_local()));
                CatalogOrigin::Offline
            }
        }
    }

    pub fn catalog(&self) -> Catalog {
        match self.catalog.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn store_catalog(&self, catalog: Catalog) {
        let mut guard = match self.catalog.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = catalog;
    }
}
