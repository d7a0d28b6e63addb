//! Application state shared across all handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::catalog::{CatalogManifest, CatalogService, Loader, default_manifest};
use crate::config::Config;

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Catalog service.
    catalogs: Arc<CatalogService>,
}

impl AppState {
    /// Build the catalog service from configuration and load every catalog.
    pub async fn new(config: &Config) -> Result<Self> {
        let manifest = match &config.catalogs_file {
            Some(path) => CatalogManifest::from_file(path).await?,
            None => default_manifest(),
        };

        let loader = Loader::new(config.data_dir.clone(), config.fetch_timeout)
            .context("failed to build HTTP client")?;
        let catalogs = CatalogService::from_manifest(&manifest, loader, config.max_page_size)
            .context("failed to register catalogs")?;

        let loaded = catalogs.load_all().await;
        info!(
            catalogs = catalogs.len(),
            loaded,
            data_dir = %config.data_dir.display(),
            "Catalog service initialized"
        );

        Ok(Self::from_service(catalogs))
    }

    /// Wrap an already populated catalog service.
    pub fn from_service(catalogs: Arc<CatalogService>) -> Self {
        Self {
            inner: Arc::new(AppStateInner { catalogs }),
        }
    }

    /// Get the catalog service.
    pub fn catalogs(&self) -> &Arc<CatalogService> {
        &self.inner.catalogs
    }
}
