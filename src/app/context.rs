//! Shared runtime context built once after settings are resolved.

use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use harvester_core::discovery::HttpDiscoveryConfig;
use harvester_core::{Catalog, Database, DiscoveryRegistry, HttpPageDiscovery, user_agent};

use crate::app::config::Settings;

/// Holds the settings, the open catalog and the discovery registry so
/// command handlers do not rebuild them.
pub(crate) struct AppContext {
    pub(crate) settings: Settings,
    pub(crate) catalog: Catalog,
    pub(crate) registry: Arc<DiscoveryRegistry>,
}

impl AppContext {
    /// Opens (and migrates) the catalog and registers the built-in capability.
    pub(crate) async fn open(settings: Settings) -> Result<Self> {
        if let Some(parent) = settings
            .database_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
        {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create catalog directory '{}'", parent.display())
            })?;
        }

        let db = Database::new(&settings.database_path)
            .await
            .with_context(|| {
                format!("Failed to open catalog '{}'", settings.database_path.display())
            })?;
        debug!(path = %settings.database_path.display(), "catalog opened");

        let registry = Arc::new(build_registry(&settings));

        Ok(Self {
            settings,
            catalog: Catalog::new(db),
            registry,
        })
    }

    /// Closes the catalog's connection pool.
    pub(crate) async fn close(self) {
        self.catalog.database().clone().close().await;
    }
}

fn build_registry(settings: &Settings) -> DiscoveryRegistry {
    if !settings.headless {
        debug!("`headless = false` has no effect on the http capability");
    }

    let config = HttpDiscoveryConfig {
        user_agent: settings
            .user_agent
            .clone()
            .unwrap_or_else(user_agent::default_user_agent),
        page_load_timeout: settings.page_load_timeout,
        proxy: settings.proxy.clone(),
        ..HttpDiscoveryConfig::default()
    };

    let mut registry = DiscoveryRegistry::new();
    registry.register(Arc::new(HttpPageDiscovery::new(config)));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_registry_registers_http_capability() {
        let registry = build_registry(&Settings::resolve(None, None));
        assert_eq!(registry.names(), vec!["http"]);
        assert!(registry.find_best("https://s.to/serie/x", "auto").is_some());
    }

    #[tokio::test]
    async fn test_open_creates_catalog_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("catalog.db");
        let settings = Settings::resolve(None, Some(&path));

        let ctx = AppContext::open(settings).await.unwrap();
        assert!(path.exists());
        assert_eq!(ctx.catalog.statistics().await.unwrap().total_series, 0);
        ctx.close().await;
    }
}
