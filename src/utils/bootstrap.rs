//! Bootstrap utilities for processes embedding the catalog.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{CatalogConfig, LOG_ENV_VAR};
use crate::error::Result;
use crate::interfaces::CatalogStore;
use crate::registry::Snapshots;

/// Install a subscriber for the catalog's registry, holder and reclamation
/// events, filtered by `VELLUM_LOG` (default `info`).
///
/// Hosts that already installed a global subscriber keep theirs; returns
/// whether this call installed one.
pub fn init_tracing() -> bool {
    let filter = tracing_subscriber::EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}

/// Load configuration and build a registry over `store`.
pub async fn open_catalog(
    store: Arc<dyn CatalogStore>,
    config_path: Option<&str>,
) -> Result<Snapshots> {
    let config = CatalogConfig::load(config_path)?;
    info!(
        num_versions = config.num_versions,
        preload = config.preload,
        "Opening catalog"
    );
    Snapshots::new(store, config).await
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serial_test::serial;

    use super::*;
    use crate::config::CONFIG_ENV_VAR;
    use crate::test_utils::CatalogFixture;

    #[tokio::test]
    #[serial]
    async fn test_open_catalog_applies_config_file() {
        std::env::remove_var(CONFIG_ENV_VAR);
        let fixture = CatalogFixture::new("products").await.unwrap();
        fixture.add_partition("p1").await.unwrap();
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(b"num_versions: 2\n").unwrap();

        let snapshots = open_catalog(fixture.store.clone(), file.path().to_str())
            .await
            .unwrap();

        assert_eq!(snapshots.config().num_versions, 2);
        let holder = snapshots.get_holder(fixture.collection_id()).await.unwrap();
        assert_eq!(holder.len(), 2);
        snapshots.shutdown().await;
    }

    #[test]
    #[serial]
    fn test_init_tracing_keeps_existing_subscriber() {
        init_tracing();

        assert!(!init_tracing());
    }
}
