//! Catalog collaborators for the recommendation engine: the built-in dataset,
//! the remote product API, and the sqlite store, plus the wiring that picks
//! one from configuration.

pub mod connection;
pub mod fallback;
pub mod http;
pub mod mapping;
pub mod migrations;
pub mod static_data;
pub mod store;

use std::sync::Arc;

use shopwise_core::catalog::CatalogSource;
use shopwise_core::config::{CatalogConfig, CatalogSourceKind};
use shopwise_core::errors::CatalogError;

pub use connection::{connect, connect_with_settings, DbPool};
pub use fallback::FallbackCatalog;
pub use http::HttpCatalog;
pub use mapping::{generate_features, map_products, RawProduct, RawRating};
pub use static_data::{static_items, StaticCatalog};
pub use store::{SqlCatalogStore, StoreError};

/// Opens a migrated sqlite catalog store.
pub async fn open_store(config: &CatalogConfig) -> Result<SqlCatalogStore, StoreError> {
    let pool = connect_with_settings(
        &config.database_url,
        config.max_connections,
        config.database_timeout_secs,
    )
    .await?;
    migrations::run_pending(&pool).await?;
    Ok(SqlCatalogStore::new(pool))
}

/// Builds the configured catalog source, wrapped with the static fallback
/// when `fallback_to_static` is set.
pub async fn open_source(config: &CatalogConfig) -> Result<Arc<dyn CatalogSource>, CatalogError> {
    let primary: Arc<dyn CatalogSource> = match config.source {
        CatalogSourceKind::Static => return Ok(Arc::new(StaticCatalog)),
        CatalogSourceKind::Http => Arc::new(HttpCatalog::from_config(config)?),
        CatalogSourceKind::Sqlite => Arc::new(open_store(config).await?),
    };

    tracing::info!(
        event_name = "catalog.source.opened",
        source = primary.name(),
        fallback_to_static = config.fallback_to_static,
        "catalog source ready"
    );

    if config.fallback_to_static {
        Ok(Arc::new(FallbackCatalog::new(primary, Arc::new(StaticCatalog))))
    } else {
        Ok(primary)
    }
}
