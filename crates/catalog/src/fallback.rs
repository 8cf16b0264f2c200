use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use shopwise_core::catalog::CatalogSource;
use shopwise_core::domain::Item;
use shopwise_core::errors::CatalogError;

/// Serves the primary source, switching to the fallback when the primary
/// fails or returns no items. Categories come from whichever source served
/// the most recent item fetch.
pub struct FallbackCatalog {
    primary: Arc<dyn CatalogSource>,
    fallback: Arc<dyn CatalogSource>,
    serving_fallback: AtomicBool,
}

impl FallbackCatalog {
    pub fn new(primary: Arc<dyn CatalogSource>, fallback: Arc<dyn CatalogSource>) -> Self {
        Self { primary, fallback, serving_fallback: AtomicBool::new(false) }
    }

    pub fn is_serving_fallback(&self) -> bool {
        self.serving_fallback.load(Ordering::Acquire)
    }

    fn active(&self) -> &dyn CatalogSource {
        if self.is_serving_fallback() {
            self.fallback.as_ref()
        } else {
            self.primary.as_ref()
        }
    }
}

#[async_trait]
impl CatalogSource for FallbackCatalog {
    fn name(&self) -> &'static str {
        self.primary.name()
    }

    async fn fetch_items(&self) -> Result<Vec<Item>, CatalogError> {
        let reason = match self.primary.fetch_items().await {
            Ok(items) if !items.is_empty() => {
                self.serving_fallback.store(false, Ordering::Release);
                return Ok(items);
            }
            Ok(_) => "primary source returned no items".to_string(),
            Err(error) => error.to_string(),
        };

        tracing::warn!(
            event_name = "catalog.fallback.engaged",
            primary = self.primary.name(),
            fallback = self.fallback.name(),
            reason = %reason,
            "serving fallback catalog"
        );
        let items = self.fallback.fetch_items().await?;
        self.serving_fallback.store(true, Ordering::Release);
        Ok(items)
    }

    async fn fetch_categories(&self) -> Result<Vec<String>, CatalogError> {
        let active = self.active();
        match active.fetch_categories().await {
            Ok(categories) => Ok(categories),
            Err(error) => {
                tracing::warn!(
                    event_name = "catalog.fallback.categories_failed",
                    source = active.name(),
                    error = %error,
                    "category fetch failed"
                );
                Ok(Vec::new())
            }
        }
    }
}
