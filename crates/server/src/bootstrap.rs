use std::sync::Arc;
use std::time::Duration;

use shopwise_core::config::AppConfig;
use shopwise_core::errors::{CatalogError, EngineError};
use shopwise_core::RecommendationEngine;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, warn};

pub struct Application {
    pub config: AppConfig,
    pub engine: Arc<RecommendationEngine>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("catalog source could not be opened: {0}")]
    Catalog(#[source] CatalogError),
    #[error("initial engine build failed: {0}")]
    Engine(#[source] EngineError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        source = config.catalog.source.as_str(),
        "starting application bootstrap"
    );

    let source =
        shopwise_catalog::open_source(&config.catalog).await.map_err(BootstrapError::Catalog)?;
    let engine = Arc::new(RecommendationEngine::new(source, config.engine.clone()));

    let outcome = engine.initialize(None).await.map_err(BootstrapError::Engine)?;
    let status = engine.status();
    info!(
        event_name = "system.bootstrap.engine_ready",
        correlation_id = "bootstrap",
        outcome = outcome.as_str(),
        generation = status.generation,
        item_count = status.item_count,
        model = status.model_label(),
        "recommendation engine built"
    );

    Ok(Application { config, engine })
}

/// Reloads the catalog from the engine's source every `interval_secs`.
/// Returns `None` when periodic reload is disabled.
pub fn spawn_periodic_reload(
    engine: Arc<RecommendationEngine>,
    interval_secs: u64,
) -> Option<JoinHandle<()>> {
    if interval_secs == 0 {
        return None;
    }

    let period = Duration::from_secs(interval_secs);
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match engine.reload().await {
                Ok(outcome) => info!(
                    event_name = "system.reload.tick",
                    correlation_id = "reload",
                    outcome = outcome.as_str(),
                    generation = engine.status().generation,
                    "periodic catalog reload finished"
                ),
                Err(error) => warn!(
                    event_name = "system.reload.failed",
                    correlation_id = "reload",
                    error = %error,
                    "periodic catalog reload failed; serving previous generation"
                ),
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use shopwise_core::config::{AppConfig, CatalogSourceKind};

    use crate::bootstrap::{bootstrap_with_config, spawn_periodic_reload, BootstrapError};

    fn static_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.catalog.source = CatalogSourceKind::Static;
        config.engine.random_seed = Some(11);
        config.engine.epochs = 5;
        config
    }

    #[tokio::test]
    async fn bootstrap_builds_engine_from_static_catalog() {
        let app = bootstrap_with_config(static_config())
            .await
            .expect("bootstrap should succeed with the static catalog");

        let status = app.engine.status();
        assert!(status.is_ready());
        assert_eq!(status.generation, 1);
        assert_eq!(status.item_count, 12);
        assert_eq!(app.engine.source_name(), "static");
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_when_catalog_is_unreachable_without_fallback() {
        let mut config = static_config();
        config.catalog.source = CatalogSourceKind::Http;
        config.catalog.base_url = "http://127.0.0.1:9".to_string();
        config.catalog.timeout_secs = 2;
        config.catalog.fallback_to_static = false;

        let error = bootstrap_with_config(config).await.err().expect("bootstrap should fail");

        assert!(matches!(error, BootstrapError::Engine(_)), "unexpected error: {error}");
        assert!(error.to_string().contains("initial engine build failed"));
    }

    #[tokio::test]
    async fn bootstrap_serves_static_data_when_http_source_falls_back() {
        let mut config = static_config();
        config.catalog.source = CatalogSourceKind::Http;
        config.catalog.base_url = "http://127.0.0.1:9".to_string();
        config.catalog.timeout_secs = 2;
        config.catalog.fallback_to_static = true;

        let app = bootstrap_with_config(config).await.expect("fallback should keep bootstrap alive");

        assert_eq!(app.engine.status().item_count, 12);
        assert_eq!(app.engine.source_name(), "http");
    }

    #[tokio::test]
    async fn periodic_reload_is_disabled_for_zero_interval() {
        let app = bootstrap_with_config(static_config()).await.expect("bootstrap");

        assert!(spawn_periodic_reload(app.engine.clone(), 0).is_none());
    }

    #[tokio::test]
    async fn periodic_reload_installs_new_generations() {
        let app = bootstrap_with_config(static_config()).await.expect("bootstrap");
        let handle = spawn_periodic_reload(app.engine.clone(), 1).expect("reload task");

        let mut generation = app.engine.status().generation;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            generation = app.engine.status().generation;
            if generation >= 2 {
                break;
            }
        }
        handle.abort();

        assert!(generation >= 2, "expected a reload to install generation 2, got {generation}");
    }
}
