use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use shopwise_core::catalog::CatalogSource;
use shopwise_core::config::CatalogConfig;
use shopwise_core::domain::Item;
use shopwise_core::errors::CatalogError;

use crate::mapping::{map_products, RawProduct};

const SOURCE_NAME: &str = "http";
const PRODUCTS_PATH: &str = "/products";
const CATEGORIES_PATH: &str = "/products/categories";

/// Fake-store style product API: `GET {base}/products` and
/// `GET {base}/products/categories`.
#[derive(Clone)]
pub struct HttpCatalog {
    client: Client,
    base_url: String,
    api_token: Option<SecretString>,
}

impl HttpCatalog {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, CatalogError> {
        let client = Client::builder().timeout(timeout).build().map_err(|error| {
            CatalogError::Unavailable { source_name: SOURCE_NAME, message: error.to_string() }
        })?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self { client, base_url, api_token: None })
    }

    pub fn with_api_token(mut self, token: SecretString) -> Self {
        self.api_token = Some(token);
        self
    }

    pub fn from_config(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let catalog = Self::new(&config.base_url, Duration::from_secs(config.timeout_secs))?;
        Ok(match &config.api_token {
            Some(token) => catalog.with_api_token(token.clone()),
            None => catalog,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, CatalogError> {
        let url = format!("{}{path}", self.base_url);
        let mut request = self.client.get(&url);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await.map_err(|error| {
            tracing::warn!(
                event_name = "catalog.http.request_failed",
                url = %url,
                error = %error,
                "catalog request failed"
            );
            CatalogError::Unavailable { source_name: SOURCE_NAME, message: error.to_string() }
        })?;

        if !response.status().is_success() {
            return Err(CatalogError::Unavailable {
                source_name: SOURCE_NAME,
                message: format!("GET {path} returned {}", response.status()),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|error| CatalogError::Decode(format!("GET {path}: {error}")))
    }
}

#[async_trait]
impl CatalogSource for HttpCatalog {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    async fn fetch_items(&self) -> Result<Vec<Item>, CatalogError> {
        let records: Vec<RawProduct> = self.get_json(PRODUCTS_PATH).await?;
        let items = map_products(records, SOURCE_NAME);
        tracing::debug!(
            event_name = "catalog.http.fetched",
            item_count = items.len(),
            "fetched catalog items"
        );
        Ok(items)
    }

    async fn fetch_categories(&self) -> Result<Vec<String>, CatalogError> {
        self.get_json(CATEGORIES_PATH).await
    }
}
