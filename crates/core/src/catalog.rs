use async_trait::async_trait;

use crate::domain::Item;
use crate::errors::CatalogError;

/// The collaborator that supplies catalog items to the recommender.
///
/// Implementations hand over fully validated [`Item`]s; mapping of external
/// record shapes happens on their side of this boundary.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Short, stable name used in logs and error messages.
    fn name(&self) -> &'static str;

    async fn fetch_items(&self) -> Result<Vec<Item>, CatalogError>;

    /// Category labels known to the source. An empty list means the engine
    /// derives categories from the items themselves.
    async fn fetch_categories(&self) -> Result<Vec<String>, CatalogError> {
        Ok(Vec::new())
    }
}

/// A fixed list of items, mostly useful for tests and for composing a
/// catalog from data that was loaded some other way.
#[derive(Clone, Debug, Default)]
pub struct InMemoryCatalog {
    items: Vec<Item>,
    categories: Vec<String>,
}

impl InMemoryCatalog {
    pub fn new(items: Vec<Item>) -> Self {
        Self { items, categories: Vec::new() }
    }

    pub fn with_categories(mut self, categories: Vec<String>) -> Self {
        self.categories = categories;
        self
    }
}

#[async_trait]
impl CatalogSource for InMemoryCatalog {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn fetch_items(&self) -> Result<Vec<Item>, CatalogError> {
        Ok(self.items.clone())
    }

    async fn fetch_categories(&self) -> Result<Vec<String>, CatalogError> {
        Ok(self.categories.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::{CatalogSource, InMemoryCatalog};
    use crate::domain::{Item, ItemId};

    #[tokio::test]
    async fn in_memory_catalog_returns_its_items_and_categories() {
        let item = Item {
            id: ItemId(1),
            name: "Mug".to_string(),
            description: "Ceramic mug".to_string(),
            price: 12.0,
            category: "home".to_string(),
            rating: 4.1,
            features: Vec::new(),
            image: None,
        };
        let catalog = InMemoryCatalog::new(vec![item.clone()])
            .with_categories(vec!["home".to_string(), "garden".to_string()]);

        assert_eq!(catalog.fetch_items().await, Ok(vec![item]));
        assert_eq!(catalog.fetch_categories().await.map(|c| c.len()), Ok(2));
        assert_eq!(catalog.name(), "memory");
    }
}
