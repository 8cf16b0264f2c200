use async_trait::async_trait;
use chrono::Utc;
use shopwise_core::catalog::CatalogSource;
use shopwise_core::domain::{Item, ItemId};
use shopwise_core::errors::CatalogError;
use sqlx::migrate::MigrateError;
use sqlx::{sqlite::SqliteRow, Row};
use thiserror::Error;

use crate::DbPool;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] MigrateError),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<StoreError> for CatalogError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Decode(message) => CatalogError::Decode(message),
            other => CatalogError::Storage(other.to_string()),
        }
    }
}

/// Persistent catalog in the `catalog_item` / `catalog_category` tables.
#[derive(Clone)]
pub struct SqlCatalogStore {
    pool: DbPool,
}

impl SqlCatalogStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Replaces the stored catalog in one transaction. Catalog order is kept
    /// through the `position` column.
    pub async fn replace_all(
        &self,
        items: &[Item],
        categories: &[String],
    ) -> Result<usize, StoreError> {
        let imported_at = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM catalog_item").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM catalog_category").execute(&mut *tx).await?;

        for (position, item) in items.iter().enumerate() {
            let features_json = serde_json::to_string(&item.features)
                .map_err(|error| StoreError::Decode(error.to_string()))?;
            sqlx::query(
                r#"
                INSERT INTO catalog_item (
                    id, position, name, description, price, category, rating,
                    features_json, image, imported_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(encode_id(item.id)?)
            .bind(position as i64)
            .bind(&item.name)
            .bind(&item.description)
            .bind(item.price)
            .bind(&item.category)
            .bind(item.rating)
            .bind(features_json)
            .bind(item.image.as_deref())
            .bind(&imported_at)
            .execute(&mut *tx)
            .await?;
        }

        for (position, label) in categories.iter().enumerate() {
            sqlx::query("INSERT OR IGNORE INTO catalog_category (label, position) VALUES (?, ?)")
                .bind(label)
                .bind(position as i64)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        tracing::info!(
            event_name = "catalog.store.replaced",
            item_count = items.len(),
            category_count = categories.len(),
            "catalog store replaced"
        );
        Ok(items.len())
    }

    pub async fn list(&self) -> Result<Vec<Item>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, description, price, category, rating, features_json, image
            FROM catalog_item
            ORDER BY position ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(item_from_row).collect()
    }

    pub async fn categories(&self) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query("SELECT label FROM catalog_category ORDER BY position ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(|row| row.try_get("label").map_err(StoreError::from)).collect()
    }

    pub async fn count(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query("SELECT COUNT(*) AS count FROM catalog_item")
            .fetch_one(&self.pool)
            .await?
            .try_get("count")?;
        Ok(count.max(0) as u64)
    }
}

fn encode_id(id: ItemId) -> Result<i64, StoreError> {
    i64::try_from(id.0).map_err(|_| StoreError::Decode(format!("item id {id} exceeds storage range")))
}

fn item_from_row(row: &SqliteRow) -> Result<Item, StoreError> {
    let id: i64 = row.try_get("id")?;
    let features_json: String = row.try_get("features_json")?;
    let features: Vec<String> = serde_json::from_str(&features_json)
        .map_err(|error| StoreError::Decode(format!("item {id}: features: {error}")))?;
    let id = u64::try_from(id)
        .map_err(|_| StoreError::Decode(format!("negative item id {id} in catalog store")))?;

    Ok(Item {
        id: ItemId(id),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        price: row.try_get("price")?,
        category: row.try_get("category")?,
        rating: row.try_get("rating")?,
        features,
        image: row.try_get("image")?,
    })
}

#[async_trait]
impl CatalogSource for SqlCatalogStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn fetch_items(&self) -> Result<Vec<Item>, CatalogError> {
        Ok(self.list().await?)
    }

    async fn fetch_categories(&self) -> Result<Vec<String>, CatalogError> {
        Ok(self.categories().await?)
    }
}
