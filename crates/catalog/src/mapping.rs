//! Mapping of fake-store style product records into validated items.

use serde::{Deserialize, Serialize};
use shopwise_core::domain::{Item, ItemId};
use shopwise_core::errors::ValidationError;

pub const DEFAULT_NAME: &str = "Product";
pub const DEFAULT_DESCRIPTION: &str = "No description available";
pub const DEFAULT_CATEGORY: &str = "uncategorized";
pub const DEFAULT_RATING: f64 = 4.0;

/// Descriptions longer than this many words contribute a phrase tag.
const PHRASE_MIN_WORDS: usize = 10;
const PHRASE_WORDS: usize = 5;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRating {
    #[serde(default)]
    pub rate: Option<f64>,
    #[serde(default)]
    pub count: Option<u64>,
}

/// A product record as served by the remote catalog API. Every field may be
/// missing; defaults are applied in [`RawProduct::into_item`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawProduct {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub rating: Option<RawRating>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

impl RawProduct {
    pub fn into_item(self) -> Result<Item, ValidationError> {
        let id = ItemId(self.id.ok_or(ValidationError::MissingId)?);
        let name = non_blank(self.title).unwrap_or_else(|| DEFAULT_NAME.to_string());
        let description =
            non_blank(self.description).unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string());
        let category = non_blank(self.category).unwrap_or_else(|| DEFAULT_CATEGORY.to_string());
        // a zero rate is treated as "not rated yet"
        let rating = self
            .rating
            .and_then(|rating| rating.rate)
            .filter(|rate| *rate != 0.0)
            .unwrap_or(DEFAULT_RATING);
        let features = generate_features(&category, &description);

        let item = Item {
            id,
            name,
            description,
            price: self.price.unwrap_or(0.0),
            category,
            rating,
            features,
            image: non_blank(self.image),
        };
        item.validate()?;
        Ok(item)
    }
}

/// Category-specific feature tags plus a five-word phrase from the middle of
/// long descriptions.
pub fn generate_features(category: &str, description: &str) -> Vec<String> {
    let base: &[&str] = match category {
        "electronics" => &["High quality components", "Energy efficient", "1-year warranty"],
        "jewelery" => &["Premium materials", "Handcrafted", "Elegant design"],
        "men's clothing" | "women's clothing" => {
            &["Comfortable fit", "Durable fabric", "Machine washable"]
        }
        _ => &["High quality", "Great value"],
    };
    let mut features: Vec<String> = base.iter().map(|tag| tag.to_string()).collect();

    let words: Vec<&str> = description.split_whitespace().collect();
    if words.len() > PHRASE_MIN_WORDS {
        let start = (words.len() - PHRASE_WORDS) / 2;
        features.push(words[start..start + PHRASE_WORDS].join(" "));
    }

    features
}

/// Maps every record, dropping the ones that fail validation.
pub fn map_products(records: Vec<RawProduct>, source_name: &'static str) -> Vec<Item> {
    let total = records.len();
    let items: Vec<Item> = records
        .into_iter()
        .filter_map(|record| match record.into_item() {
            Ok(item) => Some(item),
            Err(error) => {
                tracing::warn!(
                    event_name = "catalog.mapping.rejected",
                    source = source_name,
                    error = %error,
                    "dropping invalid catalog record"
                );
                None
            }
        })
        .collect();

    if items.len() < total {
        tracing::info!(
            event_name = "catalog.mapping.summary",
            source = source_name,
            accepted = items.len(),
            rejected = total - items.len(),
            "catalog records mapped"
        );
    }
    items
}
