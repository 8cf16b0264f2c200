use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

pub const MAX_RATING: f64 = 5.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A catalog entry. Items are immutable once part of a snapshot; a catalog
/// refresh replaces them wholesale.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub category: String,
    pub rating: f64,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Item {
    /// Checks the invariants every item must hold before it may enter a
    /// snapshot.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(ValidationError::InvalidPrice { id: self.id, price: self.price });
        }
        if !self.rating.is_finite() || !(0.0..=MAX_RATING).contains(&self.rating) {
            return Err(ValidationError::InvalidRating { id: self.id, rating: self.rating });
        }
        if self.category.trim().is_empty() {
            return Err(ValidationError::MissingField { id: self.id, field: "category" });
        }
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField { id: self.id, field: "name" });
        }
        Ok(())
    }

    /// Substring match in either direction, so that hierarchical labels such
    /// as "men's clothing" and "clothing" are treated as related.
    pub fn category_matches(&self, label: &str) -> bool {
        categories_overlap(&self.category, label)
    }
}

pub fn categories_overlap(left: &str, right: &str) -> bool {
    left.contains(right) || right.contains(left)
}
