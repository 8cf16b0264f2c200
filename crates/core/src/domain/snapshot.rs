use std::collections::{HashMap, HashSet};

use crate::domain::item::{Item, ItemId};

/// One immutable generation of the catalog: the items and the ordered,
/// de-duplicated category list that defines the feature schema.
#[derive(Clone, Debug, Default)]
pub struct CatalogSnapshot {
    items: Vec<Item>,
    categories: Vec<String>,
    positions: HashMap<ItemId, usize>,
}

impl CatalogSnapshot {
    /// Builds a snapshot from raw items. Items with an id already seen are
    /// dropped (first occurrence wins). Categories supplied by the catalog
    /// collaborator come first, followed by any item category they missed.
    pub fn new(items: Vec<Item>, category_hint: &[String]) -> Self {
        let mut seen = HashSet::new();
        let mut unique = Vec::with_capacity(items.len());
        for item in items {
            if seen.insert(item.id) {
                unique.push(item);
            } else {
                tracing::warn!(
                    event_name = "catalog.snapshot.duplicate_item",
                    item_id = %item.id,
                    "dropping duplicate catalog item"
                );
            }
        }

        let mut categories: Vec<String> = Vec::new();
        let hinted = category_hint.iter().map(|category| category.trim().to_string());
        let derived = unique.iter().map(|item| item.category.clone());
        for category in hinted.chain(derived) {
            if !category.is_empty() && !categories.contains(&category) {
                categories.push(category);
            }
        }

        let positions = unique.iter().enumerate().map(|(index, item)| (item.id, index)).collect();

        Self { items: unique, categories, positions }
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.positions.get(&id).map(|index| &self.items[*index])
    }

    pub fn position(&self, id: ItemId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.positions.contains_key(&id)
    }
}
