//! Content similarity between catalog items and the precomputed pairwise table.

use std::collections::{HashMap, HashSet};

use crate::domain::{Item, ItemId, MAX_RATING};

/// Weights of the similarity components. Category equality carries more
/// weight than any other single component.
pub const CATEGORY_WEIGHT: f64 = 0.4;
pub const PRICE_WEIGHT: f64 = 0.1;
pub const RATING_WEIGHT: f64 = 0.1;
pub const DESCRIPTION_WEIGHT: f64 = 0.2;
pub const FEATURE_TAGS_WEIGHT: f64 = 0.2;

const MIN_TOKEN_CHARS: usize = 3;

fn tokens(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_'))
        .filter(|token| token.chars().count() >= MIN_TOKEN_CHARS)
        .map(str::to_owned)
        .collect()
}

/// Jaccard similarity of the token sets of two texts. Tokens are lowercase
/// runs of word characters longer than two characters.
pub fn text_similarity(left: &str, right: &str) -> f64 {
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }

    let left = tokens(left);
    let right = tokens(right);
    let union = left.union(&right).count();
    if union == 0 {
        return 0.0;
    }

    left.intersection(&right).count() as f64 / union as f64
}

/// Weighted content similarity in `[0, 1]`. Symmetric, and exactly `1.0` for
/// an item compared with itself.
pub fn similarity(a: &Item, b: &Item) -> f64 {
    if a.id == b.id {
        return 1.0;
    }

    let category = if a.category == b.category { 1.0 } else { 0.0 };

    let max_price = a.price.max(b.price).max(f64::EPSILON);
    let price = 1.0 - (a.price - b.price).abs() / max_price;

    let rating = 1.0 - (a.rating - b.rating).abs() / MAX_RATING;

    let description = text_similarity(&a.description, &b.description);
    let feature_tags = text_similarity(&a.features.join(" "), &b.features.join(" "));

    let combined = category * CATEGORY_WEIGHT
        + price * PRICE_WEIGHT
        + rating * RATING_WEIGHT
        + description * DESCRIPTION_WEIGHT
        + feature_tags * FEATURE_TAGS_WEIGHT;

    if combined.is_finite() {
        combined.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Pairwise similarity for every item of one snapshot, stored as a dense
/// symmetric matrix.
#[derive(Clone, Debug, Default)]
pub struct SimilarityTable {
    ids: Vec<ItemId>,
    positions: HashMap<ItemId, usize>,
    scores: Vec<f64>,
}

impl SimilarityTable {
    pub fn build(items: &[Item]) -> Self {
        let n = items.len();
        let mut scores = vec![0.0; n * n];

        for i in 0..n {
            scores[i * n + i] = 1.0;
            for j in (i + 1)..n {
                let score = similarity(&items[i], &items[j]);
                scores[i * n + j] = score;
                scores[j * n + i] = score;
            }
        }

        let ids: Vec<ItemId> = items.iter().map(|item| item.id).collect();
        let positions = ids.iter().enumerate().map(|(index, id)| (*id, index)).collect();

        Self { ids, positions, scores }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.positions.contains_key(&id)
    }

    /// Cached score for a pair, or `None` when either item is not in the table.
    pub fn get(&self, a: ItemId, b: ItemId) -> Option<f64> {
        let row = *self.positions.get(&a)?;
        let column = *self.positions.get(&b)?;
        self.scores.get(row * self.ids.len() + column).copied()
    }

    /// The precomputed row for `id`, including its self-similarity.
    pub fn row(&self, id: ItemId) -> Option<Vec<(ItemId, f64)>> {
        let row = *self.positions.get(&id)?;
        let n = self.ids.len();
        let scores = &self.scores[row * n..(row + 1) * n];
        Some(self.ids.iter().copied().zip(scores.iter().copied()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::{similarity, text_similarity, SimilarityTable};
    use crate::domain::{Item, ItemId};

    fn item(id: u64, category: &str, price: f64, rating: f64, description: &str) -> Item {
        Item {
            id: ItemId(id),
            name: format!("Item {id}"),
            description: description.to_string(),
            price,
            category: category.to_string(),
            rating,
            features: vec!["Bluetooth 5.0".to_string(), "Built-in microphone".to_string()],
            image: None,
        }
    }

    fn fixtures() -> Vec<Item> {
        vec![
            item(1, "electronics", 199.99, 4.8, "Wireless headphones with noise cancellation."),
            item(2, "electronics", 79.99, 4.4, "Portable speaker with powerful sound."),
            item(3, "home", 34.99, 4.7, "Steel water bottle that keeps drinks cold."),
            item(4, "home", 0.0, 0.0, ""),
        ]
    }

    #[test]
    fn text_similarity_is_jaccard_over_long_tokens() {
        // tokens: {the, quick, fox} vs {the, lazy, fox}; "a" and "is" are dropped
        let score = text_similarity("The quick fox is a", "the LAZY fox");
        assert!((score - 0.5).abs() < 1e-12);
    }

    #[test]
    fn text_similarity_of_empty_input_is_zero() {
        assert_eq!(text_similarity("", "anything here"), 0.0);
        assert_eq!(text_similarity("an", "of"), 0.0);
    }

    #[test]
    fn self_similarity_is_exactly_one() {
        for item in fixtures() {
            assert_eq!(similarity(&item, &item), 1.0);
        }
    }

    #[test]
    fn similarity_is_bounded_and_symmetric() {
        let items = fixtures();
        for a in &items {
            for b in &items {
                let forward = similarity(a, b);
                assert!((0.0..=1.0).contains(&forward));
                assert_eq!(forward, similarity(b, a));
            }
        }
    }

    #[test]
    fn category_match_outweighs_other_components() {
        let items = fixtures();
        let same_category = similarity(&items[0], &items[1]);
        let mut lookalike = items[0].clone();
        lookalike.id = ItemId(9);
        lookalike.category = "audio".to_string();
        let different_category = similarity(&items[0], &lookalike);

        assert!(same_category > 0.4);
        assert!(different_category <= 0.6 + 1e-12);
    }

    #[test]
    fn zero_prices_count_as_identical() {
        let mut a = item(10, "home", 0.0, 3.0, "");
        a.features.clear();
        let mut b = item(11, "garden", 0.0, 3.0, "");
        b.features.clear();

        assert!((similarity(&a, &b) - 0.2).abs() < 1e-12);
    }

    #[test]
    fn table_matches_pairwise_formula() {
        let items = fixtures();
        let table = SimilarityTable::build(&items);

        assert_eq!(table.len(), items.len());
        for a in &items {
            assert_eq!(table.get(a.id, a.id), Some(1.0));
            for b in &items {
                assert_eq!(table.get(a.id, b.id), Some(similarity(a, b)));
                assert_eq!(table.get(a.id, b.id), table.get(b.id, a.id));
            }
        }
    }

    #[test]
    fn lookup_misses_for_items_outside_the_table() {
        let items = fixtures();
        let table = SimilarityTable::build(&items[..2]);
        let outsider = &items[2];

        assert!(!table.contains(outsider.id));
        assert_eq!(table.get(items[0].id, outsider.id), None);
        assert_eq!(table.row(outsider.id), None);
    }

    #[test]
    fn row_lists_every_item_in_table_order() {
        let items = fixtures();
        let table = SimilarityTable::build(&items);
        let row = table.row(ItemId(2)).unwrap_or_default();

        let ids: Vec<ItemId> = row.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![ItemId(1), ItemId(2), ItemId(3), ItemId(4)]);
        assert_eq!(row[1].1, 1.0);
    }
}
