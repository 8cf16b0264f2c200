//! Feature extraction: one catalog item becomes a fixed-length numeric vector.
//!
//! Layout: `[price, rating, description, name, feature_richness, categories..]`
//! with one slot per snapshot category. Every slot lies in `[0, 1]`.

use crate::domain::{CatalogSnapshot, Item, ItemId, MAX_RATING};

/// Number of leading numeric components before the category slots.
pub const NUMERIC_FEATURES: usize = 5;

const PRICE_LOG_BASE: f64 = 1001.0;
const DESCRIPTION_WORDS_CAP: f64 = 100.0;
const NAME_CHARS_CAP: f64 = 50.0;
const FEATURE_TAGS_CAP: f64 = 10.0;

pub fn feature_len(categories: &[String]) -> usize {
    NUMERIC_FEATURES + categories.len()
}

/// Feature vector for `item`, or `None` when any component is not finite.
/// Components are checked before capping since `f64::min` discards NaN.
fn finite_components(item: &Item, categories: &[String]) -> Option<Vec<f64>> {
    let numeric = [
        (item.price + 1.0).ln() / PRICE_LOG_BASE.ln(),
        item.rating / MAX_RATING,
        item.description.split(' ').count() as f64 / DESCRIPTION_WORDS_CAP,
        item.name.chars().count() as f64 / NAME_CHARS_CAP,
        item.features.len() as f64 / FEATURE_TAGS_CAP,
    ];
    if numeric.iter().any(|value| !value.is_finite()) {
        return None;
    }

    let mut vector = Vec::with_capacity(feature_len(categories));
    vector.extend(numeric.iter().map(|value| value.min(1.0)));
    vector.extend(
        categories.iter().map(|category| if item.category_matches(category) { 1.0 } else { 0.0 }),
    );
    Some(vector)
}

fn zero_vector(item: &Item, categories: &[String]) -> Vec<f64> {
    tracing::warn!(
        event_name = "engine.features.degenerate",
        item_id = %item.id,
        "feature extraction produced non-finite values; using zero vector"
    );
    vec![0.0; feature_len(categories)]
}

/// Extracts the feature vector for `item`. Never fails: if any component is
/// not finite the all-zero vector of the correct length is returned instead.
pub fn extract_features(item: &Item, categories: &[String]) -> Vec<f64> {
    finite_components(item, categories).unwrap_or_else(|| zero_vector(item, categories))
}

/// Feature vectors for every item of one snapshot, in snapshot order.
#[derive(Clone, Debug, Default)]
pub struct FeatureMatrix {
    rows: Vec<Vec<f64>>,
    width: usize,
    degenerate_rows: usize,
}

impl FeatureMatrix {
    pub fn from_snapshot(snapshot: &CatalogSnapshot) -> Self {
        let categories = snapshot.categories();
        let mut degenerate_rows = 0;
        let rows = snapshot
            .items()
            .iter()
            .map(|item| {
                finite_components(item, categories).unwrap_or_else(|| {
                    degenerate_rows += 1;
                    zero_vector(item, categories)
                })
            })
            .collect();
        Self { rows, width: feature_len(categories), degenerate_rows }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Rows that had a non-finite component and were replaced by zeros.
    pub fn degenerate_rows(&self) -> usize {
        self.degenerate_rows
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn row(&self, snapshot: &CatalogSnapshot, id: ItemId) -> Option<&[f64]> {
        snapshot.position(id).and_then(|index| self.rows.get(index)).map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::{extract_features, feature_len, FeatureMatrix, NUMERIC_FEATURES};
    use crate::domain::{CatalogSnapshot, Item, ItemId};

    fn headphones() -> Item {
        Item {
            id: ItemId(1),
            name: "Premium Wireless Headphones".to_string(),
            description: "Immerse yourself in crystal-clear sound".to_string(),
            price: 199.99,
            category: "electronics".to_string(),
            rating: 4.8,
            features: vec!["Noise cancellation".to_string(), "Bluetooth 5.0".to_string()],
            image: None,
        }
    }

    fn categories() -> Vec<String> {
        vec!["electronics".to_string(), "home".to_string(), "men's clothing".to_string()]
    }

    #[test]
    fn vector_length_tracks_category_count() {
        let vector = extract_features(&headphones(), &categories());
        assert_eq!(vector.len(), NUMERIC_FEATURES + 3);
        assert_eq!(feature_len(&categories()), vector.len());
    }

    #[test]
    fn numeric_components_follow_the_documented_formulas() {
        let vector = extract_features(&headphones(), &categories());

        let expected_price = (200.99_f64).ln() / (1001.0_f64).ln();
        assert!((vector[0] - expected_price).abs() < 1e-12);
        assert!((vector[1] - 0.96).abs() < 1e-12);
        assert!((vector[2] - 0.05).abs() < 1e-12);
        assert!((vector[3] - 27.0 / 50.0).abs() < 1e-12);
        assert!((vector[4] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn components_are_capped_at_one() {
        let mut item = headphones();
        item.price = 50_000.0;
        item.name = "x".repeat(80);
        item.features = (0..25).map(|index| format!("tag {index}")).collect();
        let vector = extract_features(&item, &categories());

        assert_eq!(vector[0], 1.0);
        assert_eq!(vector[3], 1.0);
        assert_eq!(vector[4], 1.0);
    }

    #[test]
    fn category_slots_use_bidirectional_substring_match() {
        let mut item = headphones();
        item.category = "clothing".to_string();
        let vector = extract_features(&item, &categories());

        assert_eq!(&vector[NUMERIC_FEATURES..], &[0.0, 0.0, 1.0]);
    }

    #[test]
    fn non_finite_input_yields_zero_vector_of_correct_length() {
        let mut item = headphones();
        item.rating = f64::NAN;
        let vector = extract_features(&item, &categories());

        assert_eq!(vector.len(), feature_len(&categories()));
        assert!(vector.iter().all(|value| *value == 0.0));
    }

    #[test]
    fn matrix_rows_follow_snapshot_order() {
        let mut lamp = headphones();
        lamp.id = ItemId(2);
        lamp.category = "home".to_string();
        let snapshot = CatalogSnapshot::new(vec![headphones(), lamp], &[]);
        let matrix = FeatureMatrix::from_snapshot(&snapshot);

        assert_eq!(matrix.width(), NUMERIC_FEATURES + 2);
        assert_eq!(matrix.rows().len(), 2);
        let row = matrix.row(&snapshot, ItemId(2)).unwrap_or_default();
        assert_eq!(&row[NUMERIC_FEATURES..], &[0.0, 1.0]);
        assert_eq!(matrix.degenerate_rows(), 0);
    }

    #[test]
    fn matrix_counts_rows_zeroed_for_non_finite_input() {
        let mut lamp = headphones();
        lamp.id = ItemId(2);
        lamp.price = f64::NAN;
        let mut mug = headphones();
        mug.id = ItemId(3);
        mug.price = -5.0;
        let snapshot = CatalogSnapshot::new(vec![headphones(), lamp, mug], &[]);
        let matrix = FeatureMatrix::from_snapshot(&snapshot);

        assert_eq!(matrix.degenerate_rows(), 2);
        let row = matrix.row(&snapshot, ItemId(2)).unwrap_or_default();
        assert!(row.iter().all(|value| *value == 0.0));
        assert_eq!(row.len(), matrix.width());
    }
}
