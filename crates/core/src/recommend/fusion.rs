//! Rank-position fusion of several best-first lists.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::domain::{Item, ItemId};

/// Weights of the three strategies in the ensemble
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionWeights {
    pub model: f64,
    pub content: f64,
    pub popularity: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        super::DEFAULT_FUSION_WEIGHTS
    }
}

/// Score earned by the item at 1-based `position` in a list of `len` items.
pub fn position_score(position: usize, len: usize, weight: f64) -> f64 {
    if len == 0 || position == 0 || position > len {
        return 0.0;
    }
    (len - position + 1) as f64 / len as f64 * weight
}

/// Merges weighted ranked lists. Every appearance of an item adds its
/// position score; the result is sorted by total score, ties keeping the
/// order in which items were first seen, and truncated to `limit`.
pub fn fuse<'a>(lists: &[(&[&'a Item], f64)], limit: usize) -> Vec<&'a Item> {
    let mut order: Vec<(&'a Item, f64)> = Vec::new();
    let mut slots: HashMap<ItemId, usize> = HashMap::new();

    for (list, weight) in lists {
        let len = list.len();
        for (index, item) in list.iter().enumerate() {
            let score = position_score(index + 1, len, *weight);
            match slots.get(&item.id) {
                Some(slot) => order[*slot].1 += score,
                None => {
                    slots.insert(item.id, order.len());
                    order.push((*item, score));
                }
            }
        }
    }

    order.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    order.into_iter().take(limit).map(|(item, _)| item).collect()
}

#[cfg(test)]
mod tests {
    use super::{fuse, position_score};
    use crate::domain::{Item, ItemId};

    fn item(id: u64) -> Item {
        Item {
            id: ItemId(id),
            name: format!("Item {id}"),
            description: String::new(),
            price: 1.0,
            category: "misc".to_string(),
            rating: 3.0,
            features: Vec::new(),
            image: None,
        }
    }

    fn ids(items: &[&Item]) -> Vec<u64> {
        items.iter().map(|item| item.id.0).collect()
    }

    #[test]
    fn position_score_is_linear_in_rank() {
        assert_eq!(position_score(1, 4, 0.6), 0.6);
        assert!((position_score(4, 4, 0.6) - 0.15).abs() < 1e-12);
        assert_eq!(position_score(1, 0, 0.6), 0.0);
        assert_eq!(position_score(5, 4, 0.6), 0.0);
    }

    #[test]
    fn fusion_sums_weighted_positions() {
        let (a, b, c) = (item(1), item(2), item(3));
        let model = [&a, &b, &c];
        let content = [&c, &b, &a];
        let popularity = [&b, &c, &a];

        // a: 0.6 + 0.1 + 1/30 ; b: 0.4 + 0.2 + 0.1 ; c: 0.2 + 0.3 + 2/30
        let fused = fuse(&[(&model[..], 0.6), (&content[..], 0.3), (&popularity[..], 0.1)], 3);
        assert_eq!(ids(&fused), vec![1, 2, 3]);
    }

    #[test]
    fn empty_lists_contribute_nothing() {
        let (a, b) = (item(1), item(2));
        let model = [&b, &a];
        let content: [&Item; 0] = [];

        let fused = fuse(&[(&model[..], 0.6), (&content[..], 0.3)], 10);
        assert_eq!(ids(&fused), vec![2, 1]);
    }

    #[test]
    fn ties_keep_accumulation_order_and_ids_stay_unique() {
        let (a, b) = (item(1), item(2));
        let first = [&a, &b];
        let second = [&b, &a];

        let fused = fuse(&[(&first[..], 0.5), (&second[..], 0.5)], 10);
        assert_eq!(ids(&fused), vec![1, 2]);
    }

    #[test]
    fn limit_truncates_result() {
        let items: Vec<Item> = (1..=5).map(item).collect();
        let list: Vec<&Item> = items.iter().collect();

        assert_eq!(fuse(&[(list.as_slice(), 1.0)], 2).len(), 2);
        assert!(fuse(&[(list.as_slice(), 1.0)], 0).is_empty());
    }
}
