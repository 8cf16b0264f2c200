//! Independent ranking strategies. Each one takes the candidate pool and
//! returns it best-first without touching shared state. All sorts are
//! stable, so equal scores keep catalog order.

use std::cmp::Ordering;

use crate::domain::{categories_overlap, CatalogSnapshot, Item, ItemId};
use crate::ml::ScoringModel;

use super::features::{extract_features, FeatureMatrix};
use super::similarity::SimilarityTable;
use super::{PREFERENCE_BONUS, RECENCY_BONUS};

pub trait RankingStrategy {
    fn name(&self) -> &'static str;

    fn rank<'a>(&self, candidates: &[&'a Item]) -> Vec<&'a Item>;
}

fn sort_by_score_desc<'a>(mut scored: Vec<(&'a Item, f64)>) -> Vec<&'a Item> {
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    scored.into_iter().map(|(item, _)| item).collect()
}

/// Model relevance plus a bonus for preferred categories and a flat recency
/// bonus.
pub struct ModelBased<'g> {
    pub model: &'g ScoringModel,
    pub snapshot: &'g CatalogSnapshot,
    pub features: &'g FeatureMatrix,
    pub preferences: &'g [String],
}

impl ModelBased<'_> {
    pub fn score(&self, item: &Item) -> f64 {
        let relevance = match self.features.row(self.snapshot, item.id) {
            Some(row) => self.model.predict(row),
            None => self.model.predict(&extract_features(item, self.snapshot.categories())),
        };
        let preference = if self
            .preferences
            .iter()
            .any(|preference| categories_overlap(&item.category, preference))
        {
            PREFERENCE_BONUS
        } else {
            0.0
        };

        relevance + preference + RECENCY_BONUS
    }
}

impl RankingStrategy for ModelBased<'_> {
    fn name(&self) -> &'static str {
        "model"
    }

    fn rank<'a>(&self, candidates: &[&'a Item]) -> Vec<&'a Item> {
        sort_by_score_desc(candidates.iter().map(|item| (*item, self.score(item))).collect())
    }
}

/// Average similarity of each candidate to the caller's acquired items.
pub struct ContentBased<'g> {
    pub similarity: &'g SimilarityTable,
    pub acquired: &'g [ItemId],
}

impl ContentBased<'_> {
    /// Acquired ids unknown to the table are skipped; `None` when none are
    /// known.
    pub fn score(&self, item: &Item) -> Option<f64> {
        let known: Vec<f64> = self
            .acquired
            .iter()
            .filter(|id| self.similarity.contains(**id))
            .map(|id| self.similarity.get(*id, item.id).unwrap_or(0.0))
            .collect();

        if known.is_empty() {
            None
        } else {
            Some(known.iter().sum::<f64>() / known.len() as f64)
        }
    }
}

impl RankingStrategy for ContentBased<'_> {
    fn name(&self) -> &'static str {
        "content"
    }

    fn rank<'a>(&self, candidates: &[&'a Item]) -> Vec<&'a Item> {
        if self.acquired.is_empty() {
            return Vec::new();
        }
        sort_by_score_desc(
            candidates.iter().map(|item| (*item, self.score(item).unwrap_or(0.0))).collect(),
        )
    }
}

/// Highest rated first.
pub struct PopularityBased;

impl RankingStrategy for PopularityBased {
    fn name(&self) -> &'static str {
        "popularity"
    }

    fn rank<'a>(&self, candidates: &[&'a Item]) -> Vec<&'a Item> {
        sort_by_score_desc(candidates.iter().map(|item| (*item, item.rating)).collect())
    }
}
