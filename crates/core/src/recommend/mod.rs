//! Hybrid Recommendation Engine
//!
//! Combines a trained relevance model, content similarity to the caller's
//! acquired items and global popularity into one ranked list. The engine owns
//! its lifecycle: every catalog refresh rebuilds features, the similarity
//! table and the model before the new generation is swapped in.

mod engine;
pub mod features;
mod fusion;
pub mod similarity;
mod strategies;
mod types;

pub use engine::RecommendationEngine;
pub use features::{extract_features, FeatureMatrix};
pub use fusion::{fuse, position_score, FusionWeights};
pub use similarity::{similarity, text_similarity, SimilarityTable};
pub use strategies::{ContentBased, ModelBased, PopularityBased, RankingStrategy};
pub use types::*;

/// Default ensemble weights
pub const DEFAULT_FUSION_WEIGHTS: FusionWeights =
    FusionWeights { model: 0.6, content: 0.3, popularity: 0.1 };

/// Added to the model score when an item matches a preferred category
pub const PREFERENCE_BONUS: f64 = 0.2;

/// Flat bonus added to every model score
pub const RECENCY_BONUS: f64 = 0.1;

/// Results returned when the caller does not ask for a specific count
pub const DEFAULT_LIMIT: usize = 4;

/// Maximum groups returned by personalized category recommendations
pub const MAX_CATEGORY_GROUPS: usize = 3;

/// Upper bound of the uniform noise added to trending scores
pub const TRENDING_NOISE: f64 = 0.2;

/// Categories that get a trending boost
pub const TRENDING_CATEGORIES: [&str; 2] = ["electronics", "clothing"];

pub const TRENDING_CATEGORY_BOOST: f64 = 0.1;

/// Boost for items priced inside the mid-range band
pub const TRENDING_PRICE_BOOST: f64 = 0.1;

/// Mid-range band as a fraction of 1000 currency units, exclusive on both ends
pub const TRENDING_PRICE_BAND: (f64, f64) = (0.2, 0.6);
