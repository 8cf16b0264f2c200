//! Recommendation engine lifecycle and query surface.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Instant;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore, SeedableRng};
use tokio::sync::OwnedMutexGuard;

use crate::catalog::CatalogSource;
use crate::config::EngineConfig;
use crate::domain::{categories_overlap, CatalogSnapshot, Item, ItemId, MAX_RATING};
use crate::errors::{DomainError, EngineError};
use crate::ml::{ModelError, ScoringModel, TrainingConfig};

use super::features::FeatureMatrix;
use super::fusion::{fuse, FusionWeights};
use super::similarity::{similarity, SimilarityTable};
use super::strategies::{ContentBased, ModelBased, PopularityBased, RankingStrategy};
use super::types::{
    BuildReport, CategoryRecommendations, EngineState, EngineStatus, RecommendationRequest,
    RefreshOutcome,
};
use super::{
    MAX_CATEGORY_GROUPS, TRENDING_CATEGORIES, TRENDING_CATEGORY_BOOST, TRENDING_NOISE,
    TRENDING_PRICE_BAND, TRENDING_PRICE_BOOST,
};

/// One complete, immutable build: snapshot plus everything derived from it.
struct Generation {
    /// 0 marks the provisional generation: the first catalog, nothing derived.
    id: u64,
    snapshot: CatalogSnapshot,
    features: FeatureMatrix,
    similarity: SimilarityTable,
    model: Option<ScoringModel>,
    built_at: Option<DateTime<Utc>>,
}

impl Generation {
    fn provisional(snapshot: CatalogSnapshot) -> Self {
        Self {
            id: 0,
            snapshot,
            features: FeatureMatrix::default(),
            similarity: SimilarityTable::default(),
            model: None,
            built_at: None,
        }
    }
}

struct BuiltGeneration {
    generation: Generation,
    model_error: Option<ModelError>,
}

struct PendingCatalog {
    items: Vec<Item>,
    categories: Vec<String>,
}

#[derive(Clone)]
struct StatusInner {
    state: EngineState,
    generation: u64,
    last_error: Option<EngineError>,
    last_build_started_at: Option<DateTime<Utc>>,
    last_build_duration_ms: Option<u64>,
}

/// State shared between the engine handle and its detached build task.
struct Shared {
    source: Arc<dyn CatalogSource>,
    config: EngineConfig,
    live: RwLock<Option<Arc<Generation>>>,
    status: Mutex<StatusInner>,
    build_lock: Arc<tokio::sync::Mutex<()>>,
    pending: Mutex<Option<PendingCatalog>>,
    rng: Mutex<Box<dyn RngCore + Send>>,
}

pub struct RecommendationEngine {
    shared: Arc<Shared>,
    weights: FusionWeights,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn sort_desc<'a>(scored: &mut [(&'a Item, f64)]) {
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
}

fn take_cloned<'a>(items: impl IntoIterator<Item = &'a Item>, limit: usize) -> Vec<Item> {
    items.into_iter().take(limit).cloned().collect()
}

fn elapsed_ms(timer: Instant) -> u64 {
    u64::try_from(timer.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Trending score for one item given its noise draw from `[0, TRENDING_NOISE)`.
pub fn trending_score(item: &Item, noise: f64) -> f64 {
    let category = if TRENDING_CATEGORIES.contains(&item.category.as_str()) {
        TRENDING_CATEGORY_BOOST
    } else {
        0.0
    };
    let band = item.price / 1000.0;
    let price = if band > TRENDING_PRICE_BAND.0 && band < TRENDING_PRICE_BAND.1 {
        TRENDING_PRICE_BOOST
    } else {
        0.0
    };

    item.rating / MAX_RATING + noise + category + price
}

fn build_generation(
    snapshot: CatalogSnapshot,
    id: u64,
    training: &TrainingConfig,
) -> Result<BuiltGeneration, EngineError> {
    if snapshot.is_empty() {
        return Err(EngineError::EmptyCatalog);
    }

    let features = FeatureMatrix::from_snapshot(&snapshot);
    let labels: Vec<f64> = snapshot.items().iter().map(|item| item.rating / MAX_RATING).collect();
    tracing::debug!(
        event_name = "engine.features.extracted",
        generation = id,
        rows = features.rows().len(),
        width = features.width(),
        "feature matrix extracted"
    );

    let feature_rows = features.degenerate_rows();
    let label_rows = labels.iter().filter(|label| !label.is_finite()).count();
    if feature_rows > 0 || label_rows > 0 {
        return Err(EngineError::NonFiniteTrainingData { feature_rows, label_rows });
    }
    let labels: Vec<f64> = labels.into_iter().map(|label| label.min(1.0)).collect();

    let similarity = SimilarityTable::build(snapshot.items());
    let (model, model_error) = match ScoringModel::train(features.rows(), &labels, training) {
        Ok(model) => (Some(model), None),
        Err(error) => (None, Some(error)),
    };

    Ok(BuiltGeneration {
        generation: Generation {
            id,
            snapshot,
            features,
            similarity,
            model,
            built_at: Some(Utc::now()),
        },
        model_error,
    })
}

impl Shared {
    fn take_pending(&self) -> Option<PendingCatalog> {
        lock(&self.pending).take()
    }

    fn has_pending(&self) -> bool {
        lock(&self.pending).is_some()
    }

    fn next_seed(&self) -> u64 {
        match self.config.random_seed {
            Some(seed) => seed,
            None => lock(&self.rng).next_u64(),
        }
    }

    fn current(&self) -> Option<Arc<Generation>> {
        self.live.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn is_building(&self) -> bool {
        lock(&self.status).state == EngineState::Building
    }

    /// Builds pending catalogs until none is left. Runs on its own task, so
    /// the build finishes even when the caller that started it goes away.
    async fn drain(
        self: Arc<Self>,
        mut guard: OwnedMutexGuard<()>,
    ) -> Result<RefreshOutcome, EngineError> {
        let mut outcome = Ok(RefreshOutcome::Queued);
        loop {
            while let Some(next) = self.take_pending() {
                outcome = self.run_build(next).await;
            }
            drop(guard);

            // a catalog queued after the last take but before the unlock
            if !self.has_pending() {
                break;
            }
            match Arc::clone(&self.build_lock).try_lock_owned() {
                Ok(next) => guard = next,
                Err(_) => break,
            }
        }

        outcome
    }

    async fn run_build(&self, catalog: PendingCatalog) -> Result<RefreshOutcome, EngineError> {
        let timer = Instant::now();
        let next_id = {
            let mut status = lock(&self.status);
            status.state = EngineState::Building;
            status.last_build_started_at = Some(Utc::now());
            status.generation + 1
        };

        tracing::info!(
            event_name = "engine.build.start",
            generation = next_id,
            item_count = catalog.items.len(),
            "building recommendation generation"
        );

        let snapshot = CatalogSnapshot::new(catalog.items, &catalog.categories);
        if snapshot.is_empty() {
            return Err(self.fail_build(EngineError::EmptyCatalog, timer));
        }
        self.install_provisional(&snapshot);

        let training = self.config.training(self.next_seed());
        let built = tokio::task::spawn_blocking(move || build_generation(snapshot, next_id, &training))
            .await
            .map_err(|error| EngineError::BuildTask(error.to_string()))
            .and_then(std::convert::identity);

        match built {
            Ok(built) => Ok(RefreshOutcome::Applied(self.install(built, timer))),
            Err(error) => Err(self.fail_build(error, timer)),
        }
    }

    /// Serves the rating fallback while the very first build runs, and after
    /// it if that build fails.
    fn install_provisional(&self, snapshot: &CatalogSnapshot) {
        let mut live = self.live.write().unwrap_or_else(PoisonError::into_inner);
        if live.is_none() {
            *live = Some(Arc::new(Generation::provisional(snapshot.clone())));
        }
    }

    fn install(&self, built: BuiltGeneration, timer: Instant) -> BuildReport {
        let duration_ms = elapsed_ms(timer);
        let generation = built.generation;
        let report = BuildReport {
            generation: generation.id,
            item_count: generation.snapshot.len(),
            category_count: generation.snapshot.categories().len(),
            model: generation.model.as_ref().map(ScoringModel::kind),
            model_error: built.model_error.clone(),
            duration_ms,
        };

        *self.live.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(generation));
        {
            let mut status = lock(&self.status);
            status.state = EngineState::Ready;
            status.generation = report.generation;
            status.last_error = built.model_error.map(EngineError::Model);
            status.last_build_duration_ms = Some(duration_ms);
        }

        tracing::info!(
            event_name = "engine.build.complete",
            generation = report.generation,
            item_count = report.item_count,
            category_count = report.category_count,
            model = report.model.as_ref().map_or("absent", |kind| kind.as_str()),
            duration_ms,
            "recommendation generation installed"
        );
        if let Some(error) = &report.model_error {
            tracing::warn!(
                event_name = "engine.model.absent",
                generation = report.generation,
                error = %error,
                "no scoring model; ranking by popularity"
            );
        }

        report
    }

    /// The live generation is left in place, including a provisional one.
    fn fail_build(&self, error: EngineError, timer: Instant) -> EngineError {
        let generation = {
            let mut status = lock(&self.status);
            status.state = EngineState::Ready;
            status.last_error = Some(error.clone());
            status.last_build_duration_ms = Some(elapsed_ms(timer));
            status.generation
        };

        tracing::warn!(
            event_name = "engine.build.failed",
            generation,
            error = %error,
            "build failed; previous generation kept"
        );
        error
    }
}

impl RecommendationEngine {
    pub fn new(source: Arc<dyn CatalogSource>, config: EngineConfig) -> Self {
        let rng: Box<dyn RngCore + Send> = match config.random_seed {
            Some(seed) => Box::new(StdRng::seed_from_u64(seed)),
            None => Box::new(StdRng::from_entropy()),
        };

        let shared = Shared {
            source,
            config,
            live: RwLock::new(None),
            status: Mutex::new(StatusInner {
                state: EngineState::Uninitialized,
                generation: 0,
                last_error: None,
                last_build_started_at: None,
                last_build_duration_ms: None,
            }),
            build_lock: Arc::new(tokio::sync::Mutex::new(())),
            pending: Mutex::new(None),
            rng: Mutex::new(rng),
        };

        Self { shared: Arc::new(shared), weights: FusionWeights::default() }
    }

    /// Replaces the random source used for trending noise, random samples and
    /// (when no seed is configured) model initialization.
    pub fn with_rng(self, rng: impl RngCore + Send + 'static) -> Self {
        *lock(&self.shared.rng) = Box::new(rng);
        self
    }

    pub fn with_weights(mut self, weights: FusionWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    pub fn default_limit(&self) -> usize {
        self.shared.config.default_limit
    }

    pub fn source_name(&self) -> &'static str {
        self.shared.source.name()
    }

    /// Builds the first generation from `catalog`, or from the injected source
    /// when `None`. Does nothing once a generation is installed.
    pub async fn initialize(&self, catalog: Option<Vec<Item>>) -> Result<RefreshOutcome, EngineError> {
        if self.current().is_some_and(|generation| generation.id > 0) {
            tracing::info!(
                event_name = "engine.initialize.skipped",
                "recommendation engine already initialized"
            );
            return Ok(RefreshOutcome::AlreadyInitialized);
        }

        match catalog {
            Some(items) => self.submit(PendingCatalog { items, categories: Vec::new() }).await,
            None => self.reload().await,
        }
    }

    /// Rebuilds everything from a new item list. Categories are derived from
    /// the items.
    pub async fn refresh(&self, items: Vec<Item>) -> Result<RefreshOutcome, EngineError> {
        self.submit(PendingCatalog { items, categories: Vec::new() }).await
    }

    /// Fetches items and categories from the injected source and rebuilds.
    pub async fn reload(&self) -> Result<RefreshOutcome, EngineError> {
        let source = &self.shared.source;
        let items = match source.fetch_items().await {
            Ok(items) => items,
            Err(error) => {
                tracing::warn!(
                    event_name = "engine.reload.fetch_failed",
                    source = source.name(),
                    error = %error,
                    "catalog fetch failed; keeping current generation"
                );
                let error = EngineError::from(error);
                lock(&self.shared.status).last_error = Some(error.clone());
                return Err(error);
            }
        };
        let categories = source.fetch_categories().await.unwrap_or_else(|error| {
            tracing::warn!(
                event_name = "engine.reload.categories_failed",
                source = source.name(),
                error = %error,
                "category fetch failed; deriving categories from items"
            );
            Vec::new()
        });

        self.submit(PendingCatalog { items, categories }).await
    }

    /// Stores `catalog` as the pending one (replacing any older pending
    /// catalog) and builds it unless another build is running. The running
    /// builder picks up whatever is pending once it finishes.
    async fn submit(&self, catalog: PendingCatalog) -> Result<RefreshOutcome, EngineError> {
        if lock(&self.shared.pending).replace(catalog).is_some() {
            tracing::debug!(
                event_name = "engine.refresh.superseded",
                "pending catalog replaced by a newer one"
            );
        }

        let Ok(guard) = Arc::clone(&self.shared.build_lock).try_lock_owned() else {
            tracing::info!(event_name = "engine.refresh.queued", "build in progress; catalog queued");
            return Ok(RefreshOutcome::Queued);
        };

        // dropping this future detaches the builder; it does not cancel it
        let builder = tokio::spawn(Arc::clone(&self.shared).drain(guard));
        builder
            .await
            .map_err(|error| EngineError::BuildTask(error.to_string()))
            .and_then(std::convert::identity)
    }

    fn current(&self) -> Option<Arc<Generation>> {
        self.shared.current()
    }

    pub fn status(&self) -> EngineStatus {
        let inner = lock(&self.shared.status).clone();
        let generation = self.current();
        let model = generation.as_ref().and_then(|generation| generation.model.as_ref());

        EngineStatus {
            state: inner.state,
            generation: inner.generation,
            item_count: generation.as_ref().map_or(0, |generation| generation.snapshot.len()),
            category_count: generation
                .as_ref()
                .map_or(0, |generation| generation.snapshot.categories().len()),
            model: model.map(ScoringModel::kind),
            model_trained: model.is_some_and(ScoringModel::is_trained),
            model_trained_at: model.map(ScoringModel::trained_at),
            built_at: generation.as_ref().and_then(|generation| generation.built_at),
            last_build_started_at: inner.last_build_started_at,
            last_build_duration_ms: inner.last_build_duration_ms,
            last_error: inner.last_error,
            refresh_pending: self.shared.has_pending(),
        }
    }

    /// Items of the live generation in catalog order.
    pub fn items(&self) -> Vec<Item> {
        self.current().map(|generation| generation.snapshot.items().to_vec()).unwrap_or_default()
    }

    pub fn categories(&self) -> Vec<String> {
        self.current()
            .map(|generation| generation.snapshot.categories().to_vec())
            .unwrap_or_default()
    }

    pub fn find_item(&self, id: ItemId) -> Option<Item> {
        self.current().and_then(|generation| generation.snapshot.get(id).cloned())
    }

    /// Ensemble recommendations. Acquired items are never returned. Falls
    /// back to the highest rated candidates while no trained model is
    /// available or a build is running.
    pub fn get_recommendations(&self, request: &RecommendationRequest) -> Vec<Item> {
        let Some(generation) = self.current() else {
            return Vec::new();
        };

        let acquired: HashSet<ItemId> = request.acquired.iter().copied().collect();
        let pool: Vec<&Item> =
            generation.snapshot.items().iter().filter(|item| !acquired.contains(&item.id)).collect();
        if pool.is_empty() {
            return Vec::new();
        }

        let model = match generation.model.as_ref() {
            Some(model) if model.is_trained() && !self.shared.is_building() => model,
            _ => {
                tracing::debug!(
                    event_name = "engine.query.fallback",
                    generation = generation.id,
                    strategy = PopularityBased.name(),
                    "serving rating fallback"
                );
                return take_cloned(PopularityBased.rank(&pool), request.limit);
            }
        };

        let model_based = ModelBased {
            model,
            snapshot: &generation.snapshot,
            features: &generation.features,
            preferences: &request.preferred_categories,
        };
        let content_based =
            ContentBased { similarity: &generation.similarity, acquired: &request.acquired };
        let strategies: [(&dyn RankingStrategy, f64); 3] = [
            (&model_based, self.weights.model),
            (&content_based, self.weights.content),
            (&PopularityBased, self.weights.popularity),
        ];

        let rankings: Vec<(Vec<&Item>, f64)> = strategies
            .iter()
            .map(|(strategy, weight)| {
                let ranked = strategy.rank(&pool);
                tracing::trace!(
                    event_name = "engine.query.strategy",
                    strategy = strategy.name(),
                    ranked = ranked.len(),
                    "strategy ranked candidates"
                );
                (ranked, *weight)
            })
            .collect();
        let weighted: Vec<(&[&Item], f64)> =
            rankings.iter().map(|(ranked, weight)| (ranked.as_slice(), *weight)).collect();

        fuse(&weighted, request.limit).into_iter().cloned().collect()
    }

    /// Most similar items to `item`, excluding the item itself. Items outside
    /// the live snapshot are scored on demand.
    pub fn get_similar_products(&self, item: &Item, limit: usize) -> Vec<Item> {
        let Some(generation) = self.current() else {
            return Vec::new();
        };

        let snapshot = &generation.snapshot;
        let mut scored: Vec<(&Item, f64)> = match generation.similarity.row(item.id) {
            Some(row) => row
                .into_iter()
                .filter(|(id, _)| *id != item.id)
                .filter_map(|(id, score)| snapshot.get(id).map(|other| (other, score)))
                .collect(),
            None => snapshot
                .items()
                .iter()
                .filter(|other| other.id != item.id)
                .map(|other| (other, similarity(item, other)))
                .collect(),
        };

        sort_desc(&mut scored);
        take_cloned(scored.into_iter().map(|(item, _)| item), limit)
    }

    pub fn get_similar_by_id(&self, id: ItemId, limit: usize) -> Result<Vec<Item>, DomainError> {
        let item = self.find_item(id).ok_or(DomainError::UnknownItem(id))?;
        Ok(self.get_similar_products(&item, limit))
    }

    /// Rating-dominant ranking with random noise; not deterministic unless a
    /// seeded random source is injected.
    pub fn get_trending_products(&self, limit: usize) -> Vec<Item> {
        let Some(generation) = self.current() else {
            return Vec::new();
        };

        let mut scored: Vec<(&Item, f64)> = {
            let mut guard = lock(&self.shared.rng);
            let rng = &mut **guard;
            generation
                .snapshot
                .items()
                .iter()
                .map(|item| (item, trending_score(item, rng.gen::<f64>() * TRENDING_NOISE)))
                .collect()
        };

        sort_desc(&mut scored);
        take_cloned(scored.into_iter().map(|(item, _)| item), limit)
    }

    /// Uniform random sample without replacement.
    pub fn get_random_products(&self, limit: usize) -> Vec<Item> {
        let Some(generation) = self.current() else {
            return Vec::new();
        };

        let mut items: Vec<&Item> = generation.snapshot.items().iter().collect();
        {
            let mut guard = lock(&self.shared.rng);
            items.shuffle(&mut **guard);
        }
        take_cloned(items, limit)
    }

    /// Items whose category contains or is contained by `category`, highest
    /// rated first.
    pub fn get_recommendations_by_category(&self, category: &str, limit: usize) -> Vec<Item> {
        let Some(generation) = self.current() else {
            return Vec::new();
        };

        let matching: Vec<&Item> = generation
            .snapshot
            .items()
            .iter()
            .filter(|item| categories_overlap(&item.category, category))
            .collect();
        take_cloned(PopularityBased.rank(&matching), limit)
    }

    pub fn get_personalized_category_recommendations(
        &self,
        preferences: &[String],
        limit: usize,
    ) -> Vec<CategoryRecommendations> {
        let mut groups = Vec::new();
        for preference in preferences {
            let items = self.get_recommendations_by_category(preference, limit);
            if !items.is_empty() {
                groups.push(CategoryRecommendations { category: preference.clone(), items });
            }
            if groups.len() >= MAX_CATEGORY_GROUPS {
                break;
            }
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::{trending_score, RecommendationEngine};
    use crate::catalog::InMemoryCatalog;
    use crate::config::EngineConfig;
    use crate::domain::{Item, ItemId};
    use crate::errors::EngineError;
    use crate::ml::ModelKind;
    use crate::recommend::{EngineState, RecommendationRequest, RefreshOutcome};

    fn item(id: u64, name: &str, category: &str, price: f64, rating: f64) -> Item {
        Item {
            id: ItemId(id),
            name: name.to_string(),
            description: format!("{name} for everyday {category} needs with solid build quality"),
            price,
            category: category.to_string(),
            rating,
            features: vec![format!("{category} essential"), "Two year warranty".to_string()],
            image: None,
        }
    }

    fn three_items() -> Vec<Item> {
        vec![
            item(1, "Headphones", "electronics", 199.99, 4.8),
            item(2, "Speaker", "electronics", 79.99, 4.2),
            item(3, "Water Bottle", "home", 34.99, 4.9),
        ]
    }

    fn catalog() -> Vec<Item> {
        vec![
            item(1, "Headphones", "electronics", 199.99, 4.8),
            item(2, "Speaker", "electronics", 79.99, 4.4),
            item(3, "Smart Watch", "electronics", 249.99, 4.6),
            item(4, "Running Shoes", "men's clothing", 129.99, 4.5),
            item(5, "Leather Wallet", "men's clothing", 49.99, 4.7),
            item(6, "Yoga Mat", "sports", 29.99, 4.3),
            item(7, "Water Bottle", "home", 34.99, 4.9),
            item(8, "Coffee Maker", "home", 119.99, 4.1),
            item(9, "Silver Ring", "jewelery", 89.99, 3.9),
            item(10, "Backpack", "travel", 79.99, 4.6),
        ]
    }

    fn config(epochs: usize) -> EngineConfig {
        EngineConfig { random_seed: Some(17), epochs, ..EngineConfig::default() }
    }

    fn engine(epochs: usize) -> RecommendationEngine {
        RecommendationEngine::new(Arc::new(InMemoryCatalog::new(catalog())), config(epochs))
    }

    fn ids(items: &[Item]) -> Vec<u64> {
        items.iter().map(|item| item.id.0).collect()
    }

    #[test]
    fn queries_before_any_build_return_nothing() {
        let engine = engine(5);

        assert!(engine.get_recommendations(&RecommendationRequest::new(4)).is_empty());
        assert!(engine.get_trending_products(4).is_empty());
        assert_eq!(engine.status().state, EngineState::Uninitialized);
        assert!(!engine.status().is_ready());
    }

    #[tokio::test]
    async fn untrained_model_serves_rating_fallback() {
        let engine = engine(0);
        engine.initialize(Some(three_items())).await.expect("build");

        let request = RecommendationRequest::new(2).with_preferences(vec!["electronics".to_string()]);
        assert_eq!(ids(&engine.get_recommendations(&request)), vec![3, 1]);
        assert!(!engine.status().model_trained);
    }

    #[tokio::test]
    async fn initialize_builds_a_ready_generation() {
        let engine = engine(10);
        let outcome = engine.initialize(None).await.expect("build");

        assert!(matches!(
            outcome,
            RefreshOutcome::Applied(ref report) if report.generation == 1 && report.item_count == 10
        ));
        let status = engine.status();
        assert_eq!(status.state, EngineState::Ready);
        assert_eq!(status.generation, 1);
        assert_eq!(status.item_count, 10);
        assert_eq!(status.category_count, 6);
        assert_eq!(status.model, Some(ModelKind::Primary));
        assert!(status.model_trained);
        assert!(status.last_error.is_none());
        assert!(status.built_at.is_some());
        assert!(status.model_trained_at.is_some());
        assert!(status.is_ready());

        let summary = status.summary();
        assert_eq!(summary.model, "primary");
        assert_eq!(summary.last_error, None);
        assert!(summary.ready);
    }

    #[tokio::test]
    async fn second_initialize_is_skipped() {
        let engine = engine(2);
        engine.initialize(None).await.expect("build");

        assert_eq!(engine.initialize(Some(three_items())).await, Ok(RefreshOutcome::AlreadyInitialized));
        assert_eq!(engine.status().item_count, 10);
    }

    #[tokio::test]
    async fn recommendations_exclude_acquired_and_respect_limit() {
        let engine = engine(10);
        engine.initialize(None).await.expect("build");

        let acquired = vec![ItemId(1), ItemId(7), ItemId(42)];
        let request = RecommendationRequest::new(4)
            .with_preferences(vec!["clothing".to_string()])
            .with_acquired(acquired.clone());
        let results = engine.get_recommendations(&request);

        assert_eq!(results.len(), 4);
        assert!(results.iter().all(|item| !acquired.contains(&item.id)));
        let unique: HashSet<ItemId> = results.iter().map(|item| item.id).collect();
        assert_eq!(unique.len(), results.len());

        let large = engine.get_recommendations(&RecommendationRequest::new(50).with_acquired(acquired));
        assert_eq!(large.len(), 8);
    }

    #[tokio::test]
    async fn recommendations_are_deterministic_for_a_generation() {
        let engine = engine(10);
        engine.initialize(None).await.expect("build");

        let request = RecommendationRequest::new(5)
            .with_preferences(vec!["home".to_string()])
            .with_acquired(vec![ItemId(2)]);
        assert_eq!(engine.get_recommendations(&request), engine.get_recommendations(&request));
    }

    #[tokio::test]
    async fn acquiring_everything_yields_empty_result() {
        let engine = engine(2);
        engine.initialize(Some(three_items())).await.expect("build");

        let request =
            RecommendationRequest::new(4).with_acquired(vec![ItemId(1), ItemId(2), ItemId(3)]);
        assert!(engine.get_recommendations(&request).is_empty());
    }

    #[tokio::test]
    async fn similar_products_exclude_the_reference_item() {
        let engine = engine(2);
        engine.initialize(Some(three_items())).await.expect("build");
        let headphones = three_items().remove(0);

        let similar = engine.get_similar_products(&headphones, 10);
        assert_eq!(ids(&similar), vec![2, 3]);
        assert_eq!(engine.get_similar_products(&headphones, 1).len(), 1);
        assert_eq!(similar, engine.get_similar_products(&headphones, 10));
    }

    #[tokio::test]
    async fn similar_products_for_unknown_item_are_computed_on_demand() {
        let engine = engine(2);
        engine.initialize(Some(three_items())).await.expect("build");
        let outsider = item(99, "Bluetooth Earbuds", "electronics", 59.99, 4.3);

        let similar = engine.get_similar_products(&outsider, 10);
        assert_eq!(similar.len(), 3);
        assert_eq!(similar.last().map(|item| item.id), Some(ItemId(3)));
        assert!(engine.get_similar_by_id(ItemId(99), 3).is_err());
    }

    #[tokio::test]
    async fn trending_is_rating_dominant() {
        let engine = engine(2);
        let mut items = three_items();
        items[0].rating = 5.0;
        items[1].rating = 1.0;
        items[2].rating = 1.5;
        engine.initialize(Some(items)).await.expect("build");

        for _ in 0..20 {
            assert_eq!(engine.get_trending_products(1).first().map(|item| item.id), Some(ItemId(1)));
        }
    }

    #[tokio::test]
    async fn trending_with_same_seed_is_reproducible() {
        let left = engine(2).with_rng(StdRng::seed_from_u64(5));
        let right = engine(2).with_rng(StdRng::seed_from_u64(5));
        left.initialize(None).await.expect("build");
        right.initialize(None).await.expect("build");

        assert_eq!(left.get_trending_products(5), right.get_trending_products(5));
    }

    #[test]
    fn trending_score_applies_boosts() {
        let base = item(1, "Watch", "sports", 100.0, 4.0);
        assert!((trending_score(&base, 0.0) - 0.8).abs() < 1e-12);

        let electronics = item(2, "Tablet", "electronics", 300.0, 4.0);
        assert!((trending_score(&electronics, 0.05) - 1.05).abs() < 1e-12);

        // substring categories do not count as trending
        let clothing = item(3, "Shirt", "men's clothing", 600.0, 4.0);
        assert!((trending_score(&clothing, 0.0) - 0.8).abs() < 1e-12);
    }

    #[tokio::test]
    async fn random_products_are_unique_and_limited() {
        let engine = engine(2);
        engine.initialize(None).await.expect("build");

        let sample = engine.get_random_products(6);
        assert_eq!(sample.len(), 6);
        let unique: HashSet<ItemId> = sample.iter().map(|item| item.id).collect();
        assert_eq!(unique.len(), 6);
        assert_eq!(engine.get_random_products(100).len(), 10);
    }

    #[tokio::test]
    async fn category_recommendations_use_substring_match() {
        let engine = engine(2);
        engine.initialize(None).await.expect("build");

        assert_eq!(ids(&engine.get_recommendations_by_category("clothing", 4)), vec![5, 4]);
        assert_eq!(ids(&engine.get_recommendations_by_category("electronics", 2)), vec![1, 3]);
        assert!(engine.get_recommendations_by_category("garden", 4).is_empty());
    }

    #[tokio::test]
    async fn personalized_categories_skip_empty_groups_and_cap_at_three() {
        let engine = engine(2);
        engine.initialize(None).await.expect("build");

        let preferences: Vec<String> = ["garden", "home", "electronics", "travel", "sports"]
            .iter()
            .map(|label| label.to_string())
            .collect();
        let groups = engine.get_personalized_category_recommendations(&preferences, 2);

        let labels: Vec<&str> = groups.iter().map(|group| group.category.as_str()).collect();
        assert_eq!(labels, vec!["home", "electronics", "travel"]);
        assert!(groups.iter().all(|group| group.items.len() <= 2));
    }

    #[tokio::test]
    async fn empty_catalog_keeps_previous_generation() {
        let engine = engine(2);
        engine.initialize(Some(three_items())).await.expect("build");

        assert_eq!(engine.refresh(Vec::new()).await, Err(EngineError::EmptyCatalog));
        let status = engine.status();
        assert_eq!(status.state, EngineState::Ready);
        assert_eq!(status.generation, 1);
        assert_eq!(status.item_count, 3);
        assert_eq!(status.last_error, Some(EngineError::EmptyCatalog));
    }

    #[tokio::test]
    async fn non_finite_rating_aborts_the_build() {
        let engine = engine(2);
        engine.initialize(Some(three_items())).await.expect("build");

        let mut broken = catalog();
        broken[4].rating = f64::NAN;
        let result = engine.refresh(broken).await;

        assert_eq!(
            result,
            Err(EngineError::NonFiniteTrainingData { feature_rows: 1, label_rows: 1 })
        );
        assert_eq!(engine.status().item_count, 3);
        assert_eq!(engine.status().generation, 1);
    }

    #[tokio::test]
    async fn non_finite_price_aborts_the_build() {
        let engine = engine(2);
        engine.initialize(Some(three_items())).await.expect("build");

        let mut broken = catalog();
        broken[2].price = f64::NAN;
        broken[6].price = -5.0;
        let result = engine.refresh(broken).await;

        assert_eq!(
            result,
            Err(EngineError::NonFiniteTrainingData { feature_rows: 2, label_rows: 0 })
        );
        assert_eq!(engine.status().generation, 1);
        assert_eq!(engine.status().item_count, 3);
    }

    #[tokio::test]
    async fn failed_first_build_keeps_catalog_for_rating_fallback() {
        let engine = engine(2);
        let mut broken = three_items();
        broken[1].price = f64::NAN;

        assert_eq!(
            engine.initialize(Some(broken)).await,
            Err(EngineError::NonFiniteTrainingData { feature_rows: 1, label_rows: 0 })
        );
        let status = engine.status();
        assert_eq!(status.state, EngineState::Ready);
        assert_eq!(status.generation, 0);
        assert_eq!(status.item_count, 3);
        assert_eq!(status.model, None);
        assert!(!status.is_ready());

        let results = engine.get_recommendations(&RecommendationRequest::new(5));
        assert_eq!(ids(&results), vec![3, 1, 2]);
        assert!(results.windows(2).all(|pair| pair[0].rating >= pair[1].rating));
        assert_eq!(ids(&engine.get_recommendations_by_category("electronics", 5)), vec![1, 2]);
        assert_eq!(engine.get_similar_by_id(ItemId(1), 5).map(|items| items.len()).ok(), Some(2));

        let outcome = engine.initialize(Some(three_items())).await.expect("retry");
        assert!(matches!(outcome, RefreshOutcome::Applied(ref report) if report.generation == 1));
        assert!(engine.status().is_ready());
    }

    #[tokio::test]
    async fn refresh_replaces_generation_and_clears_error() {
        let engine = engine(2);
        engine.initialize(Some(three_items())).await.expect("build");
        let _ = engine.refresh(Vec::new()).await;

        let outcome = engine.refresh(catalog()).await.expect("refresh");
        assert!(matches!(outcome, RefreshOutcome::Applied(ref report) if report.generation == 2));
        let status = engine.status();
        assert_eq!(status.item_count, 10);
        assert!(status.last_error.is_none());
    }

    #[tokio::test]
    async fn refresh_during_build_is_queued_and_applied_next() {
        let engine = engine(2);
        engine.initialize(Some(three_items())).await.expect("build");

        let guard = engine.shared.build_lock.lock().await;
        assert_eq!(engine.refresh(catalog()).await, Ok(RefreshOutcome::Queued));
        assert!(engine.status().refresh_pending);
        assert_eq!(engine.status().item_count, 3);
        drop(guard);

        let mut latest = catalog();
        latest.truncate(5);
        let outcome = engine.refresh(latest).await.expect("refresh");
        assert!(matches!(outcome, RefreshOutcome::Applied(ref report) if report.item_count == 5));
        assert!(!engine.status().refresh_pending);
    }

    #[tokio::test]
    async fn abandoned_refresh_still_installs_its_generation() {
        let engine = Arc::new(engine(50));
        let caller = tokio::spawn({
            let engine = Arc::clone(&engine);
            async move { engine.refresh(catalog()).await }
        });
        while !engine.status().refresh_pending && engine.status().last_build_started_at.is_none() {
            tokio::task::yield_now().await;
        }
        caller.abort();

        let mut status = engine.status();
        for _ in 0..200 {
            if status.state == EngineState::Ready && status.generation == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
            status = engine.status();
        }

        assert_eq!(status.state, EngineState::Ready);
        assert_eq!(status.generation, 1);
        assert_eq!(status.item_count, 10);
        assert!(status.model_trained);
        assert!(!status.refresh_pending);
    }

    #[tokio::test]
    async fn catalog_queued_behind_abandoned_build_is_applied() {
        let engine = Arc::new(engine(50));
        engine.initialize(Some(three_items())).await.expect("build");

        let caller = tokio::spawn({
            let engine = Arc::clone(&engine);
            async move { engine.refresh(catalog()).await }
        });
        while engine.status().generation == 1 && engine.status().state != EngineState::Building {
            tokio::task::yield_now().await;
        }
        let mut latest = catalog();
        latest.truncate(4);
        let queued = engine.refresh(latest).await;
        caller.abort();

        let mut status = engine.status();
        for _ in 0..200 {
            if status.state == EngineState::Ready && !status.refresh_pending && status.item_count == 4 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
            status = engine.status();
        }

        assert!(matches!(queued, Ok(RefreshOutcome::Queued) | Ok(RefreshOutcome::Applied(_))));
        assert_eq!(status.state, EngineState::Ready);
        assert_eq!(status.item_count, 4);
        assert!(!status.refresh_pending);
    }

    #[tokio::test]
    async fn building_state_serves_fallback() {
        let engine = engine(10);
        engine.initialize(None).await.expect("build");

        super::lock(&engine.shared.status).state = EngineState::Building;
        let request = RecommendationRequest::new(3).with_preferences(vec!["jewelery".to_string()]);
        assert_eq!(ids(&engine.get_recommendations(&request)), vec![7, 1, 5]);
    }

    #[tokio::test]
    async fn reload_uses_source_categories() {
        let source = InMemoryCatalog::new(three_items())
            .with_categories(vec!["electronics".to_string(), "garden".to_string()]);
        let engine = RecommendationEngine::new(Arc::new(source), config(2));

        engine.reload().await.expect("reload");
        assert_eq!(engine.categories(), vec!["electronics", "garden", "home"]);
        assert_eq!(engine.status().category_count, 3);
    }
}
