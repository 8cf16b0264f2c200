//! Types for the recommendation engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Item, ItemId};
use crate::errors::EngineError;
use crate::ml::{ModelError, ModelKind};

/// Request for personalized recommendations
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationRequest {
    /// Category labels the caller prefers, possibly empty
    pub preferred_categories: Vec<String>,
    /// Items the caller already has; never recommended back
    pub acquired: Vec<ItemId>,
    /// Maximum number of items to return
    pub limit: usize,
}

impl RecommendationRequest {
    pub fn new(limit: usize) -> Self {
        Self { preferred_categories: Vec::new(), acquired: Vec::new(), limit }
    }

    pub fn with_preferences(mut self, categories: Vec<String>) -> Self {
        self.preferred_categories = categories;
        self
    }

    pub fn with_acquired(mut self, acquired: Vec<ItemId>) -> Self {
        self.acquired = acquired;
        self
    }
}

impl Default for RecommendationRequest {
    fn default() -> Self {
        Self::new(super::DEFAULT_LIMIT)
    }
}

/// Top items for one of the caller's preferred categories
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRecommendations {
    pub category: String,
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Uninitialized,
    Building,
    Ready,
}

impl EngineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Building => "building",
            Self::Ready => "ready",
        }
    }
}

/// Point-in-time view of the engine lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineStatus {
    pub state: EngineState,
    /// Number of generations installed so far; 0 before the first build.
    pub generation: u64,
    pub item_count: usize,
    pub category_count: usize,
    /// `None` when the live generation ranks without a model.
    pub model: Option<ModelKind>,
    pub model_trained: bool,
    pub model_trained_at: Option<DateTime<Utc>>,
    pub built_at: Option<DateTime<Utc>>,
    pub last_build_started_at: Option<DateTime<Utc>>,
    pub last_build_duration_ms: Option<u64>,
    /// Most recent build failure, cleared by the next clean build.
    pub last_error: Option<EngineError>,
    pub refresh_pending: bool,
}

impl EngineStatus {
    pub fn is_ready(&self) -> bool {
        self.state == EngineState::Ready && self.generation > 0
    }

    pub fn model_label(&self) -> &'static str {
        self.model.as_ref().map_or("absent", ModelKind::as_str)
    }

    pub fn summary(&self) -> StatusSummary {
        StatusSummary {
            state: self.state,
            ready: self.is_ready(),
            generation: self.generation,
            item_count: self.item_count,
            category_count: self.category_count,
            model: self.model_label(),
            model_trained: self.model_trained,
            model_trained_at: self.model_trained_at,
            built_at: self.built_at,
            last_build_started_at: self.last_build_started_at,
            last_build_duration_ms: self.last_build_duration_ms,
            last_error: self.last_error.as_ref().map(ToString::to_string),
            refresh_pending: self.refresh_pending,
        }
    }
}

/// Serializable rendering of [`EngineStatus`] for the CLI and HTTP surfaces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSummary {
    pub state: EngineState,
    pub ready: bool,
    pub generation: u64,
    pub item_count: usize,
    pub category_count: usize,
    pub model: &'static str,
    pub model_trained: bool,
    pub model_trained_at: Option<DateTime<Utc>>,
    pub built_at: Option<DateTime<Utc>>,
    pub last_build_started_at: Option<DateTime<Utc>>,
    pub last_build_duration_ms: Option<u64>,
    pub last_error: Option<String>,
    pub refresh_pending: bool,
}

/// Summary of one completed build.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildReport {
    pub generation: u64,
    pub item_count: usize,
    pub category_count: usize,
    pub model: Option<ModelKind>,
    /// Set when neither architecture could be trained.
    pub model_error: Option<ModelError>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// The catalog was built and installed by this call.
    Applied(BuildReport),
    /// Another build was running; the catalog will be applied right after it.
    Queued,
    /// `initialize` found a generation already installed.
    AlreadyInitialized,
}

impl RefreshOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Applied(_) => "applied",
            Self::Queued => "queued",
            Self::AlreadyInitialized => "already_initialized",
        }
    }
}
