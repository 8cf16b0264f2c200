pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;
pub mod ml;
pub mod recommend;

pub use catalog::{CatalogSource, InMemoryCatalog};
pub use domain::{CatalogSnapshot, Item, ItemId};
pub use errors::{
    ApplicationError, CatalogError, DomainError, EngineError, InterfaceError, ValidationError,
};
pub use ml::{ModelError, ModelKind, ScoringModel, TrainingConfig};
pub use recommend::{
    CategoryRecommendations, EngineState, EngineStatus, RecommendationEngine,
    RecommendationRequest, RefreshOutcome,
};
