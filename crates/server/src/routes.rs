//! JSON query surface over the recommendation engine.
//!
//! - `GET  /health`
//! - `GET  /status`
//! - `GET  /recommendations?categories=a,b&acquired=1,4&limit=4`
//! - `GET  /products/random?limit=4`
//! - `GET  /products/{id}/similar?limit=4`
//! - `GET  /trending?limit=4`
//! - `GET  /categories/personalized?categories=a,b&limit=4`
//! - `GET  /categories/{category}/recommendations?limit=4`
//! - `POST /catalog/refresh`
//!
//! List parameters are comma separated. Response bodies carry the request's
//! `x-correlation-id`, or a generated one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use shopwise_core::domain::{Item, ItemId};
use shopwise_core::recommend::StatusSummary;
use shopwise_core::{
    ApplicationError, CategoryRecommendations, InterfaceError, RecommendationEngine,
    RecommendationRequest,
};
use tracing::{error, info, warn};

use crate::health::health;

pub const CORRELATION_HEADER: &str = "x-correlation-id";

static NEXT_REQUEST: AtomicU64 = AtomicU64::new(1);

pub fn router(engine: Arc<RecommendationEngine>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/recommendations", get(recommendations))
        .route("/products/random", get(random_products))
        .route("/products/{id}/similar", get(similar_products))
        .route("/trending", get(trending))
        .route("/categories/personalized", get(personalized))
        .route("/categories/{category}/recommendations", get(category_recommendations))
        .route("/catalog/refresh", post(refresh_catalog))
        .with_state(engine)
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecommendationQuery {
    pub categories: Option<String>,
    pub acquired: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PersonalizedQuery {
    pub categories: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ItemsResponse {
    pub items: Vec<Item>,
    pub count: usize,
    pub correlation_id: String,
}

#[derive(Debug, Serialize)]
pub struct GroupsResponse {
    pub groups: Vec<CategoryRecommendations>,
    pub correlation_id: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub outcome: &'static str,
    pub status: StatusSummary,
    pub correlation_id: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub detail: String,
    pub correlation_id: String,
}

/// Wraps [`InterfaceError`] so it can be returned from handlers.
#[derive(Debug)]
pub struct ApiError(pub InterfaceError);

impl From<InterfaceError> for ApiError {
    fn from(value: InterfaceError) -> Self {
        Self(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        // Internal details stay in the log.
        let detail = match &self.0 {
            InterfaceError::Internal { .. } => String::new(),
            InterfaceError::BadRequest { message, .. }
            | InterfaceError::NotFound { message, .. }
            | InterfaceError::ServiceUnavailable { message, .. } => message.clone(),
        };
        let correlation_id = self.0.correlation_id().to_string();
        let body = ErrorBody { error: self.0.user_message(), detail, correlation_id };

        (status, Json(body)).into_response()
    }
}

fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(CORRELATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
        .unwrap_or_else(|| format!("req-{}", NEXT_REQUEST.fetch_add(1, Ordering::Relaxed)))
}

fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToString::to_string)
            .collect()
    })
    .unwrap_or_default()
}

fn parse_ids(raw: Option<&str>, correlation_id: &str) -> Result<Vec<ItemId>, ApiError> {
    split_list(raw)
        .iter()
        .map(|value| {
            value.parse::<u64>().map(ItemId).map_err(|_| {
                ApiError(InterfaceError::BadRequest {
                    message: format!("`{value}` is not a valid item id"),
                    correlation_id: correlation_id.to_string(),
                })
            })
        })
        .collect()
}

fn resolve_limit(
    limit: Option<usize>,
    engine: &RecommendationEngine,
    correlation_id: &str,
) -> Result<usize, ApiError> {
    match limit {
        Some(0) => Err(ApiError(InterfaceError::BadRequest {
            message: "`limit` must be a positive integer".to_string(),
            correlation_id: correlation_id.to_string(),
        })),
        Some(limit) => Ok(limit),
        None => Ok(engine.default_limit()),
    }
}

fn items_response(items: Vec<Item>, correlation_id: String) -> Json<ItemsResponse> {
    Json(ItemsResponse { count: items.len(), items, correlation_id })
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub async fn status(State(engine): State<Arc<RecommendationEngine>>) -> Json<StatusSummary> {
    Json(engine.status().summary())
}

pub async fn recommendations(
    State(engine): State<Arc<RecommendationEngine>>,
    headers: HeaderMap,
    Query(query): Query<RecommendationQuery>,
) -> Result<Json<ItemsResponse>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let limit = resolve_limit(query.limit, &engine, &correlation_id)?;
    let acquired = parse_ids(query.acquired.as_deref(), &correlation_id)?;

    let request = RecommendationRequest::new(limit)
        .with_preferences(split_list(query.categories.as_deref()))
        .with_acquired(acquired);
    let items = engine.get_recommendations(&request);

    info!(
        event_name = "http.recommendations.served",
        correlation_id = %correlation_id,
        count = items.len(),
        "recommendations served"
    );
    Ok(items_response(items, correlation_id))
}

pub async fn similar_products(
    State(engine): State<Arc<RecommendationEngine>>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<ItemsResponse>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let limit = resolve_limit(query.limit, &engine, &correlation_id)?;

    match engine.get_similar_by_id(ItemId(id), limit) {
        Ok(items) => Ok(items_response(items, correlation_id)),
        Err(domain_error) => {
            warn!(
                event_name = "http.similar.unknown_item",
                correlation_id = %correlation_id,
                item_id = id,
                "similar products requested for unknown item"
            );
            Err(ApiError(ApplicationError::from(domain_error).into_interface(correlation_id)))
        }
    }
}

pub async fn trending(
    State(engine): State<Arc<RecommendationEngine>>,
    headers: HeaderMap,
    Query(query): Query<LimitQuery>,
) -> Result<Json<ItemsResponse>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let limit = resolve_limit(query.limit, &engine, &correlation_id)?;
    Ok(items_response(engine.get_trending_products(limit), correlation_id))
}

pub async fn random_products(
    State(engine): State<Arc<RecommendationEngine>>,
    headers: HeaderMap,
    Query(query): Query<LimitQuery>,
) -> Result<Json<ItemsResponse>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let limit = resolve_limit(query.limit, &engine, &correlation_id)?;
    Ok(items_response(engine.get_random_products(limit), correlation_id))
}

pub async fn category_recommendations(
    State(engine): State<Arc<RecommendationEngine>>,
    headers: HeaderMap,
    Path(category): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<ItemsResponse>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let limit = resolve_limit(query.limit, &engine, &correlation_id)?;
    Ok(items_response(engine.get_recommendations_by_category(&category, limit), correlation_id))
}

pub async fn personalized(
    State(engine): State<Arc<RecommendationEngine>>,
    headers: HeaderMap,
    Query(query): Query<PersonalizedQuery>,
) -> Result<Json<GroupsResponse>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let limit = resolve_limit(query.limit, &engine, &correlation_id)?;
    let groups = engine
        .get_personalized_category_recommendations(&split_list(query.categories.as_deref()), limit);
    Ok(Json(GroupsResponse { groups, correlation_id }))
}

pub async fn refresh_catalog(
    State(engine): State<Arc<RecommendationEngine>>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<RefreshResponse>), ApiError> {
    let correlation_id = correlation_id(&headers);

    match engine.reload().await {
        Ok(outcome) => {
            info!(
                event_name = "http.catalog.refresh",
                correlation_id = %correlation_id,
                outcome = outcome.as_str(),
                "catalog refresh requested"
            );
            let status_code =
                if outcome.as_str() == "queued" { StatusCode::ACCEPTED } else { StatusCode::OK };
            Ok((
                status_code,
                Json(RefreshResponse {
                    outcome: outcome.as_str(),
                    status: engine.status().summary(),
                    correlation_id,
                }),
            ))
        }
        Err(engine_error) => {
            error!(
                event_name = "http.catalog.refresh_failed",
                correlation_id = %correlation_id,
                error = %engine_error,
                "catalog refresh failed"
            );
            Err(ApiError(ApplicationError::from(engine_error).into_interface(correlation_id)))
        }
    }
}
