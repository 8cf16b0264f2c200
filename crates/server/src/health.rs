use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::Serialize;
use shopwise_core::recommend::StatusSummary;
use shopwise_core::RecommendationEngine;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub engine: StatusSummary,
    pub checked_at: String,
}

/// Ready once a generation with a real catalog is installed; a rebuild in
/// progress still answers from the previous generation.
pub async fn health(
    State(engine): State<Arc<RecommendationEngine>>,
) -> (StatusCode, Json<HealthResponse>) {
    let summary = engine.status().summary();
    let ready = summary.generation > 0;

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: format!("shopwise-server serving `{}` catalog", engine.source_name()),
        },
        engine: summary,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}
