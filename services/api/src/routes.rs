use crate::infra::{AppState, InMemoryMarketplace};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json, Router};
use fitmatch::marketplace::marketplace_router;
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Marketplace routes plus the operational endpoints every deployment gets.
pub(crate) fn with_marketplace_routes(state: Arc<InMemoryMarketplace>) -> Router {
    marketplace_router(state)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "service": "fitmatch-api" }))
}

async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    if state.readiness.load(Ordering::Relaxed) {
        (StatusCode::OK, Json(json!({ "status": "ready" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "initializing" })),
        )
    }
}

async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
