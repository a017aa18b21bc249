use axum::{Json, Router, http::StatusCode, routing::get};

use crate::AppState;
use crate::models::ErrorResponse;

pub mod alerts;
pub mod export;
pub mod health;
pub mod metrics;

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

pub(crate) fn internal_error(e: impl std::fmt::Display) -> ApiError {
    tracing::error!("Request failed: {}", e);
    error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e))
}

/// All `/api` routes, without middleware layers
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health::healthcheck))
        .route("/api/metrics/daily", get(metrics::get_daily_metrics))
        .route("/api/metrics/kpis", get(metrics::get_kpis))
        .route("/api/metrics/summary", get(metrics::get_summary))
        .route("/api/metrics/privacy", get(metrics::get_privacy_metrics))
        .route("/api/metrics/health", get(metrics::get_network_health))
        .route("/api/metrics/momentum", get(metrics::get_momentum))
        .route("/api/metrics/pool-migration", get(metrics::get_pool_migration))
        .route("/api/metrics/metadata", get(metrics::get_metadata))
        .route("/api/alerts", get(alerts::get_alerts))
        .route("/api/export/metrics/csv", get(export::export_metrics_csv))
        .route("/api/export/metrics/json", get(export::export_metrics_json))
        .route("/api/export/alerts/csv", get(export::export_alerts_csv))
        .route("/api/export/alerts/json", get(export::export_alerts_json))
        .with_state(state)
}
