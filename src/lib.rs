// src/lib.rs

use std::sync::Arc;

use axum::Router;
use sea_orm::DatabaseConnection;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Settings;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub settings: Arc<Settings>,
}

pub mod entities {
    pub mod prelude;
    pub mod alerts;
    pub mod daily_metrics;
    pub mod sync_status;
}

pub mod services {
    pub mod anomaly;
    pub mod api_client;
    pub mod coingecko;
    pub mod export;
    pub mod ingestion;
    pub mod insights;
    pub mod metrics;
    pub mod notification;
    pub mod refresh;
    pub mod sample_data;
    pub mod sources;
    pub mod store;
    pub mod sync_status;
    pub mod zchain;
}

pub mod config;
pub mod models;
pub mod handlers;
pub mod jobs;

/// Full application router: every `/api` route plus CORS and request tracing
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    handlers::api_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
